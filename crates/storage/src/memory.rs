//! In-memory record store
//!
//! Same semantics as the SQLite backend, including the uniqueness of
//! `number` and all-or-nothing batch inserts. Used by tests and for
//! throwaway runs.

use async_trait::async_trait;
use dex_core::{Record, RecordDraft, RecordId, RecordPatch, RecordQuery};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::trait_::{RecordStore, SharedRecordStore, StoreError, StoreResult, UpsertOutcome};

#[derive(Debug, Default)]
struct MemoryState {
    /// Rows keyed by `number`
    rows: BTreeMap<i64, Record>,
    last_id: RecordId,
}

impl MemoryState {
    fn insert(&mut self, draft: &RecordDraft) -> StoreResult<Record> {
        if self.rows.contains_key(&draft.number) {
            return Err(duplicate(draft.number));
        }
        self.last_id += 1;
        let record = Record::from_draft(self.last_id, draft.clone());
        self.rows.insert(record.number, record.clone());
        Ok(record)
    }
}

fn duplicate(number: i64) -> StoreError {
    StoreError::Conflict(format!("number {number} already exists"))
}

/// In-memory record store
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
    state: Mutex<MemoryState>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|e| StoreError::Database(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn get(&self, number: i64) -> StoreResult<Option<Record>> {
        let state = self.lock()?;
        Ok(state.rows.get(&number).cloned())
    }

    async fn find_by_number_and_name(
        &self,
        number: i64,
        name: &str,
    ) -> StoreResult<Option<Record>> {
        let state = self.lock()?;
        Ok(state
            .rows
            .get(&number)
            .filter(|record| record.name == name)
            .cloned())
    }

    async fn insert(&self, draft: &RecordDraft) -> StoreResult<Record> {
        let mut state = self.lock()?;
        state.insert(draft)
    }

    async fn update(&self, number: i64, patch: &RecordPatch) -> StoreResult<Option<Record>> {
        let mut state = self.lock()?;
        Ok(state.rows.get_mut(&number).map(|record| {
            record.apply(patch);
            record.clone()
        }))
    }

    async fn delete(&self, number: i64) -> StoreResult<bool> {
        let mut state = self.lock()?;
        Ok(state.rows.remove(&number).is_some())
    }

    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<Record>> {
        let state = self.lock()?;
        let mut matching: Vec<&Record> = state
            .rows
            .values()
            .filter(|record| query.filter.as_ref().is_none_or(|f| f.matches(record)))
            .collect();
        matching.sort_by(|a, b| query.sort.compare(a, b));

        let offset = usize::try_from(query.pagination.offset()).unwrap_or(usize::MAX);
        Ok(matching
            .into_iter()
            .skip(offset)
            .take(query.pagination.limit() as usize)
            .cloned()
            .collect())
    }

    async fn numbers(&self) -> StoreResult<HashSet<i64>> {
        let state = self.lock()?;
        Ok(state.rows.keys().copied().collect())
    }

    async fn upsert(&self, draft: &RecordDraft) -> StoreResult<UpsertOutcome> {
        let mut state = self.lock()?;
        if let Some(record) = state.rows.get_mut(&draft.number) {
            record.apply(&draft.as_full_patch());
            return Ok(UpsertOutcome::Updated(record.clone()));
        }
        state.insert(draft).map(UpsertOutcome::Inserted)
    }

    async fn insert_batch(&self, drafts: &[RecordDraft]) -> StoreResult<usize> {
        let mut state = self.lock()?;

        // Validate the whole batch before touching any row
        let mut seen = HashSet::with_capacity(drafts.len());
        for draft in drafts {
            if state.rows.contains_key(&draft.number) || !seen.insert(draft.number) {
                return Err(duplicate(draft.number));
            }
        }

        for draft in drafts {
            state.insert(draft)?;
        }
        Ok(drafts.len())
    }

    async fn count(&self) -> StoreResult<usize> {
        let state = self.lock()?;
        Ok(state.rows.len())
    }
}

/// Create a new shared in-memory store
pub fn create_memory_store() -> SharedRecordStore {
    Arc::new(MemoryRecordStore::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use dex_core::{Column, Filter, Pagination, SortDirection, SortSpec};

    fn draft(number: i64, name: &str, total: i64) -> RecordDraft {
        let mut draft = RecordDraft::new(number, name);
        draft.total = total;
        draft
    }

    fn query(filter: Option<Filter>, sort: SortSpec, page: i64, limit: i64) -> RecordQuery {
        RecordQuery {
            filter,
            sort,
            pagination: Pagination::new(page, limit, 100).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryRecordStore::new();
        let first = store.insert(&draft(1, "Bulbasaur", 318)).await.unwrap();
        let second = store.insert(&draft(2, "Ivysaur", 405)).await.unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(second.id, 2);
        assert_eq!(store.get(2).await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_insert_duplicate_number() {
        let store = MemoryRecordStore::new();
        store.insert(&draft(1, "Bulbasaur", 318)).await.unwrap();

        let result = store.insert(&draft(1, "Other", 1)).await;
        assert!(matches!(result, Err(StoreError::Conflict(_))));
        assert_eq!(store.count().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_find_by_number_and_name() {
        let store = MemoryRecordStore::new();
        store.insert(&draft(1, "Bulbasaur", 318)).await.unwrap();

        assert!(store.find_by_number_and_name(1, "Bulbasaur").await.unwrap().is_some());
        assert!(store.find_by_number_and_name(1, "Ivysaur").await.unwrap().is_none());
        assert!(store.find_by_number_and_name(2, "Bulbasaur").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_and_delete() {
        let store = MemoryRecordStore::new();
        store.insert(&draft(1, "Bulbasaur", 318)).await.unwrap();

        let patch = RecordPatch {
            attack: Some(80),
            ..Default::default()
        };
        let updated = store.update(1, &patch).await.unwrap().unwrap();
        assert_eq!(updated.attack, 80);
        assert_eq!(updated.total, 318);

        assert!(store.update(2, &patch).await.unwrap().is_none());
        assert!(store.delete(1).await.unwrap());
        assert!(!store.delete(1).await.unwrap());
        assert!(store.get(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let store = MemoryRecordStore::new();
        let original = store.insert(&draft(1, "Bulbasaur", 318)).await.unwrap();

        let outcome = store.upsert(&draft(1, "Ivysaur", 405)).await.unwrap();
        let UpsertOutcome::Updated(record) = outcome else {
            panic!("Expected update");
        };
        assert_eq!(record.id, original.id);
        assert_eq!(record.name, "Ivysaur");

        let outcome = store.upsert(&draft(2, "Venusaur", 525)).await.unwrap();
        assert!(matches!(outcome, UpsertOutcome::Inserted(_)));
        assert_eq!(store.count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_batch_is_atomic() {
        let store = MemoryRecordStore::new();
        store.insert(&draft(3, "Venusaur", 525)).await.unwrap();

        let batch = vec![draft(1, "Bulbasaur", 318), draft(3, "Clash", 0)];
        assert!(matches!(
            store.insert_batch(&batch).await,
            Err(StoreError::Conflict(_))
        ));
        assert_eq!(store.count().await.unwrap(), 1);

        let in_batch_duplicate = vec![draft(1, "Bulbasaur", 318), draft(1, "Again", 0)];
        assert!(store.insert_batch(&in_batch_duplicate).await.is_err());
        assert_eq!(store.count().await.unwrap(), 1);

        let batch = vec![draft(1, "Bulbasaur", 318), draft(2, "Ivysaur", 405)];
        assert_eq!(store.insert_batch(&batch).await.unwrap(), 2);
        assert_eq!(store.numbers().await.unwrap(), HashSet::from([1, 2, 3]));
    }

    #[tokio::test]
    async fn test_query_filter_sort_paginate() {
        let store = MemoryRecordStore::new();
        for n in 1..=12 {
            store.insert(&draft(n, &format!("Mon {n:02}"), n * 10)).await.unwrap();
        }

        let sort = SortSpec {
            column: Column::Total,
            direction: SortDirection::Asc,
        };
        let page = store.query(&query(None, sort, 2, 5)).await.unwrap();
        let numbers: Vec<i64> = page.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![6, 7, 8, 9, 10]);

        let desc = SortSpec {
            column: Column::Total,
            direction: SortDirection::Desc,
        };
        let page = store.query(&query(None, desc, 3, 5)).await.unwrap();
        let numbers: Vec<i64> = page.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![2, 1]);

        let filter = Filter::IntegerEquals(Column::Total, 70);
        let found = store
            .query(&query(Some(filter), SortSpec::default(), 1, 10))
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].number, 7);

        let beyond = store.query(&query(None, SortSpec::default(), 9, 10)).await.unwrap();
        assert!(beyond.is_empty());
    }
}
