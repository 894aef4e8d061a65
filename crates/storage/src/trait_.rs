//! Record store trait definition
//!
//! Abstract interface over the records table. Backends must enforce the
//! uniqueness of `number` themselves and report violations as
//! [`StoreError::Conflict`]; callers never rely on pre-checks alone.

use async_trait::async_trait;
use dex_core::{Record, RecordDraft, RecordPatch, RecordQuery, ServiceError};
use std::collections::HashSet;
use std::sync::Arc;

/// Record store error
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Connection pool error: {0}")]
    Pool(String),

    #[error("Migration error: {0}")]
    Migration(String),

    #[error("Unique constraint violated: {0}")]
    Conflict(String),

    #[error("Storage task failed: {0}")]
    Task(String),
}

pub type StoreResult<T> = Result<T, StoreError>;

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict(detail) => ServiceError::Conflict(detail),
            other => ServiceError::StoreFailure(other.to_string()),
        }
    }
}

/// Result of a single upsert
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted(Record),
    Updated(Record),
}

impl UpsertOutcome {
    pub fn record(&self) -> &Record {
        match self {
            UpsertOutcome::Inserted(record) | UpsertOutcome::Updated(record) => record,
        }
    }
}

/// Storage trait for the records table
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Exact match on `number`
    async fn get(&self, number: i64) -> StoreResult<Option<Record>>;

    /// Exact match on the (`number`, `name`) pair
    async fn find_by_number_and_name(&self, number: i64, name: &str)
        -> StoreResult<Option<Record>>;

    /// Insert a new row and return it with its assigned id
    async fn insert(&self, draft: &RecordDraft) -> StoreResult<Record>;

    /// Apply the present fields of `patch` in one transaction; `None` if absent
    async fn update(&self, number: i64, patch: &RecordPatch) -> StoreResult<Option<Record>>;

    /// Remove a row; `false` if absent
    async fn delete(&self, number: i64) -> StoreResult<bool>;

    /// Filtered, sorted, paginated slice
    async fn query(&self, query: &RecordQuery) -> StoreResult<Vec<Record>>;

    /// Every `number` currently stored
    async fn numbers(&self) -> StoreResult<HashSet<i64>>;

    /// Update the row with the draft's number in place, or insert it, in its
    /// own transaction
    async fn upsert(&self, draft: &RecordDraft) -> StoreResult<UpsertOutcome>;

    /// Insert all drafts atomically; on error nothing is written
    async fn insert_batch(&self, drafts: &[RecordDraft]) -> StoreResult<usize>;

    async fn count(&self) -> StoreResult<usize>;
}

/// Shared record store reference
pub type SharedRecordStore = Arc<dyn RecordStore>;

#[cfg(test)]
mod tests {
    use super::*;
    use dex_core::ErrorKind;

    #[test]
    fn test_store_error_mapping() {
        let conflict: ServiceError = StoreError::Conflict("number 1".to_string()).into();
        assert_eq!(conflict.kind(), ErrorKind::Conflict);

        let failure: ServiceError = StoreError::Database("disk full".to_string()).into();
        assert_eq!(failure.kind(), ErrorKind::StoreFailure);
        assert_eq!(failure.detail(), "Database error: disk full");
    }
}
