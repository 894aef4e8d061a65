//! Bulk import with unique-key reconciliation
//!
//! Every entry's declared key is a candidate. Keys already stored, or handed
//! out earlier in the same batch, are skipped by probing upward one at a time
//! until a free key is found. Planning finishes before the first write, so a
//! batch that cannot be keyed never touches the store.

mod source;

pub use source::{
    EntrySource, ExternalEntry, FileEntrySource, HttpEntrySource, SourceError, StaticEntrySource,
};

use dex_core::{ImportMode, RecordDraft, ServiceError};
use dex_storage::{RecordStore, SharedRecordStore, StoreError};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{info, warn};

/// Import errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ImportError {
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("No free key at or above {candidate}")]
    KeySpaceExhausted { candidate: i64 },
}

impl From<ImportError> for ServiceError {
    fn from(err: ImportError) -> Self {
        match err {
            ImportError::Store(store) => store.into(),
            other => ServiceError::StoreFailure(other.to_string()),
        }
    }
}

/// An entry whose key had to move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct KeyAssignment {
    pub original: i64,
    pub assigned: i64,
}

/// Hands out keys not yet taken by the store or the current batch
#[derive(Debug, Clone, Default)]
pub struct KeyAllocator {
    taken: HashSet<i64>,
}

impl KeyAllocator {
    pub fn new(taken: HashSet<i64>) -> Self {
        Self { taken }
    }

    /// Smallest free key >= `candidate`, marked as taken
    pub fn assign(&mut self, candidate: i64) -> Result<i64, ImportError> {
        let mut key = candidate;
        while self.taken.contains(&key) {
            key = key
                .checked_add(1)
                .ok_or(ImportError::KeySpaceExhausted { candidate })?;
        }
        self.taken.insert(key);
        Ok(key)
    }
}

/// Outcome of one import run
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub mode: ImportMode,
    /// Entries received from the source
    pub received: usize,
    /// Rows inserted or updated
    pub written: usize,
    /// Entries skipped after a write failure (upsert mode only)
    pub failed: usize,
    pub reassigned: Vec<KeyAssignment>,
}

/// Reconciled batch ready to write
#[derive(Debug, Clone, Default)]
struct ImportPlan {
    drafts: Vec<RecordDraft>,
    reassigned: Vec<KeyAssignment>,
}

/// Bulk importer
#[derive(Clone)]
pub struct Importer {
    store: SharedRecordStore,
    mode: ImportMode,
}

impl Importer {
    pub fn new(store: SharedRecordStore, mode: ImportMode) -> Self {
        Self { store, mode }
    }

    /// Same importer writing with a different mode
    pub fn with_mode(&self, mode: ImportMode) -> Self {
        Self {
            store: self.store.clone(),
            mode,
        }
    }

    /// Fetch entries from `source` and import them
    pub async fn load_from(&self, source: &dyn EntrySource) -> Result<ImportReport, ImportError> {
        info!(source = %source.describe(), mode = ?self.mode, "Loading entries");
        let entries = source.fetch().await?;
        self.import(&entries).await
    }

    /// Reconcile keys and write `entries`
    pub async fn import(&self, entries: &[ExternalEntry]) -> Result<ImportReport, ImportError> {
        let existing = self.store.numbers().await?;
        let plan = plan(KeyAllocator::new(existing), entries)?;

        let (written, failed) = match self.mode {
            ImportMode::Upsert => self.write_each(&plan.drafts).await,
            ImportMode::Bulk => (self.store.insert_batch(&plan.drafts).await?, 0),
        };

        info!(
            received = entries.len(),
            written,
            failed,
            reassigned = plan.reassigned.len(),
            "Import finished"
        );

        Ok(ImportReport {
            mode: self.mode,
            received: entries.len(),
            written,
            failed,
            reassigned: plan.reassigned,
        })
    }

    async fn write_each(&self, drafts: &[RecordDraft]) -> (usize, usize) {
        let mut written = 0;
        let mut failed = 0;
        for draft in drafts {
            match self.store.upsert(draft).await {
                Ok(_) => written += 1,
                Err(err) => {
                    warn!(number = draft.number, name = %draft.name, error = %err, "Skipping entry");
                    failed += 1;
                }
            }
        }
        (written, failed)
    }
}

fn plan(mut keys: KeyAllocator, entries: &[ExternalEntry]) -> Result<ImportPlan, ImportError> {
    let mut plan = ImportPlan {
        drafts: Vec::with_capacity(entries.len()),
        reassigned: Vec::new(),
    };

    for entry in entries {
        let assigned = keys.assign(entry.number)?;
        if assigned != entry.number {
            info!(original = entry.number, assigned, name = %entry.name, "Key reassigned");
            plan.reassigned.push(KeyAssignment {
                original: entry.number,
                assigned,
            });
        }
        plan.drafts.push(entry.to_draft(assigned));
    }

    Ok(plan)
}
