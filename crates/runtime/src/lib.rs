//! Dex Runtime - import and query engines
//!
//! Responsibilities:
//! - Bulk import with unique-key reconciliation
//! - External feed retrieval (HTTP, file, static)
//! - List query validation
//!
//! Architecture:
//! - import/: Importer, key allocation, entry sources
//! - query: QueryEngine

pub mod import;
pub mod query;

pub use import::{
    EntrySource, ExternalEntry, FileEntrySource, HttpEntrySource, ImportError, ImportReport,
    Importer, KeyAllocator, KeyAssignment, SourceError, StaticEntrySource,
};
pub use query::{ListParams, QueryEngine};
