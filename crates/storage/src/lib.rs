// Dex Storage Layer
//
// Abstract record store with pluggable backends

pub mod trait_;
pub mod memory;

#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use trait_::*;
pub use memory::{MemoryRecordStore, create_memory_store};

#[cfg(feature = "sqlite")]
pub use sqlite::{SqliteRecordStore, create_sqlite_store};
