//! Dex Core - data model
//!
//! Contains:
//! - Record: catalog entry, draft and partial-update types
//! - Query: column metadata and validated list queries
//! - Role: caller roles for the access gate
//! - Error: service error taxonomy
//! - Config: service configuration

mod record;
mod query;
mod role;
mod error;
pub mod config;

pub use record::*;
pub use query::*;
pub use role::*;
pub use error::*;
pub use config::{ImportMode, ServiceConfig};
