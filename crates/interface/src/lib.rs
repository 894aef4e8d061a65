//! Dex Interface - HTTP API and CLI
//!
//! Responsibilities:
//! - HTTP API over the record store
//! - Role-based access gate
//! - Error-to-response mapping
//! - CLI entry point and logging setup
//!
//! Architecture:
//! - daemon: router, shared state, server lifecycle
//! - handlers: one handler per endpoint
//! - access: role claim extraction and allow-lists
//! - error: JSON error bodies
//! - cli: command line interface

pub mod access;
pub mod cli;
pub mod daemon;
pub mod error;
pub mod handlers;


#[cfg(test)]
mod daemon_tests;

pub use access::{ADMIN_ONLY, ANY_ROLE, ROLE_HEADER, RoleClaim};
pub use cli::{CliError, run_cli};
pub use daemon::{AppState, open_store, router, run_daemon};
pub use error::{ApiError, ApiResult};
