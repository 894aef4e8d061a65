//! Service error taxonomy
//!
//! Every failure the API reports is one of these kinds. Lower layers keep
//! their own error enums and convert into this one at the service boundary.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::query::QueryError;
use crate::role::InvalidRole;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    BadRequest,
    Forbidden,
    NotFound,
    Conflict,
    Timeout,
    StoreFailure,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorKind::BadRequest => "bad_request",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::Timeout => "timeout",
            ErrorKind::StoreFailure => "store_failure",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServiceError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Store failure: {0}")]
    StoreFailure(String),
}

impl ServiceError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ServiceError::BadRequest(_) => ErrorKind::BadRequest,
            ServiceError::Forbidden(_) => ErrorKind::Forbidden,
            ServiceError::NotFound(_) => ErrorKind::NotFound,
            ServiceError::Conflict(_) => ErrorKind::Conflict,
            ServiceError::Timeout(_) => ErrorKind::Timeout,
            ServiceError::StoreFailure(_) => ErrorKind::StoreFailure,
        }
    }

    /// Human-readable detail without the kind prefix
    pub fn detail(&self) -> &str {
        match self {
            ServiceError::BadRequest(detail)
            | ServiceError::Forbidden(detail)
            | ServiceError::NotFound(detail)
            | ServiceError::Conflict(detail)
            | ServiceError::Timeout(detail)
            | ServiceError::StoreFailure(detail) => detail,
        }
    }

    pub fn record_not_found(number: i64) -> Self {
        ServiceError::NotFound(format!("Record {number} not found"))
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}

impl From<InvalidRole> for ServiceError {
    fn from(err: InvalidRole) -> Self {
        ServiceError::BadRequest(err.to_string())
    }
}
