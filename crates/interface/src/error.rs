//! HTTP error responses
//!
//! Every failure leaves the API as `{"error": <kind>, "detail": <message>}`.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use dex_core::{ErrorKind, QueryError, ServiceError};
use dex_runtime::ImportError;
use dex_storage::StoreError;
use serde::Serialize;
use tracing::error;

/// Detail returned in place of internal store messages
const STORE_FAILURE_DETAIL: &str = "The record store failed to complete the request";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError(pub ServiceError);

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    detail: &'a str,
}

pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BadRequest => StatusCode::BAD_REQUEST,
        ErrorKind::Forbidden => StatusCode::FORBIDDEN,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Timeout => StatusCode::REQUEST_TIMEOUT,
        ErrorKind::StoreFailure => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl ApiError {
    pub fn bad_request(detail: impl Into<String>) -> Self {
        Self(ServiceError::BadRequest(detail.into()))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.0.kind();
        let detail = match kind {
            ErrorKind::StoreFailure => {
                error!(detail = %self.0.detail(), "Store failure");
                STORE_FAILURE_DETAIL
            }
            _ => self.0.detail(),
        };

        let body = ErrorBody {
            error: kind.as_str(),
            detail,
        };
        (status_for(kind), Json(body)).into_response()
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        Self(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        Self(err.into())
    }
}

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        Self(err.into())
    }
}

impl From<ImportError> for ApiError {
    fn from(err: ImportError) -> Self {
        Self(err.into())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
