//! Route handlers
//!
//! Each handler checks the role claim against its allow-list before looking
//! at the path, query string or body.

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use dex_core::{ImportMode, Record, RecordDraft, RecordPatch, ServiceError};
use dex_runtime::{ImportReport, ListParams};
use dex_storage::RecordStore;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::access::{ADMIN_ONLY, ANY_ROLE, RoleClaim};
use crate::daemon::AppState;
use crate::error::{ApiError, ApiResult};

fn rejected(rejection: impl std::fmt::Display) -> ApiError {
    ApiError::bad_request(rejection.to_string())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Optional override of the configured import mode
#[derive(Debug, Default, Deserialize)]
pub struct LoadParams {
    pub mode: Option<ImportMode>,
}

#[derive(Debug, Serialize)]
pub struct LoadResponse {
    pub message: String,
    #[serde(flatten)]
    pub report: ImportReport,
}

pub async fn load_records(
    State(state): State<AppState>,
    claim: RoleClaim,
    params: Result<Query<LoadParams>, QueryRejection>,
) -> ApiResult<Json<LoadResponse>> {
    claim.require(ADMIN_ONLY)?;
    let Query(params) = params.map_err(rejected)?;

    let importer = match params.mode {
        Some(mode) => state.importer.with_mode(mode),
        None => state.importer.clone(),
    };
    let report = importer.load_from(state.source.as_ref()).await?;

    Ok(Json(LoadResponse {
        message: format!(
            "Imported {} of {} entries ({} reassigned)",
            report.written,
            report.received,
            report.reassigned.len()
        ),
        report,
    }))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ListResponse {
    pub results: Vec<Record>,
}

pub async fn list_records(
    State(state): State<AppState>,
    claim: RoleClaim,
    params: Result<Query<ListParams>, QueryRejection>,
) -> ApiResult<Json<ListResponse>> {
    claim.require(ANY_ROLE)?;
    let Query(params) = params.map_err(rejected)?;

    let results = state.queries.execute(state.store.as_ref(), &params).await?;
    Ok(Json(ListResponse { results }))
}

pub async fn get_record(
    State(state): State<AppState>,
    claim: RoleClaim,
    number: Result<Path<i64>, PathRejection>,
) -> ApiResult<Json<Record>> {
    claim.require(ANY_ROLE)?;
    let Path(number) = number.map_err(rejected)?;

    let record = state
        .store
        .get(number)
        .await?
        .ok_or_else(|| ServiceError::record_not_found(number))?;
    Ok(Json(record))
}

pub async fn create_record(
    State(state): State<AppState>,
    claim: RoleClaim,
    payload: Result<Json<RecordDraft>, JsonRejection>,
) -> ApiResult<Json<Record>> {
    claim.require(ANY_ROLE)?;
    let Json(draft) = payload.map_err(rejected)?;

    if state
        .store
        .find_by_number_and_name(draft.number, &draft.name)
        .await?
        .is_some()
    {
        return Err(ServiceError::Conflict(format!(
            "Record {} '{}' already exists",
            draft.number, draft.name
        ))
        .into());
    }

    // A different name under the same number still trips the unique constraint
    let record = state.store.insert(&draft).await?;
    info!(number = record.number, id = record.id, "Record created");
    Ok(Json(record))
}

/// Shared by PUT and PATCH; only present fields change
pub async fn update_record(
    State(state): State<AppState>,
    claim: RoleClaim,
    number: Result<Path<i64>, PathRejection>,
    payload: Result<Json<RecordPatch>, JsonRejection>,
) -> ApiResult<Json<Record>> {
    claim.require(ANY_ROLE)?;
    let Path(number) = number.map_err(rejected)?;
    let Json(patch) = payload.map_err(rejected)?;

    let record = state
        .store
        .update(number, &patch)
        .await?
        .ok_or_else(|| ServiceError::record_not_found(number))?;
    info!(number, "Record updated");
    Ok(Json(record))
}

pub async fn delete_record(
    State(state): State<AppState>,
    claim: RoleClaim,
    number: Result<Path<i64>, PathRejection>,
) -> ApiResult<StatusCode> {
    claim.require(ANY_ROLE)?;
    let Path(number) = number.map_err(rejected)?;

    if !state.store.delete(number).await? {
        return Err(ServiceError::record_not_found(number).into());
    }
    info!(number, "Record deleted");
    Ok(StatusCode::NO_CONTENT)
}
