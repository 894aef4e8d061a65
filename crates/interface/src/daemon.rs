//! Daemon - HTTP API server
//!
//! Responsibilities:
//! - Route table and shared state
//! - Request tracing and timeouts
//! - Listener lifecycle

use axum::error_handling::HandleErrorLayer;
use axum::{BoxError, Router};
use axum::routing::{get, post};
use dex_core::{ServiceConfig, ServiceError};
use dex_runtime::{EntrySource, HttpEntrySource, Importer, QueryEngine};
use dex_storage::{SharedRecordStore, create_sqlite_store};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceBuilder;
use tower::timeout::TimeoutLayer;
use tower::timeout::error::Elapsed;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cli::CliError;
use crate::error::ApiError;
use crate::handlers;

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub store: SharedRecordStore,
    pub importer: Importer,
    /// Feed used by `POST /records/load`
    pub source: Arc<dyn EntrySource>,
    pub queries: QueryEngine,
}

impl AppState {
    pub fn new(
        store: SharedRecordStore,
        source: Arc<dyn EntrySource>,
        config: &ServiceConfig,
    ) -> Self {
        Self {
            importer: Importer::new(store.clone(), config.import.mode),
            store,
            source,
            queries: QueryEngine::new(&config.query),
        }
    }

    /// Open the configured SQLite store and HTTP feed
    pub async fn from_config(config: &ServiceConfig) -> Result<Self, CliError> {
        let store = open_store(config).await?;
        let source = HttpEntrySource::from_config(&config.import)
            .map_err(|e| CliError::SourceError(e.to_string()))?;

        Ok(Self::new(store, Arc::new(source), config))
    }
}

/// Open the SQLite store named by `config`
pub async fn open_store(config: &ServiceConfig) -> Result<SharedRecordStore, CliError> {
    create_sqlite_store(
        config.storage.db_path.clone(),
        config.storage.pool_size,
        Duration::from_millis(config.storage.busy_timeout_ms),
    )
    .await
    .map_err(|e| CliError::StorageError(e.to_string()))
}

/// Build the API router
pub fn router(state: AppState, request_timeout: Duration) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .route(
            "/records",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route(
            "/records/",
            get(handlers::list_records).post(handlers::create_record),
        )
        .route("/records/load", post(handlers::load_records))
        .route(
            "/records/:number",
            get(handlers::get_record)
                .put(handlers::update_record)
                .patch(handlers::update_record)
                .delete(handlers::delete_record),
        )
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(HandleErrorLayer::new(handle_middleware_error))
                .layer(TimeoutLayer::new(request_timeout)),
        )
}

/// Turn middleware failures into the usual error body
async fn handle_middleware_error(err: BoxError) -> ApiError {
    if err.is::<Elapsed>() {
        ApiError(ServiceError::Timeout(
            "Request did not complete in time".to_string(),
        ))
    } else {
        ApiError(ServiceError::StoreFailure(err.to_string()))
    }
}

/// Serve the API on `address` until the process is stopped
pub async fn run_daemon(
    address: SocketAddr,
    state: AppState,
    request_timeout: Duration,
) -> Result<(), CliError> {
    let app = router(state, request_timeout);
    let listener = tokio::net::TcpListener::bind(address)
        .await
        .map_err(|e| CliError::ServerError(e.to_string()))?;

    info!("Listening on {}", address);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| CliError::ServerError(e.to_string()))
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutting down");
    }
}
