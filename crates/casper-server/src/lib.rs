//! Casper HTTP server.
//!
//! Builds the two connection pools, bootstraps the schema, registers the
//! customer handlers and exposes them over axum.

pub mod api;
pub mod config;

use axum::{
    extract::DefaultBodyLimit,
    routing::get,
    Extension, Json, Router,
};
use casper_app::{customers, DataStores, DispatchError, Dispatcher, DispatcherBuilder};
use casper_db::{create_pool, AccessMode, PoolError};
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;

pub use api::ApiError;

/// Largest accepted request body.
const MAX_REQUEST_BODY_BYTES: usize = 64 * 1024;

/// Shared application state.
pub struct AppState {
    /// Routes every request to its handler.
    pub dispatcher: Dispatcher,
}

impl AppState {
    /// Registers the customer handlers against `stores`.
    ///
    /// # Errors
    ///
    /// Returns `DispatchError::DuplicateHandler` if registration collides.
    pub fn new(stores: DataStores) -> Result<Self, DispatchError> {
        let dispatcher = customers::register(DispatcherBuilder::new())?.build(stores);
        Ok(Self { dispatcher })
    }
}

/// Errors that can occur while preparing the data stores.
#[derive(Debug, Error)]
pub enum StartupError {
    /// A pool could not be built (bad path, missing read store).
    #[error(transparent)]
    Pool(#[from] PoolError),

    /// No write connection was available for the schema bootstrap.
    #[error("failed to check out a write connection: {0}")]
    Connection(#[from] r2d2::Error),

    /// The schema script failed.
    #[error("failed to apply schema: {0}")]
    Schema(#[from] rusqlite::Error),
}

/// Opens the write pool, applies the customer schema, then opens the read
/// pool.
///
/// The write pool goes first so a fresh file is created in WAL mode before
/// any read-only connection touches it.
///
/// # Errors
///
/// Returns `StartupError` if either pool cannot be built or the schema
/// fails to apply.
pub fn open_stores(db: &config::DatabaseConfig) -> Result<DataStores, StartupError> {
    let settings = db.runtime_settings();

    let write = create_pool(&db.write_connection, AccessMode::ReadWrite, settings)?;
    write.get()?.execute_batch(customers::SCHEMA)?;
    tracing::info!(path = %db.write_connection, "write store ready");

    let read = create_pool(&db.read_connection, AccessMode::ReadOnly, settings)?;
    tracing::info!(path = %db.read_connection, "read store ready");

    Ok(DataStores::new(read, write))
}

/// Health check handler.
async fn health() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// Builds the application router with all routes.
pub fn app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/api/v1/customers",
            get(api::list_customers_handler).post(api::create_customer_handler),
        )
        .route(
            "/api/v1/customers/{id}",
            get(api::get_customer_handler)
                .put(api::rename_customer_handler)
                .delete(api::delete_customer_handler),
        )
        .layer(DefaultBodyLimit::max(MAX_REQUEST_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(Extension(Arc::new(state)))
}
