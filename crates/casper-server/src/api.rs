//! HTTP handlers for the customer API.

use crate::AppState;
use axum::{
    extract::{Extension, Json, Path, Query},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use casper_app::customers::{
    CreateCustomer, CustomerDto, DeleteCustomer, GetCustomer, ListCustomers, RenameCustomer,
};
use casper_app::{CancelSignal, DataError, HandlerError, Request};
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

/// Request body for `PUT /api/v1/customers/{id}`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenameBody {
    /// The new display name.
    pub name: String,
    /// The version the caller last read.
    pub expected_version: i64,
}

/// Query string for `DELETE /api/v1/customers/{id}`.
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    /// The version the caller last read.
    pub version: i64,
}

/// API error type mapping to HTTP status codes.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid input: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    #[error("internal server error: {0}")]
    InternalServerError(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::InternalServerError(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
        };

        let body = Json(serde_json::json!({
            "error": message
        }));

        (status, body).into_response()
    }
}

impl From<HandlerError> for ApiError {
    fn from(err: HandlerError) -> Self {
        match err {
            HandlerError::Validation(msg) => ApiError::BadRequest(msg),
            HandlerError::Data(DataError::ConstraintViolation(msg)) => ApiError::Conflict(msg),
            HandlerError::Data(e @ DataError::ConcurrencyConflict { .. }) => {
                ApiError::Conflict(e.to_string())
            }
            HandlerError::Data(e @ (DataError::Connectivity(_) | DataError::Cancelled)) => {
                tracing::warn!(error = %e, "request could not reach the store");
                ApiError::ServiceUnavailable(e.to_string())
            }
            other => {
                // Query and dispatch failures are programming errors; keep
                // their detail in the log, not the response.
                tracing::error!(error = %other, "request failed");
                ApiError::InternalServerError("internal error".to_string())
            }
        }
    }
}

/// Sends one request through the dispatcher.
///
/// The request is cancelled if this future is dropped before it finishes,
/// so a client disconnect stops any in-flight commit.
async fn dispatch<R: Request>(state: &AppState, request: R) -> Result<R::Response, ApiError> {
    let cancel = CancelSignal::new();
    let guard = cancel.drop_guard();
    let res = state.dispatcher.send(request, &cancel).await;
    guard.disarm();
    Ok(res?)
}

/// Handler for `GET /api/v1/customers`.
pub async fn list_customers_handler(
    Extension(state): Extension<Arc<AppState>>,
    Query(params): Query<ListCustomers>,
) -> Result<Json<Vec<CustomerDto>>, ApiError> {
    dispatch(&state, params).await.map(Json)
}

/// Handler for `GET /api/v1/customers/{id}`.
pub async fn get_customer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<CustomerDto>, ApiError> {
    dispatch(&state, GetCustomer { id })
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("customer {id}")))
}

/// Handler for `POST /api/v1/customers`.
pub async fn create_customer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Json(payload): Json<CreateCustomer>,
) -> Result<(StatusCode, Json<CustomerDto>), ApiError> {
    let created = dispatch(&state, payload).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Handler for `PUT /api/v1/customers/{id}`.
pub async fn rename_customer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Json(body): Json<RenameBody>,
) -> Result<Json<CustomerDto>, ApiError> {
    let request = RenameCustomer {
        id,
        name: body.name,
        expected_version: body.expected_version,
    };
    dispatch(&state, request).await.map(Json)
}

/// Handler for `DELETE /api/v1/customers/{id}?version=N`.
pub async fn delete_customer_handler(
    Extension(state): Extension<Arc<AppState>>,
    Path(id): Path<i64>,
    Query(params): Query<DeleteParams>,
) -> Result<StatusCode, ApiError> {
    let request = DeleteCustomer {
        id,
        expected_version: params.version,
    };
    dispatch(&state, request).await?;
    Ok(StatusCode::NO_CONTENT)
}
