//! API routes module

pub mod connect;
pub mod health;
pub mod query;

use crate::state::AppState;
use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use connector::ConnectorError;
use serde::Serialize;

/// Create all API routes
pub fn routes(state: AppState) -> Router {
    Router::new()
        .route("/connect", post(connect::connect))
        .route("/query", post(query::query))
        .route("/health", get(health::health))
        .route("/ready", get(health::ready))
        .with_state(state)
}

/// Error payload returned by every failing endpoint.
#[derive(Debug, Serialize)]
pub struct ApiError {
    /// Stable machine-readable category
    pub kind: &'static str,
    pub error: String,
}

pub fn error_response(err: &ConnectorError) -> (StatusCode, axum::Json<ApiError>) {
    // Retryable failures all surface as 503 so callers know re-issuing
    // the request could succeed.
    let status = if err.is_retryable() {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        match err {
            ConnectorError::Authentication(_) => StatusCode::UNAUTHORIZED,
            ConnectorError::SessionClosed => StatusCode::CONFLICT,
            _ => StatusCode::BAD_REQUEST,
        }
    };
    (
        status,
        axum::Json(ApiError {
            kind: err.kind(),
            error: err.to_string(),
        }),
    )
}
