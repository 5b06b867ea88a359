//! Statement execution endpoint.

use crate::api::{ApiError, error_response};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use connector::ResultSet;
use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
pub struct QueryRequest {
    pub query: String,
}

/// Run one SQL statement and return its full result set as
/// `{"columns": [...], "rows": [{...}, ...]}`.
pub async fn query(
    State(state): State<AppState>,
    Json(req): Json<QueryRequest>,
) -> Result<Json<ResultSet>, (StatusCode, Json<ApiError>)> {
    match state.connector.query(&req.query).await {
        Ok(result) => {
            debug!(rows = result.row_count(), "query completed");
            Ok(Json(result))
        }
        Err(e) => {
            warn!("query failed: {}", e);
            Err(error_response(&e))
        }
    }
}
