//! Session establishment endpoint.

use crate::api::{ApiError, error_response};
use crate::state::AppState;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use connector::{Credentials, Endpoint};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    /// One or more contact points, comma separated, each `host[:port]`
    pub host: String,
    /// Port for contact points that do not carry their own
    #[serde(default = "default_port")]
    pub port: u16,
    pub db: String,
    pub user: String,
    #[serde(default)]
    pub password: String,
}

fn default_port() -> u16 {
    5433
}

#[derive(Debug, Serialize)]
pub struct ConnectResponse {
    pub connected: bool,
    /// The endpoint the session prefers for queries
    pub endpoint: String,
}

pub async fn connect(
    State(state): State<AppState>,
    Json(req): Json<ConnectRequest>,
) -> Result<Json<ConnectResponse>, (StatusCode, Json<ApiError>)> {
    let hosts: Vec<String> = req
        .host
        .split(',')
        .map(|h| h.trim().to_string())
        .filter(|h| !h.is_empty())
        .collect();
    let endpoints = Endpoint::parse_list(&hosts, req.port).map_err(|e| {
        (
            StatusCode::BAD_REQUEST,
            Json(ApiError {
                kind: "invalid_request",
                error: e.to_string(),
            }),
        )
    })?;

    // Credentials pass through untouched; only the database layer
    // interprets them.
    let credentials = Credentials::new(&req.db, &req.user, &req.password);

    match state.connector.connect(&endpoints, credentials).await {
        Ok(preferred) => {
            let endpoint = preferred.map(|e| e.to_string()).unwrap_or_default();
            info!("session established via {}", endpoint);
            Ok(Json(ConnectResponse {
                connected: true,
                endpoint,
            }))
        }
        Err(e) => {
            warn!("connect failed: {}", e);
            Err(error_response(&e))
        }
    }
}
