//! HTTP gateway exposing the cluster connector over a small JSON API.
//!
//! Endpoints:
//!
//! * `POST /connect` opens (or replaces) the gateway's session
//! * `POST /query` runs one SQL statement on the active session
//! * `GET /health` reports process liveness
//! * `GET /ready` reports session readiness

pub mod api;
pub mod config;
pub mod state;
