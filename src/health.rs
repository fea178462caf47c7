//! # Health & Readiness
//!
//! `GET /health` and `GET /ready` (§6), registered outside the admission
//! chain: unauthenticated, unmetered, always answered. Nexus has no
//! external dependency the way the teacher's service had Redis, so
//! readiness mirrors liveness once the server has started serving.

use axum::extract::State;
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Serialize;

use crate::middleware::AppState;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    timestamp: String,
}

#[derive(Debug, Serialize)]
struct ReadyResponse {
    ready: bool,
    credential_map_configured: bool,
}

pub async fn health() -> Response {
    Json(HealthResponse {
        status: "healthy",
        version: VERSION,
        timestamp: Utc::now().to_rfc3339(),
    })
    .into_response()
}

pub async fn ready(State(state): State<AppState>) -> Response {
    Json(ReadyResponse {
        ready: true,
        credential_map_configured: state.credential_map.is_configured(),
    })
    .into_response()
}
