//! # Idle Timeout (§5)
//!
//! Bounds how long one request may occupy the admission chain. `axum::serve`
//! does not expose the raw per-connection idle timer a hand-rolled hyper
//! server builder would (no byte transferred for N seconds); the closest
//! equivalent reachable through the public `axum`/`tower` surface is a
//! timeout on the whole request-handling future, which is what this stage
//! enforces — the same approximation the retrieved pack's own
//! `tower_http::timeout::TimeoutLayer` users reach for in this spot.

use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use crate::middleware::AppState;

pub async fn enforce_idle_timeout(State(state): State<AppState>, req: Request, next: Next) -> Response {
    match tokio::time::timeout(state.idle_timeout, next.run(req)).await {
        Ok(response) => response,
        Err(_) => {
            tracing::warn!(timeout_secs = state.idle_timeout.as_secs(), "request exceeded idle timeout");
            (
                StatusCode::REQUEST_TIMEOUT,
                [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                "Request timed out",
            )
                .into_response()
        }
    }
}
