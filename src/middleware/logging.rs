//! # Request Logging Middleware
//!
//! Structured access logging for every request the server handles,
//! admitted or rejected. This stage wraps the whole chain, so it only ever
//! sees method/path/status/duration; credentials are masked and logged by
//! the stage that actually resolves one (see
//! [`crate::credential::mask_credential`]) rather than here.

use std::time::Instant;

use axum::extract::Request;
use axum::middleware::Next;
use axum::response::Response;
use tracing::{info, warn};

pub async fn log_requests(request: Request, next: Next) -> Response {
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    let response = next.run(request).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status().as_u16();

    if status < 400 {
        info!(%method, %path, status, duration_ms, "request completed");
    } else {
        warn!(%method, %path, status, duration_ms, "request rejected");
    }

    response
}
