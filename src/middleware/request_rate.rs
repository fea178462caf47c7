//! # Request-Rate Stage (§4.4)
//!
//! Consumes one token from the calling credential's request-rate bucket.
//! Runs after the authenticator, so `AdmissionContext` is always present;
//! its absence is itself an internal invariant violation, not a normal
//! 401 path.

use std::time::Instant;

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::context::AdmissionContext;
use crate::credential::mask_credential;
use crate::error::NexusError;
use crate::middleware::AppState;

pub async fn limit_request_rate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, NexusError> {
    let credential = req
        .extensions()
        .get::<AdmissionContext>()
        .ok_or_else(|| {
            NexusError::InternalInvariant("admission context missing at request-rate stage".to_string())
        })?
        .client_key
        .clone();

    let now = Instant::now();
    let bucket = state.request_registry.bucket_for(&credential, now);

    if !bucket.try_consume(1, now) {
        tracing::warn!(credential = %mask_credential(&credential), "request-rate limit exceeded");
        state.metrics.record_rejected_request_rate();
        return Err(NexusError::RateExceededRequests);
    }

    Ok(next.run(req).await)
}
