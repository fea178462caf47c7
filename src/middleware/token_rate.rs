//! # Token-Rate Stage (§4.6)
//!
//! Buffers the request body once — the only place in the pipeline that
//! does — estimates its token cost, and consumes that many tokens from the
//! credential's token-rate bucket. The buffered bytes replace the request
//! body so the forwarder sees it intact (§4.5 P6: body preservation).

use std::time::Instant;

use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::Response;

use crate::context::AdmissionContext;
use crate::credential::mask_credential;
use crate::error::NexusError;
use crate::estimator::estimate_tokens;
use crate::middleware::AppState;

pub async fn limit_token_rate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, NexusError> {
    let (mut parts, body) = req.into_parts();

    let body_bytes = to_bytes(body, state.max_body_bytes as usize).await.map_err(|err| {
        tracing::debug!(error = %err, "body read failed in token-rate stage");
        NexusError::BodyReadFailed(err.to_string())
    })?;

    let tokens_needed = estimate_tokens(&body_bytes);

    let context = parts
        .extensions
        .get_mut::<AdmissionContext>()
        .ok_or_else(|| NexusError::InternalInvariant("admission context missing at token-rate stage".to_string()))?;
    let credential = context.client_key.clone();
    context.estimated_tokens = Some(tokens_needed);

    let now = Instant::now();
    let bucket = state.token_registry.bucket_for(&credential, now);

    if !bucket.try_consume(tokens_needed, now) {
        tracing::warn!(
            credential = %mask_credential(&credential),
            tokens_needed,
            "token-rate limit exceeded"
        );
        state.metrics.record_rejected_token_rate();
        return Err(NexusError::RateExceededTokens);
    }

    state.metrics.record_admitted();
    let req = Request::from_parts(parts, Body::from(body_bytes));
    Ok(next.run(req).await)
}
