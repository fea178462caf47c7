//! # Validator Stage (§4.1)
//!
//! First stop in the chain: reject malformed or oversized requests before
//! any expensive work happens. Only inspects headers — the body itself is
//! never touched here, so a request that is going to be rejected never
//! causes a read.

use axum::extract::{Request, State};
use axum::http::{header, Method};
use axum::middleware::Next;
use axum::response::Response;

use crate::error::NexusError;
use crate::middleware::AppState;

fn method_requires_body(method: &Method) -> bool {
    matches!(*method, Method::POST | Method::PUT | Method::PATCH)
}

pub async fn validate(
    State(state): State<AppState>,
    req: Request,
    next: Next,
) -> Result<Response, NexusError> {
    let method = req.method().clone();
    let headers = req.headers();

    match headers.get(header::CONTENT_LENGTH) {
        Some(value) => {
            let declared_len: u64 = value
                .to_str()
                .ok()
                .and_then(|s| s.parse().ok())
                .ok_or_else(|| NexusError::ClientMalformed("invalid Content-Length".to_string()))?;

            if declared_len > state.max_body_bytes {
                state.metrics.record_rejected_validate();
                return Err(NexusError::PayloadTooLarge);
            }
        }
        None => {
            let has_transfer_encoding = headers.get(header::TRANSFER_ENCODING).is_some();
            if method_requires_body(&method) && !has_transfer_encoding {
                state.metrics.record_rejected_validate();
                return Err(NexusError::ClientMalformed(
                    "missing Content-Length or Transfer-Encoding".to_string(),
                ));
            }
        }
    }

    Ok(next.run(req).await)
}
