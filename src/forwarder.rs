//! # Forwarder (§4.8)
//!
//! Terminal stage of the admission pipeline: proxies the (already
//! authenticated, already rate-limited) request to the configured upstream
//! origin and streams the response back without buffering it in full.
//!
//! `axum` 0.7 and `reqwest` 0.11 sit on different major versions of the
//! `http` crate (1.x vs 0.2.x), so header/status/method values are not the
//! same types across the boundary — they're converted explicitly below
//! rather than assumed interchangeable.

use axum::body::Body;
use axum::extract::{Request, State};
use axum::response::Response;

use crate::error::NexusError;
use crate::middleware::AppState;

const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailers",
    "transfer-encoding",
    "upgrade",
];

fn is_hop_by_hop(name: &str) -> bool {
    HOP_BY_HOP.iter().any(|h| h.eq_ignore_ascii_case(name))
}

fn to_reqwest_headers(headers: &axum::http::HeaderMap) -> reqwest::header::HeaderMap {
    let mut out = reqwest::header::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if name == axum::http::header::HOST || is_hop_by_hop(name.as_str()) {
            continue;
        }
        let (Ok(reqwest_name), Ok(reqwest_value)) = (
            reqwest::header::HeaderName::from_bytes(name.as_str().as_bytes()),
            reqwest::header::HeaderValue::from_bytes(value.as_bytes()),
        ) else {
            continue;
        };
        out.append(reqwest_name, reqwest_value);
    }
    out
}

fn from_reqwest_headers(headers: &reqwest::header::HeaderMap) -> axum::http::HeaderMap {
    let mut out = axum::http::HeaderMap::with_capacity(headers.len());
    for (name, value) in headers.iter() {
        if is_hop_by_hop(name.as_str()) {
            continue;
        }
        let (Ok(axum_name), Ok(axum_value)) = (
            axum::http::HeaderName::from_bytes(name.as_str().as_bytes()),
            axum::http::HeaderValue::from_bytes(value.as_bytes()),
        ) else {
            continue;
        };
        out.append(axum_name, axum_value);
    }
    out
}

/// Proxies `req` (body already fully buffered by the token-rate stage) to
/// the configured upstream and streams the response back unbuffered.
pub async fn forward(State(state): State<AppState>, req: Request) -> Result<Response, NexusError> {
    let (parts, body) = req.into_parts();

    let body_bytes = axum::body::to_bytes(body, usize::MAX)
        .await
        .map_err(|e| NexusError::InternalInvariant(format!("body already buffered but unreadable: {e}")))?;

    let mut upstream_url = state.target_url.clone();
    upstream_url.set_path(parts.uri.path());
    upstream_url.set_query(parts.uri.query());

    let reqwest_method = reqwest::Method::from_bytes(parts.method.as_str().as_bytes())
        .map_err(|_| NexusError::ClientMalformed("unsupported HTTP method".to_string()))?;

    let upstream_response = state
        .http_client
        .request(reqwest_method, upstream_url)
        .headers(to_reqwest_headers(&parts.headers))
        .body(body_bytes)
        .send()
        .await
        .map_err(|e| {
            state.metrics.record_rejected_upstream();
            NexusError::UpstreamUnavailable(e.to_string())
        })?;

    let status = axum::http::StatusCode::from_u16(upstream_response.status().as_u16())
        .unwrap_or(axum::http::StatusCode::BAD_GATEWAY);
    let headers = from_reqwest_headers(upstream_response.headers());
    let stream = upstream_response.bytes_stream();

    let mut response_builder = Response::builder().status(status);
    if let Some(response_headers) = response_builder.headers_mut() {
        *response_headers = headers;
    }

    response_builder
        .body(Body::from_stream(stream))
        .map_err(|e| NexusError::InternalInvariant(format!("failed to assemble upstream response: {e}")))
}
