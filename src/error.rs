//! # Error Types and Handling
//!
//! This module defines the error taxonomy for Nexus and its automatic
//! conversion to the plain-text HTTP responses the admission pipeline
//! produces.
//!
//! ## Error to HTTP Status Mapping
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  NexusError Variant      │  HTTP Status        │  Response Body  │
//! │  ─────────────────────────┼─────────────────────┼─────────────────│
//! │  ClientMalformed          │  400 / 413          │  plain text     │
//! │  Unauthenticated          │  401                │  plain text     │
//! │  RateExceededRequests     │  429                │  plain text     │
//! │  RateExceededTokens       │  429                │  plain text     │
//! │  UpstreamUnavailable      │  502                │  plain text     │
//! │  ConfigFatal              │  n/a (startup only) │  process exit   │
//! │  InternalInvariant        │  500                │  plain text     │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `ConfigFatal` never reaches a client: it aborts startup before the
//! server binds. Everything else implements [`IntoResponse`].

use axum::{
    body::Body,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

/// The error taxonomy for every outcome the admission pipeline can produce
/// on its own behalf (upstream 4xx/5xx responses are forwarded as-is and
/// never become a `NexusError`).
#[derive(Debug, Error, Clone)]
pub enum NexusError {
    /// Malformed request framing (e.g. a body-bearing method with neither
    /// `Content-Length` nor `Transfer-Encoding`). Maps to 400.
    #[error("malformed request: {0}")]
    ClientMalformed(String),

    /// Request body declared or observed larger than the configured cap.
    /// Maps to 413.
    #[error("payload too large")]
    PayloadTooLarge,

    /// Missing, unknown, or un-mapped credential. Maps to 401 with a
    /// fixed short message chosen at the call site.
    #[error("{0}")]
    Unauthenticated(&'static str),

    /// Request-rate bucket denied the request. Maps to 429.
    #[error("too many requests")]
    RateExceededRequests,

    /// Token-rate bucket denied the request. Maps to 429.
    #[error("token limit exceeded")]
    RateExceededTokens,

    /// The token-cost estimator failed to read the request body. Maps to
    /// 400 (treated as a malformed request, not a rate decision).
    #[error("could not read request body: {0}")]
    BodyReadFailed(String),

    /// Transport failure reaching the upstream origin. Maps to 502.
    #[error("upstream unavailable: {0}")]
    UpstreamUnavailable(String),

    /// Invalid configuration detected at startup. Never served to a
    /// client; causes a non-zero process exit before binding.
    #[error("configuration error: {0}")]
    ConfigFatal(String),

    /// An assertion-like condition that must not occur (e.g. a bucket's
    /// token count observed outside `[0, burst]`). Logged at error level
    /// and answered with 500; must never abort the sweeper or server.
    #[error("internal invariant violated: {0}")]
    InternalInvariant(String),
}

impl NexusError {
    fn status(&self) -> StatusCode {
        match self {
            NexusError::ClientMalformed(_) => StatusCode::BAD_REQUEST,
            NexusError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            NexusError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            NexusError::RateExceededRequests => StatusCode::TOO_MANY_REQUESTS,
            NexusError::RateExceededTokens => StatusCode::TOO_MANY_REQUESTS,
            NexusError::BodyReadFailed(_) => StatusCode::BAD_REQUEST,
            NexusError::UpstreamUnavailable(_) => StatusCode::BAD_GATEWAY,
            NexusError::ConfigFatal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            NexusError::InternalInvariant(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The short plain-text body mandated by the external interface spec.
    fn body_text(&self) -> String {
        match self {
            NexusError::ClientMalformed(_) => "Invalid request format".to_string(),
            NexusError::PayloadTooLarge => "Payload too large".to_string(),
            NexusError::Unauthenticated(msg) => msg.to_string(),
            NexusError::RateExceededRequests => "Too many requests".to_string(),
            NexusError::RateExceededTokens => "Token limit exceeded".to_string(),
            NexusError::BodyReadFailed(_) => "Invalid request format".to_string(),
            NexusError::UpstreamUnavailable(_) => "Bad gateway".to_string(),
            NexusError::ConfigFatal(_) => "Internal server error".to_string(),
            NexusError::InternalInvariant(_) => "Internal server error".to_string(),
        }
    }
}

impl IntoResponse for NexusError {
    fn into_response(self) -> Response {
        if let NexusError::InternalInvariant(ref msg) = self {
            tracing::error!(invariant = %msg, "internal invariant violated");
        }

        Response::builder()
            .status(self.status())
            .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(Body::from(self.body_text()))
            .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
    }
}

pub type NexusResult<T> = std::result::Result<T, NexusError>;
