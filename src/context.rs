//! # Admission Context
//!
//! Per-request derived state created by the authenticator (§3) and carried
//! through the remaining stages as a request extension. Owned exclusively
//! by the task handling its request; never shared across requests.

use axum::http::Method;

/// Request-scoped state threaded through the admission pipeline after the
/// authenticator accepts a credential.
#[derive(Debug, Clone)]
pub struct AdmissionContext {
    /// The inbound client-key, used as the rate-limit identity for both
    /// registries. Never forwarded upstream.
    pub client_key: String,
    /// The value written onto the outbound `Authorization` header.
    pub upstream_key: String,
    /// Filled in by the token-rate stage once the estimator runs; `None`
    /// until then.
    pub estimated_tokens: Option<u64>,
    pub method: Method,
    pub path: String,
}

impl AdmissionContext {
    pub fn new(client_key: String, upstream_key: String, method: Method, path: String) -> Self {
        Self {
            client_key,
            upstream_key,
            estimated_tokens: None,
            method,
            path,
        }
    }
}
