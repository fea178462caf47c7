//! # Authenticator Stage (§4.2)
//!
//! Identifies the client credential from `Authorization`, rejects unknown
//! ones, and rewrites the header to the upstream value before attaching an
//! [`AdmissionContext`] for the remaining stages.

use axum::extract::{Request, State};
use axum::http::{header, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;

use crate::context::AdmissionContext;
use crate::credential::{mask_credential, Resolution};
use crate::error::NexusError;
use crate::middleware::AppState;

const BEARER_PREFIX: &str = "Bearer ";

enum AuthForm {
    Bearer,
    Bare,
}

/// Splits `Bearer <key>` from a bare `<key>`. The `Bearer` prefix is
/// matched case-sensitively per §4.2 and preserved on the rewritten header.
fn split_auth_header(value: &str) -> (AuthForm, &str) {
    match value.strip_prefix(BEARER_PREFIX) {
        Some(rest) => (AuthForm::Bearer, rest),
        None => (AuthForm::Bare, value),
    }
}

pub async fn authenticate(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, NexusError> {
    let raw_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let (form, raw_key) = split_auth_header(raw_header);
    let client_key = raw_key.trim();

    if client_key.is_empty() {
        tracing::warn!("rejected request with no API key");
        state.metrics.record_rejected_auth();
        return Err(NexusError::Unauthenticated("Missing API key"));
    }

    let upstream_key = match state.credential_map.resolve(client_key) {
        Resolution::PassThrough => client_key.to_string(),
        Resolution::Upstream(upstream) => upstream,
        Resolution::Unknown => {
            tracing::warn!(credential = %mask_credential(client_key), "unknown credential");
            state.metrics.record_rejected_auth();
            return Err(NexusError::Unauthenticated("Invalid API key"));
        }
        Resolution::EmptyMapping => {
            tracing::warn!(credential = %mask_credential(client_key), "credential mapped to empty upstream value");
            state.metrics.record_rejected_auth();
            return Err(NexusError::Unauthenticated("Authentication failed"));
        }
    };

    let outgoing_value = match form {
        AuthForm::Bearer => format!("{BEARER_PREFIX}{upstream_key}"),
        AuthForm::Bare => upstream_key.clone(),
    };
    let header_value = HeaderValue::from_str(&outgoing_value).map_err(|_| {
        NexusError::InternalInvariant("rewritten Authorization header is not a valid header value".to_string())
    })?;
    req.headers_mut().insert(header::AUTHORIZATION, header_value);

    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut()
        .insert(AdmissionContext::new(client_key.to_string(), upstream_key, method, path));

    Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_prefix_is_stripped_and_remembered() {
        let (form, key) = split_auth_header("Bearer sk-raw");
        assert!(matches!(form, AuthForm::Bearer));
        assert_eq!(key, "sk-raw");
    }

    #[test]
    fn bare_key_has_no_prefix() {
        let (form, key) = split_auth_header("sk-raw");
        assert!(matches!(form, AuthForm::Bare));
        assert_eq!(key, "sk-raw");
    }

    #[test]
    fn lowercase_bearer_is_not_stripped() {
        // Case-sensitive per the authenticator contract.
        let (form, key) = split_auth_header("bearer sk-raw");
        assert!(matches!(form, AuthForm::Bare));
        assert_eq!(key, "bearer sk-raw");
    }
}
