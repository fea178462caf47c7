//! # Admission Pipeline Stages
//!
//! Each submodule is one stage of the chain described in §2/§4: validator,
//! authenticator, request-rate limiter, token-rate limiter. The forwarder
//! (§4.8) lives at the crate root in `forwarder.rs` since it is the
//! terminal handler rather than a `Next`-wrapping middleware.
//!
//! Stages are plain `axum::middleware::from_fn_with_state` functions
//! returning `Result<Response, NexusError>` — `NexusError`'s `IntoResponse`
//! impl turns an early return into the stage's mandated terminal response
//! (§4.10), and a stage that returns `Ok` simply calls `next.run(req)`.

pub mod authenticator;
pub mod idle_timeout;
pub mod logging;
pub mod request_rate;
pub mod token_rate;
pub mod validator;

use std::sync::Arc;
use std::time::Duration;

use reqwest::Url;

use crate::credential::CredentialMap;
use crate::metrics::Counters;
use crate::registry::LimiterRegistry;

/// Shared, cloneable handle to every piece of state the admission stages
/// and forwarder need. Cheap to clone: everything inside is an `Arc` or a
/// `reqwest::Client` (itself internally reference-counted).
#[derive(Clone)]
pub struct AppState {
    pub credential_map: Arc<CredentialMap>,
    pub request_registry: Arc<LimiterRegistry>,
    pub token_registry: Arc<LimiterRegistry>,
    pub http_client: reqwest::Client,
    pub target_url: Url,
    pub max_body_bytes: u64,
    pub metrics: Arc<Counters>,
    /// Upper bound on total admission-chain handling time for one request
    /// (§5's idle timeout), enforced by [`idle_timeout::enforce_idle_timeout`].
    pub idle_timeout: Duration,
}
