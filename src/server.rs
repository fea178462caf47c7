//! # HTTP Server Module
//!
//! Assembles the admission pipeline router (§4.9) and runs it to
//! completion, mirroring the teacher's `Server`/`create_app` split:
//! `build_router` is the pure router-construction function (easy to test
//! with `tower::ServiceExt::oneshot`), `Server` owns the listener and the
//! graceful-shutdown/sweeper lifecycle.
//!
//! ## Pipeline Assembly
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────────┐
//! │ CorsLayer → TraceLayer → log_requests → RequestBodyLimitLayer →   │
//! │   enforce_idle_timeout → validate → authenticate → request_rate → │
//! │   token_rate → forward                                            │
//! └────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! `/health`, `/ready`, `/metrics`, `/metrics.json` are registered on a
//! separate sub-router merged in before the admission layers are applied,
//! so they never pass through the chain (§4.9: "external to this core").

use std::sync::Arc;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::get;
use axum::Router;
use tokio::signal;
use tower_http::cors::CorsLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::PipelineConfig;
use crate::credential::CredentialMap;
use crate::forwarder::forward;
use crate::health::{health, ready};
use crate::metrics::{metrics_json, metrics_text, Counters};
use crate::middleware::authenticator::authenticate;
use crate::middleware::idle_timeout::enforce_idle_timeout;
use crate::middleware::logging::log_requests;
use crate::middleware::request_rate::limit_request_rate;
use crate::middleware::token_rate::limit_token_rate;
use crate::middleware::validator::validate;
use crate::middleware::AppState;
use crate::registry::{LimiterRegistry, RegistryParams, Sweeper};

/// Builds the fully layered router plus the background sweeper it depends
/// on. Split out from `Server` so tests can drive the router directly
/// (`tower::ServiceExt::oneshot`) without binding a socket.
pub fn build_router(config: &PipelineConfig) -> (Router, Sweeper) {
    let credential_map = Arc::new(CredentialMap::new(config.api_keys.clone()));

    let request_registry = Arc::new(LimiterRegistry::new(RegistryParams {
        refill_rate: config.request_rps,
        burst: config.request_burst,
        ttl: config.idle_ttl,
    }));
    let token_registry = Arc::new(LimiterRegistry::new(RegistryParams {
        refill_rate: config.token_tps,
        burst: config.token_burst,
        ttl: config.idle_ttl,
    }));

    let metrics = Arc::new(Counters::default());

    let http_client = reqwest::Client::builder()
        .timeout(config.write_timeout)
        .connect_timeout(config.read_timeout)
        .build()
        .expect("reqwest client configuration is always valid");

    let state = AppState {
        credential_map,
        request_registry: request_registry.clone(),
        token_registry: token_registry.clone(),
        http_client,
        target_url: config.target_url.clone(),
        max_body_bytes: config.max_body_bytes,
        metrics: metrics.clone(),
        idle_timeout: config.idle_timeout,
    };

    let proxied = Router::new()
        .fallback(forward)
        .layer(from_fn_with_state(state.clone(), limit_token_rate))
        .layer(from_fn_with_state(state.clone(), limit_request_rate))
        .layer(from_fn_with_state(state.clone(), authenticate))
        .layer(from_fn_with_state(state.clone(), validate))
        .layer(from_fn_with_state(state.clone(), enforce_idle_timeout))
        .layer(RequestBodyLimitLayer::new(config.max_body_bytes as usize))
        .with_state(state.clone());

    let observability = Router::new()
        .route("/health", get(health))
        .route("/ready", get(ready))
        .route("/metrics", get(metrics_text))
        .route("/metrics.json", get(metrics_json))
        .with_state(state);

    let app = Router::new()
        .merge(observability)
        .merge(proxied)
        .layer(from_fn(log_requests))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let sweeper_metrics = metrics.clone();
    let sweeper = Sweeper::spawn(
        vec![request_registry, token_registry],
        config.sweep_interval,
        move |evicted| {
            if evicted > 0 {
                tracing::debug!(evicted, "sweeper evicted idle limiter entries");
            }
            sweeper_metrics.record_sweeper_evictions(evicted);
        },
    );

    (app, sweeper)
}

/// Owns the bound listener and the sweeper task for the process lifetime.
pub struct Server {
    app: Router,
    listen_port: u16,
    sweeper: Sweeper,
}

impl Server {
    pub fn new(config: &PipelineConfig) -> Self {
        let (app, sweeper) = build_router(config);
        Self {
            app,
            listen_port: config.listen_port,
            sweeper,
        }
    }

    /// Binds the listen address and serves until a shutdown signal
    /// arrives, then stops the sweeper and drains in-flight requests.
    pub async fn run(self) -> Result<(), std::io::Error> {
        let address = format!("0.0.0.0:{}", self.listen_port);
        let listener = tokio::net::TcpListener::bind(&address).await?;

        tracing::info!(address = %address, "nexus listening");

        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        self.sweeper.stop().await;
        Ok(())
    }
}

/// Waits for Ctrl+C or, on Unix, SIGTERM — whichever arrives first.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl+C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
    }
}
