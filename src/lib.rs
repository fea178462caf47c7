//! # Nexus — Reverse Proxy for LLM API Credentials & Rate Limits
//!
//! Nexus sits between client applications and an upstream OpenAI-compatible
//! API. It rewrites client-facing credentials to upstream credentials so
//! real secrets never leave the proxy host, and enforces two independent
//! per-credential rate policies — requests per second and model tokens per
//! minute — before forwarding surviving requests upstream.
//!
//! ## Admission Pipeline
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐   ┌────────────┐   ┌───────────┐
//! │ validate │──▶│ authenticate │──▶│ request_rate │──▶│ token_rate │──▶│  forward  │
//! └──────────┘   └──────────────┘   └──────────────┘   └────────────┘   └───────────┘
//!   400/413           401                 429                429             502
//! ```
//!
//! Each stage either rejects with a terminal response or forwards to the
//! next; see [`middleware`] for the stage implementations and
//! [`forwarder`] for the terminal proxy step.
//!
//! ## Module Organization
//!
//! - [`config`] — YAML configuration loading and validation
//! - [`credential`] — client-key → upstream-key map and credential masking
//! - [`token_bucket`] — the token bucket primitive shared by both rate stages
//! - [`registry`] — per-credential bucket index and the idle-entry sweeper
//! - [`estimator`] — token-cost heuristic for the token-rate stage
//! - [`context`] — per-request state threaded through the pipeline
//! - [`middleware`] — the admission pipeline stages
//! - [`forwarder`] — reverse proxy to the configured upstream
//! - [`error`] — error taxonomy and its HTTP response mapping
//! - [`health`] — liveness/readiness endpoints
//! - [`metrics`] — counters and their Prometheus/JSON export
//! - [`server`] — router assembly and the process lifecycle

pub mod config;
pub mod context;
pub mod credential;
pub mod error;
pub mod estimator;
pub mod forwarder;
pub mod health;
pub mod metrics;
pub mod middleware;
pub mod registry;
pub mod server;
pub mod token_bucket;

pub use config::PipelineConfig;
pub use error::{NexusError, NexusResult};

/// Version of the nexus library, used in the `/health` response body.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
