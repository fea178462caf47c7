//! # Metrics Collection & Export
//!
//! Process-wide counters for the admission pipeline, exported both as
//! Prometheus text exposition (`GET /metrics`) and as JSON (`GET
//! /metrics.json`). Counters are plain atomics rather than the teacher's
//! `RwLock<HashMap<String, ThrottleMetrics>>`: Nexus's metrics are global
//! (one proxy, one upstream), not per-client, so there is no map to guard —
//! the registries themselves already expose per-credential entry counts.

use std::sync::atomic::{AtomicU64, Ordering};

use axum::extract::State;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::middleware::AppState;

/// Global counters touched by the admission stages as requests pass
/// through them. All fields use relaxed-enough atomics (`fetch_add` with
/// `Ordering::Relaxed`) since these are monotonic counters read only for
/// reporting, never for control flow.
#[derive(Debug, Default)]
pub struct Counters {
    pub requests_admitted: AtomicU64,
    pub rejected_validate: AtomicU64,
    pub rejected_auth: AtomicU64,
    pub rejected_request_rate: AtomicU64,
    pub rejected_token_rate: AtomicU64,
    pub rejected_upstream: AtomicU64,
    pub sweeper_evictions: AtomicU64,
}

impl Counters {
    pub fn record_admitted(&self) {
        self.requests_admitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_validate(&self) {
        self.rejected_validate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_auth(&self) {
        self.rejected_auth.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_request_rate(&self) {
        self.rejected_request_rate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_token_rate(&self) {
        self.rejected_token_rate.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_rejected_upstream(&self) {
        self.rejected_upstream.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_sweeper_evictions(&self, n: usize) {
        self.sweeper_evictions.fetch_add(n as u64, Ordering::Relaxed);
    }

    fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_admitted: self.requests_admitted.load(Ordering::Relaxed),
            rejected_validate: self.rejected_validate.load(Ordering::Relaxed),
            rejected_auth: self.rejected_auth.load(Ordering::Relaxed),
            rejected_request_rate: self.rejected_request_rate.load(Ordering::Relaxed),
            rejected_token_rate: self.rejected_token_rate.load(Ordering::Relaxed),
            rejected_upstream: self.rejected_upstream.load(Ordering::Relaxed),
            sweeper_evictions: self.sweeper_evictions.load(Ordering::Relaxed),
        }
    }
}

#[derive(Debug, Serialize)]
struct MetricsSnapshot {
    requests_admitted: u64,
    rejected_validate: u64,
    rejected_auth: u64,
    rejected_request_rate: u64,
    rejected_token_rate: u64,
    rejected_upstream: u64,
    sweeper_evictions: u64,
}

impl MetricsSnapshot {
    fn to_prometheus_text(&self, request_entries: usize, token_entries: usize) -> String {
        format!(
            "# TYPE nexus_requests_admitted_total counter\n\
             nexus_requests_admitted_total {}\n\
             # TYPE nexus_requests_rejected_total counter\n\
             nexus_requests_rejected_total{{stage=\"validate\"}} {}\n\
             nexus_requests_rejected_total{{stage=\"auth\"}} {}\n\
             nexus_requests_rejected_total{{stage=\"request_rate\"}} {}\n\
             nexus_requests_rejected_total{{stage=\"token_rate\"}} {}\n\
             nexus_requests_rejected_total{{stage=\"upstream\"}} {}\n\
             # TYPE nexus_sweeper_evictions_total counter\n\
             nexus_sweeper_evictions_total {}\n\
             # TYPE nexus_registry_entries gauge\n\
             nexus_registry_entries{{registry=\"request_rate\"}} {}\n\
             nexus_registry_entries{{registry=\"token_rate\"}} {}\n",
            self.requests_admitted,
            self.rejected_validate,
            self.rejected_auth,
            self.rejected_request_rate,
            self.rejected_token_rate,
            self.rejected_upstream,
            self.sweeper_evictions,
            request_entries,
            token_entries,
        )
    }
}

#[derive(Debug, Serialize)]
struct MetricsJson {
    #[serde(flatten)]
    counters: MetricsSnapshot,
    request_rate_registry_entries: usize,
    token_rate_registry_entries: usize,
}

pub async fn metrics_text(State(state): State<AppState>) -> Response {
    let body = state
        .metrics
        .snapshot()
        .to_prometheus_text(state.request_registry.len(), state.token_registry.len());
    ([("content-type", "text/plain; version=0.0.4")], body).into_response()
}

pub async fn metrics_json(State(state): State<AppState>) -> Response {
    let payload = MetricsJson {
        counters: state.metrics.snapshot(),
        request_rate_registry_entries: state.request_registry.len(),
        token_rate_registry_entries: state.token_registry.len(),
    };
    axum::Json(payload).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reflects_recorded_counts() {
        let counters = Counters::default();
        counters.record_admitted();
        counters.record_admitted();
        counters.record_rejected_auth();

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.requests_admitted, 2);
        assert_eq!(snapshot.rejected_auth, 1);
    }

    #[test]
    fn prometheus_text_contains_expected_metric_names() {
        let counters = Counters::default();
        counters.record_admitted();
        let text = counters.snapshot().to_prometheus_text(3, 2);
        assert!(text.contains("nexus_requests_admitted_total 1"));
        assert!(text.contains("nexus_registry_entries{registry=\"request_rate\"} 3"));
    }
}
