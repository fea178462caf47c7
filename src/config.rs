//! # Configuration Loading
//!
//! Loads the YAML configuration file described in §6, layered with
//! environment-variable overrides the same way the original throttler
//! service's `Config::load` layered `config::File` + `config::Environment`.
//!
//! `CONFIG_PATH` (or the CLI's `--config` flag) selects the file; defaults
//! to `config.yaml` in the working directory. Unset optional keys fall back
//! to the defaults named in §4/§5. A config that fails to parse or fails
//! semantic validation (`RawConfig::into_pipeline_config`) is a startup-only
//! `ConfigFatal` error — it is never reachable once the server has bound.

use std::collections::HashMap;
use std::time::Duration;

use config::{Config as ConfigLoader, Environment, File, FileFormat};
use reqwest::Url;
use serde::Deserialize;

use crate::error::{NexusError, NexusResult};

const DEFAULT_REQUEST_BURST: u64 = 10;
const DEFAULT_IDLE_TTL_SECONDS: u64 = 3600;
const DEFAULT_SWEEP_INTERVAL_SECONDS: u64 = 1800;
const DEFAULT_MAX_BODY_BYTES: u64 = 10 * 1024 * 1024;
const DEFAULT_READ_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_WRITE_TIMEOUT_SECONDS: u64 = 30;
const DEFAULT_IDLE_TIMEOUT_SECONDS: u64 = 60;

/// On-disk shape of the YAML configuration file, deserialized verbatim
/// before semantic validation and unit conversion.
#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    listen_port: Option<u16>,
    target_url: Option<String>,
    #[serde(default)]
    api_keys: HashMap<String, String>,
    #[serde(default)]
    limits: RawLimits,
    idle_ttl_seconds: Option<u64>,
    sweep_interval_seconds: Option<u64>,
    max_body_bytes: Option<u64>,
    read_timeout_seconds: Option<u64>,
    write_timeout_seconds: Option<u64>,
    idle_timeout_seconds: Option<u64>,
}

#[derive(Debug, Deserialize, Default)]
struct RawLimits {
    requests_per_second: Option<f64>,
    burst: Option<u64>,
    model_tokens_per_minute: Option<f64>,
    model_tokens_burst: Option<u64>,
}

/// Fully resolved, immutable policy parameters handed to pipeline assembly
/// (§3 `PipelineConfig`).
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub listen_port: u16,
    pub target_url: Url,
    pub api_keys: HashMap<String, String>,

    pub request_rps: f64,
    pub request_burst: u64,

    pub token_tps: f64,
    pub token_burst: u64,

    pub idle_ttl: Duration,
    pub sweep_interval: Duration,
    pub max_body_bytes: u64,

    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub idle_timeout: Duration,
}

impl RawConfig {
    fn into_pipeline_config(self) -> NexusResult<PipelineConfig> {
        let listen_port = self
            .listen_port
            .ok_or_else(|| NexusError::ConfigFatal("missing required field: listen_port".into()))?;

        let target_url_raw = self
            .target_url
            .ok_or_else(|| NexusError::ConfigFatal("missing required field: target_url".into()))?;
        let target_url = Url::parse(&target_url_raw)
            .map_err(|e| NexusError::ConfigFatal(format!("invalid target_url: {e}")))?;
        if target_url.scheme() != "http" && target_url.scheme() != "https" {
            return Err(NexusError::ConfigFatal(
                "target_url must use http or https".into(),
            ));
        }

        let request_rps = self
            .limits
            .requests_per_second
            .ok_or_else(|| NexusError::ConfigFatal("missing required field: limits.requests_per_second".into()))?;
        if request_rps <= 0.0 {
            return Err(NexusError::ConfigFatal(
                "limits.requests_per_second must be positive".into(),
            ));
        }
        let request_burst = self.limits.burst.unwrap_or(DEFAULT_REQUEST_BURST);

        let model_tpm = self
            .limits
            .model_tokens_per_minute
            .ok_or_else(|| NexusError::ConfigFatal("missing required field: limits.model_tokens_per_minute".into()))?;
        if model_tpm <= 0.0 {
            return Err(NexusError::ConfigFatal(
                "limits.model_tokens_per_minute must be positive".into(),
            ));
        }
        let token_tps = model_tpm / 60.0;
        let token_burst = self
            .limits
            .model_tokens_burst
            .unwrap_or_else(|| (100.0_f64.max(model_tpm / 6.0)) as u64);

        Ok(PipelineConfig {
            listen_port,
            target_url,
            api_keys: self.api_keys,
            request_rps,
            request_burst,
            token_tps,
            token_burst,
            idle_ttl: Duration::from_secs(self.idle_ttl_seconds.unwrap_or(DEFAULT_IDLE_TTL_SECONDS)),
            sweep_interval: Duration::from_secs(
                self.sweep_interval_seconds.unwrap_or(DEFAULT_SWEEP_INTERVAL_SECONDS),
            ),
            max_body_bytes: self.max_body_bytes.unwrap_or(DEFAULT_MAX_BODY_BYTES),
            read_timeout: Duration::from_secs(
                self.read_timeout_seconds.unwrap_or(DEFAULT_READ_TIMEOUT_SECONDS),
            ),
            write_timeout: Duration::from_secs(
                self.write_timeout_seconds.unwrap_or(DEFAULT_WRITE_TIMEOUT_SECONDS),
            ),
            idle_timeout: Duration::from_secs(
                self.idle_timeout_seconds.unwrap_or(DEFAULT_IDLE_TIMEOUT_SECONDS),
            ),
        })
    }
}

impl PipelineConfig {
    /// Loads configuration from `path`, layered with `NEXUS_*` environment
    /// overrides (e.g. `NEXUS_LISTEN_PORT`). A missing file is not an error
    /// on its own — env vars or a fully-defaulted-out file may still
    /// satisfy every required field — but a missing required field after
    /// layering is `ConfigFatal`.
    pub fn load(path: &str) -> NexusResult<Self> {
        let loader = ConfigLoader::builder()
            .add_source(File::new(path, FileFormat::Yaml).required(false))
            .add_source(Environment::with_prefix("NEXUS").separator("__"))
            .build()
            .map_err(|e| NexusError::ConfigFatal(format!("failed to load configuration: {e}")))?;

        let raw: RawConfig = loader
            .try_deserialize()
            .map_err(|e| NexusError::ConfigFatal(format!("failed to parse configuration: {e}")))?;

        raw.into_pipeline_config()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_raw() -> RawConfig {
        RawConfig {
            listen_port: Some(8080),
            target_url: Some("https://api.example.com".to_string()),
            api_keys: HashMap::new(),
            limits: RawLimits {
                requests_per_second: Some(2.0),
                burst: None,
                model_tokens_per_minute: Some(600.0),
                model_tokens_burst: None,
            },
            idle_ttl_seconds: None,
            sweep_interval_seconds: None,
            max_body_bytes: None,
            read_timeout_seconds: None,
            write_timeout_seconds: None,
            idle_timeout_seconds: None,
        }
    }

    #[test]
    fn minimal_config_resolves_with_defaults() {
        let config = minimal_raw().into_pipeline_config().unwrap();
        assert_eq!(config.listen_port, 8080);
        assert_eq!(config.request_burst, DEFAULT_REQUEST_BURST);
        assert_eq!(config.token_tps, 10.0);
        // model_tokens_burst defaults to max(100, tpm/6) = max(100, 100) = 100
        assert_eq!(config.token_burst, 100);
        assert_eq!(config.idle_ttl, Duration::from_secs(DEFAULT_IDLE_TTL_SECONDS));
    }

    #[test]
    fn missing_target_url_is_config_fatal() {
        let mut raw = minimal_raw();
        raw.target_url = None;
        let err = raw.into_pipeline_config().unwrap_err();
        assert!(matches!(err, NexusError::ConfigFatal(_)));
    }

    #[test]
    fn invalid_url_scheme_is_rejected() {
        let mut raw = minimal_raw();
        raw.target_url = Some("ftp://example.com".to_string());
        assert!(raw.into_pipeline_config().is_err());
    }

    #[test]
    fn token_burst_honors_explicit_override() {
        let mut raw = minimal_raw();
        raw.limits.model_tokens_burst = Some(5000);
        let config = raw.into_pipeline_config().unwrap();
        assert_eq!(config.token_burst, 5000);
    }

    #[test]
    fn nonpositive_rps_is_rejected() {
        let mut raw = minimal_raw();
        raw.limits.requests_per_second = Some(0.0);
        assert!(raw.into_pipeline_config().is_err());
    }
}
