//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the server.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

use crate::fanout::DecodeMode;

/// Root configuration for the fan-out server.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct FanOutConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream targets and fan-out limits.
    pub upstream: UpstreamConfig,

    /// Timeout configuration for inbound requests.
    pub timeouts: TimeoutConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "127.0.0.1:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "127.0.0.1:8080".to_string(),
        }
    }
}

/// Upstream configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Base URL of the delay-simulating service; `/secs/{list}` appends `/{secs}`.
    pub delay_base_url: String,

    /// Targets fetched by `/delay-me`.
    pub default_targets: Vec<String>,

    /// Per-call timeout in seconds (connect through body). None = no limit.
    pub request_timeout_secs: Option<u64>,

    /// Overall batch timeout in seconds. None = wait for every unit.
    pub batch_timeout_secs: Option<u64>,

    /// Maximum units calling upstreams at once within one batch.
    pub max_in_flight: usize,

    /// Maximum targets accepted in a single inbound request.
    pub max_targets: usize,

    /// Whether bodies are decoded as JSON or read and discarded.
    pub decode: DecodeMode,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            delay_base_url: "http://httpbin.org/delay".to_string(),
            default_targets: vec![
                "http://httpbin.org/delay/5".to_string(),
                "http://httpbin.org/delay/3".to_string(),
            ],
            request_timeout_secs: None,
            batch_timeout_secs: None,
            max_in_flight: 64,
            max_targets: 256,
            decode: DecodeMode::Json,
        }
    }
}

/// Timeout configuration for inbound requests.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TimeoutConfig {
    /// Total time allowed for an inbound request, including its fan-out.
    pub request_secs: u64,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self { request_secs: 60 }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human-readable or JSON log lines.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: FanOutConfig = toml::from_str("").unwrap();
        assert_eq!(config.listener.bind_address, "127.0.0.1:8080");
        assert_eq!(config.upstream.default_targets.len(), 2);
        assert_eq!(config.upstream.max_in_flight, 64);
        assert_eq!(config.upstream.decode, DecodeMode::Json);
        assert!(config.upstream.batch_timeout_secs.is_none());
    }

    #[test]
    fn test_partial_sections_merge_with_defaults() {
        let config: FanOutConfig = toml::from_str(
            r#"
            [upstream]
            delay_base_url = "http://127.0.0.1:9000/delay"
            batch_timeout_secs = 4
            decode = "discard"

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.upstream.delay_base_url, "http://127.0.0.1:9000/delay");
        assert_eq!(config.upstream.batch_timeout_secs, Some(4));
        assert_eq!(config.upstream.decode, DecodeMode::Discard);
        assert_eq!(config.upstream.max_targets, 256);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.observability.log_level, "info");
    }
}
