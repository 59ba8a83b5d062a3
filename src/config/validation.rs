//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate addresses and upstream URLs
//! - Validate value ranges (timeouts > 0, limits > 0)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: FanOutConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::net::SocketAddr;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::schema::FanOutConfig;
use crate::fanout::Target;

/// A single semantic problem found in a configuration.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field}: invalid socket address '{value}'")]
    InvalidAddress { field: &'static str, value: String },

    #[error("{field}: {reason}")]
    InvalidUrl { field: &'static str, reason: String },

    #[error("{field}: must be greater than zero")]
    Zero { field: &'static str },

    #[error("observability.log_level: invalid filter '{0}'")]
    InvalidLogLevel(String),
}

/// Check a parsed configuration for semantic errors.
pub fn validate_config(config: &FanOutConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listener.bind_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::InvalidAddress {
            field: "listener.bind_address",
            value: config.listener.bind_address.clone(),
        });
    }

    let upstream = &config.upstream;
    if let Err(e) = Target::parse(&upstream.delay_base_url) {
        errors.push(ValidationError::InvalidUrl {
            field: "upstream.delay_base_url",
            reason: e.to_string(),
        });
    }
    for target in &upstream.default_targets {
        if let Err(e) = Target::parse(target) {
            errors.push(ValidationError::InvalidUrl {
                field: "upstream.default_targets",
                reason: e.to_string(),
            });
        }
    }

    let limits = [
        ("upstream.max_in_flight", Some(upstream.max_in_flight as u64)),
        ("upstream.max_targets", Some(upstream.max_targets as u64)),
        ("upstream.request_timeout_secs", upstream.request_timeout_secs),
        ("upstream.batch_timeout_secs", upstream.batch_timeout_secs),
        ("timeouts.request_secs", Some(config.timeouts.request_secs)),
    ];
    for (field, value) in limits {
        if value == Some(0) {
            errors.push(ValidationError::Zero { field });
        }
    }

    let observability = &config.observability;
    if EnvFilter::try_new(&observability.log_level).is_err() {
        errors.push(ValidationError::InvalidLogLevel(observability.log_level.clone()));
    }
    if observability.metrics_enabled
        && observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::InvalidAddress {
            field: "observability.metrics_address",
            value: observability.metrics_address.clone(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
