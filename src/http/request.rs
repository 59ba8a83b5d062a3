//! Inbound request parsing.
//!
//! # Responsibilities
//! - Turn a `/secs/{list}` delay list into delay-service targets
//! - Validate caller-supplied target URLs and batch timeouts
//! - Enforce the per-request target limit
//!
//! # Design Decisions
//! - Every target is validated before any upstream call is made; a bad entry
//!   rejects the whole request
//! - Fresh target vectors are built per request

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::fanout::{Target, TargetError};

/// Errors produced while interpreting an inbound request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RequestError {
    #[error("delay list is empty")]
    EmptyDelayList,

    #[error("invalid delay '{0}': expected a non-negative number of seconds")]
    InvalidDelay(String),

    #[error(transparent)]
    InvalidTarget(#[from] TargetError),

    #[error("too many targets: {count} (max {max})")]
    TooManyTargets { count: usize, max: usize },

    #[error("invalid timeout '{0}': expected a positive number of seconds")]
    InvalidTimeout(String),
}

/// Body of `POST /api/v1/fanout`.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FanOutRequest {
    pub targets: Vec<String>,
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

/// Query string of `GET /secs/{list}`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SecsQuery {
    /// Batch timeout in seconds, overriding the configured one.
    pub timeout: Option<f64>,
}

/// Split a comma-separated delay list, keeping each entry as written.
pub fn parse_delays(list: &str) -> Result<Vec<&str>, RequestError> {
    if list.trim().is_empty() {
        return Err(RequestError::EmptyDelayList);
    }

    list.split(',')
        .map(str::trim)
        .map(|secs| match secs.parse::<f64>() {
            Ok(value) if value.is_finite() && value >= 0.0 => Ok(secs),
            _ => Err(RequestError::InvalidDelay(secs.to_string())),
        })
        .collect()
}

/// Build one delay-service target per entry of `list`.
pub fn delay_targets(base_url: &str, list: &str) -> Result<Vec<Target>, RequestError> {
    let base = base_url.trim_end_matches('/');
    parse_delays(list)?
        .into_iter()
        .map(|secs| Target::parse(&format!("{}/{}", base, secs)).map_err(RequestError::from))
        .collect()
}

/// Validate caller-supplied URLs.
pub fn parse_targets<S: AsRef<str>>(urls: &[S]) -> Result<Vec<Target>, RequestError> {
    urls.iter()
        .map(|url| Target::parse(url.as_ref()).map_err(RequestError::from))
        .collect()
}

pub fn check_target_limit(count: usize, max: usize) -> Result<(), RequestError> {
    if count > max {
        return Err(RequestError::TooManyTargets { count, max });
    }
    Ok(())
}

/// Convert a query-string timeout in seconds.
pub fn parse_timeout_secs(secs: f64) -> Result<Duration, RequestError> {
    match Duration::try_from_secs_f64(secs) {
        Ok(timeout) if !timeout.is_zero() => Ok(timeout),
        _ => Err(RequestError::InvalidTimeout(secs.to_string())),
    }
}
