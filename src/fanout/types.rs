//! Fan-out data model and error definitions.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

/// One upstream URL to be fetched as part of a batch.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Target(Url);

impl Target {
    /// Parse an absolute `http` or `https` URL.
    pub fn parse(input: &str) -> Result<Self, TargetError> {
        let url = Url::parse(input.trim()).map_err(|e| TargetError::Malformed {
            input: input.to_string(),
            reason: e.to_string(),
        })?;
        Self::try_from(url)
    }

    /// Borrow the underlying URL.
    pub fn url(&self) -> &Url {
        &self.0
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl TryFrom<Url> for Target {
    type Error = TargetError;

    fn try_from(url: Url) -> Result<Self, Self::Error> {
        if !matches!(url.scheme(), "http" | "https") {
            return Err(TargetError::UnsupportedScheme(url.scheme().to_string()));
        }
        if !url.has_host() {
            return Err(TargetError::MissingHost(url.to_string()));
        }
        Ok(Self(url))
    }
}

impl FromStr for Target {
    type Err = TargetError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.0.as_str())
    }
}

/// Errors raised while constructing a [`Target`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TargetError {
    #[error("invalid target URL '{input}': {reason}")]
    Malformed { input: String, reason: String },

    #[error("unsupported URL scheme '{0}' (expected http or https)")]
    UnsupportedScheme(String),

    #[error("target URL '{0}' has no host")]
    MissingHost(String),
}

/// How the upstream client treats response bodies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DecodeMode {
    /// Read the full body and drop it, keeping only its length.
    Discard,
    /// Decode the body as JSON and keep the value.
    #[default]
    Json,
}

/// Body retained from a successful fetch.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Discarded { bytes: usize },
    Json(serde_json::Value),
}

/// Why a single unit of work failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FailureKind {
    /// DNS failure, refused or reset connection, or a broken body stream.
    #[error("connection error: {0}")]
    Connection(String),

    /// The per-call or overall batch deadline elapsed.
    #[error("timed out")]
    Timeout,

    /// The body could not be decoded as the expected structured format.
    #[error("decode error: {0}")]
    Decode(String),

    /// The task running the unit panicked.
    #[error("unit panicked: {0}")]
    Panicked(String),
}

impl FailureKind {
    /// Short label used for metrics and reports.
    pub fn label(&self) -> &'static str {
        match self {
            FailureKind::Connection(_) => "connection",
            FailureKind::Timeout => "timeout",
            FailureKind::Decode(_) => "decode",
            FailureKind::Panicked(_) => "panicked",
        }
    }
}

/// Terminal result of fetching one [`Target`].
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success {
        target: Target,
        status: u16,
        payload: Payload,
        duration: Duration,
    },
    Failure {
        target: Target,
        error: FailureKind,
        duration: Duration,
    },
}

impl Outcome {
    pub fn failure(target: Target, error: FailureKind, duration: Duration) -> Self {
        Outcome::Failure {
            target,
            error,
            duration,
        }
    }

    pub fn target(&self) -> &Target {
        match self {
            Outcome::Success { target, .. } | Outcome::Failure { target, .. } => target,
        }
    }

    pub fn duration(&self) -> Duration {
        match self {
            Outcome::Success { duration, .. } | Outcome::Failure { duration, .. } => *duration,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success { .. })
    }

    /// The failure kind, if this outcome is a failure.
    pub fn error(&self) -> Option<&FailureKind> {
        match self {
            Outcome::Failure { error, .. } => Some(error),
            Outcome::Success { .. } => None,
        }
    }
}

/// Aggregate of every outcome for one coordinator run.
///
/// Outcomes are in the same order as the targets that were submitted.
#[derive(Debug, Clone, PartialEq)]
pub struct FanOutResult {
    pub outcomes: Vec<Outcome>,
    pub elapsed: Duration,
    /// True when the overall batch deadline fired before every unit finished.
    pub timed_out: bool,
}

impl FanOutResult {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    pub fn successes(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| o.is_success())
    }

    pub fn failures(&self) -> impl Iterator<Item = &Outcome> {
        self.outcomes.iter().filter(|o| !o.is_success())
    }

    pub fn success_count(&self) -> usize {
        self.successes().count()
    }

    pub fn failure_count(&self) -> usize {
        self.failures().count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_target_accepts_absolute_http_urls() {
        let target = Target::parse("http://httpbin.org/delay/3").unwrap();
        assert_eq!(target.url().host_str(), Some("httpbin.org"));
        assert_eq!(target.to_string(), "http://httpbin.org/delay/3");

        let target: Target = " https://example.com/ ".parse().unwrap();
        assert_eq!(target.as_str(), "https://example.com/");
    }

    #[test]
    fn test_target_rejects_relative_and_foreign_urls() {
        assert!(matches!(
            Target::parse("/delay/3"),
            Err(TargetError::Malformed { .. })
        ));
        assert_eq!(
            Target::parse("ftp://example.com/file"),
            Err(TargetError::UnsupportedScheme("ftp".to_string()))
        );
    }

    #[test]
    fn test_result_counts() {
        let t = Target::parse("http://localhost/a").unwrap();
        let result = FanOutResult {
            outcomes: vec![
                Outcome::Success {
                    target: t.clone(),
                    status: 200,
                    payload: Payload::Discarded { bytes: 2 },
                    duration: Duration::from_millis(5),
                },
                Outcome::failure(t.clone(), FailureKind::Timeout, Duration::from_millis(7)),
            ],
            elapsed: Duration::from_millis(7),
            timed_out: true,
        };

        assert_eq!(result.len(), 2);
        assert_eq!(result.success_count(), 1);
        assert_eq!(result.failure_count(), 1);
        assert_eq!(result.outcomes[1].error(), Some(&FailureKind::Timeout));
        assert_eq!(result.outcomes[1].target(), &t);
        assert_eq!(result.outcomes[0].duration(), Duration::from_millis(5));
    }

    #[test]
    fn test_decode_mode_deserializes_lowercase() {
        #[derive(Deserialize)]
        struct Wrapper {
            decode: DecodeMode,
        }
        let w: Wrapper = toml::from_str("decode = \"discard\"").unwrap();
        assert_eq!(w.decode, DecodeMode::Discard);
        assert_eq!(DecodeMode::default(), DecodeMode::Json);
    }
}
