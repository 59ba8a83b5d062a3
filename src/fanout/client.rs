//! Upstream HTTP client.
//!
//! # Responsibilities
//! - Issue one GET per target and wait for the complete response
//! - Optionally decode the body as JSON
//! - Convert every result (including transport errors) into an [`Outcome`]
//!
//! # Design Decisions
//! - `fetch` never returns `Err`; failures are data, not control flow
//! - Non-2xx statuses are transport successes and are reported as such
//! - No retries, no caching

use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use crate::config::UpstreamConfig;
use crate::fanout::types::{DecodeMode, FailureKind, Outcome, Payload, Target};

/// Performs a single upstream call on behalf of the coordinator.
///
/// Implementations must be cheap to share: the coordinator holds one behind an
/// `Arc` and calls it from many tasks at once.
#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch(&self, target: &Target) -> Outcome;
}

/// Production client backed by reqwest.
#[derive(Debug, Clone)]
pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
    request_timeout: Option<Duration>,
    decode: DecodeMode,
}

impl ReqwestUpstreamClient {
    pub fn new(decode: DecodeMode) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("delay-fanout/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            request_timeout: None,
            decode,
        })
    }

    /// Build a client from the `[upstream]` configuration section.
    pub fn from_config(config: &UpstreamConfig) -> Result<Self, reqwest::Error> {
        let client = Self::new(config.decode)?;
        Ok(match config.request_timeout_secs {
            Some(secs) => client.with_request_timeout(Duration::from_secs(secs)),
            None => client,
        })
    }

    /// Deadline applied to each individual call (connect through body).
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    fn classify(error: reqwest::Error) -> FailureKind {
        if error.is_timeout() {
            FailureKind::Timeout
        } else {
            FailureKind::Connection(error.to_string())
        }
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    #[tracing::instrument(skip_all, fields(url = %target))]
    async fn fetch(&self, target: &Target) -> Outcome {
        let start = Instant::now();

        let mut request = self.client.get(target.url().clone());
        if let Some(timeout) = self.request_timeout {
            request = request.timeout(timeout);
        }

        let response = match request.send().await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(error = %e, "Upstream request failed");
                return Outcome::failure(target.clone(), Self::classify(e), start.elapsed());
            }
        };

        let status = response.status().as_u16();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(status, error = %e, "Failed to read upstream body");
                return Outcome::failure(target.clone(), Self::classify(e), start.elapsed());
            }
        };

        let payload = match self.decode {
            DecodeMode::Discard => Payload::Discarded { bytes: body.len() },
            DecodeMode::Json => match serde_json::from_slice(&body) {
                Ok(value) => Payload::Json(value),
                Err(e) => {
                    tracing::warn!(status, error = %e, "Upstream body is not valid JSON");
                    return Outcome::failure(
                        target.clone(),
                        FailureKind::Decode(e.to_string()),
                        start.elapsed(),
                    );
                }
            },
        };

        let duration = start.elapsed();
        tracing::debug!(status, elapsed_ms = duration.as_millis() as u64, "Upstream request completed");

        Outcome::Success {
            target: target.clone(),
            status,
            payload,
            duration,
        }
    }
}
