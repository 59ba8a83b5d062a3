//! Response rendering.
//!
//! # Responsibilities
//! - Render batch results as the plain-text lines of the demo routes
//! - Render batch results as a JSON report for the API route
//! - Map request errors to HTTP status codes

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use crate::fanout::{FanOutResult, Outcome, Payload};
use crate::http::request::RequestError;

/// JSON report for one batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanOutReport {
    pub elapsed_secs: f64,
    pub timed_out: bool,
    pub succeeded: usize,
    pub failed: usize,
    pub outcomes: Vec<OutcomeReport>,
}

/// JSON report for one unit of work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutcomeReport {
    pub target: String,
    pub ok: bool,
    pub duration_secs: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bytes: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Outcome> for OutcomeReport {
    fn from(outcome: &Outcome) -> Self {
        let mut report = OutcomeReport {
            target: outcome.target().to_string(),
            ok: outcome.is_success(),
            duration_secs: outcome.duration().as_secs_f64(),
            status: None,
            bytes: None,
            payload: None,
            error_kind: None,
            error: None,
        };

        match outcome {
            Outcome::Success { status, payload, .. } => {
                report.status = Some(*status);
                match payload {
                    Payload::Discarded { bytes } => report.bytes = Some(*bytes),
                    Payload::Json(value) => report.payload = Some(value.clone()),
                }
            }
            Outcome::Failure { error, .. } => {
                report.error_kind = Some(error.label().to_string());
                report.error = Some(error.to_string());
            }
        }
        report
    }
}

impl From<&FanOutResult> for FanOutReport {
    fn from(result: &FanOutResult) -> Self {
        Self {
            elapsed_secs: result.elapsed.as_secs_f64(),
            timed_out: result.timed_out,
            succeeded: result.success_count(),
            failed: result.failure_count(),
            outcomes: result.outcomes.iter().map(OutcomeReport::from).collect(),
        }
    }
}

/// Body of `GET /secs/{list}`.
pub fn render_elapsed(result: &FanOutResult) -> String {
    format!("Elapsed: {}s\n", result.elapsed.as_secs_f64())
}

/// Body of `GET /delay-me`.
pub fn render_delayed(result: &FanOutResult) -> String {
    format!(
        "Your day has been delayed by {:.3} seconds!",
        result.elapsed.as_secs_f64()
    )
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let status = match self {
            RequestError::TooManyTargets { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            _ => StatusCode::BAD_REQUEST,
        };
        (status, self.to_string()).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{FailureKind, Target};
    use std::time::Duration;

    fn sample() -> FanOutResult {
        let target = Target::parse("http://upstream.test/delay/1").unwrap();
        FanOutResult {
            outcomes: vec![
                Outcome::Success {
                    target: target.clone(),
                    status: 200,
                    payload: Payload::Json(serde_json::json!({"delay": 1})),
                    duration: Duration::from_millis(1000),
                },
                Outcome::failure(
                    target,
                    FailureKind::Connection("refused".into()),
                    Duration::from_millis(3),
                ),
            ],
            elapsed: Duration::from_millis(1250),
            timed_out: false,
        }
    }

    #[test]
    fn test_plain_text_rendering() {
        let result = sample();
        assert_eq!(render_elapsed(&result), "Elapsed: 1.25s\n");
        assert_eq!(render_delayed(&result), "Your day has been delayed by 1.250 seconds!");
    }

    #[test]
    fn test_report_shape() {
        let report = FanOutReport::from(&sample());
        assert_eq!(report.succeeded, 1);
        assert_eq!(report.failed, 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["outcomes"][0]["status"], 200);
        assert_eq!(json["outcomes"][0]["payload"]["delay"], 1);
        assert!(json["outcomes"][0].get("error").is_none());
        assert_eq!(json["outcomes"][1]["error_kind"], "connection");
        assert_eq!(json["outcomes"][1]["error"], "connection error: refused");
    }
}
