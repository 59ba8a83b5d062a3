//! Metrics collection and exposition.
//!
//! # Metrics
//! - `fanout_batches_total` (counter): completed batches, by `timed_out`
//! - `fanout_batch_duration_seconds` (histogram): wall-clock time per batch
//! - `fanout_outcomes_total` (counter): unit outcomes by `result`
//! - `fanout_http_requests_total` (counter): inbound requests by route, status
//! - `fanout_http_request_duration_seconds` (histogram): inbound latency by route
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op until an
//!   exporter is installed
//! - The Prometheus exporter is optional and owns its own listener

use std::net::SocketAddr;
use std::time::Instant;

use metrics::{counter, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder};

use crate::fanout::FanOutResult;

/// Install the Prometheus exporter with an HTTP scrape endpoint on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) -> Result<(), BuildError> {
    PrometheusBuilder::new().with_http_listener(addr).install()?;
    tracing::info!(address = %addr, "Metrics endpoint listening");
    Ok(())
}

/// Record one finished fan-out batch.
pub fn record_batch(result: &FanOutResult) {
    let timed_out = if result.timed_out { "true" } else { "false" };
    counter!("fanout_batches_total", "timed_out" => timed_out).increment(1);
    histogram!("fanout_batch_duration_seconds").record(result.elapsed.as_secs_f64());

    for outcome in &result.outcomes {
        let label = match outcome.error() {
            None => "success",
            Some(kind) => kind.label(),
        };
        counter!("fanout_outcomes_total", "result" => label).increment(1);
    }
}

/// Record one inbound HTTP request.
pub fn record_request(route: String, status: u16, start: Instant) {
    counter!("fanout_http_requests_total", "route" => route.clone(), "status" => status.to_string())
        .increment(1);
    histogram!("fanout_http_request_duration_seconds", "route" => route)
        .record(start.elapsed().as_secs_f64());
}
