//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! fanout + http produce:
//!     → logging.rs (structured log events)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Request ID flows through every log line of a request via the trace span
//! - Metrics are cheap and safe to record without an exporter installed

pub mod logging;
pub mod metrics;
