//! Fan-out/fan-in subsystem.
//!
//! # Data Flow
//! ```text
//! Vec<Target>
//!     → coordinator.rs (one task per target, bounded by max_in_flight)
//!     → client.rs (one GET per task, body optionally decoded)
//!     → Outcome per task, handed back through its join handle
//!     → coordinator.rs (barrier: all done, or batch deadline)
//!     → FanOutResult { outcomes (input order), elapsed, timed_out }
//! ```
//!
//! # Design Decisions
//! - Per-unit failures are values, never errors raised from `run`
//! - No state survives a call to `run`
//! - The client sits behind a trait so the coordinator can be driven by a
//!   scripted client in tests

pub mod client;
pub mod coordinator;
pub mod types;

pub use client::{ReqwestUpstreamClient, UpstreamClient};
pub use coordinator::FanOutCoordinator;
pub use types::{DecodeMode, FailureKind, FanOutResult, Outcome, Payload, Target, TargetError};
