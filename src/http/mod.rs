//! HTTP boundary subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum setup, request ID, tracing, timeout)
//!     → request.rs (delay list / target URLs → Vec<Target>)
//!     → fanout::FanOutCoordinator::run
//!     → response.rs (plain text or JSON report)
//!     → Send to client
//! ```

pub mod request;
pub mod response;
pub mod server;

pub use request::{FanOutRequest, RequestError};
pub use response::{FanOutReport, OutcomeReport};
pub use server::{HttpServer, X_REQUEST_ID};
