//! Concurrent fan-out/fan-in over slow upstream HTTP endpoints.
//!
//! The core is [`fanout::FanOutCoordinator`]: give it a list of
//! [`fanout::Target`]s and it fetches all of them concurrently, waits for every
//! one to finish (or the batch deadline to fire) and returns one
//! [`fanout::Outcome`] per target together with the wall-clock time of the
//! batch. The remaining modules are the demo server around it.

pub mod config;
pub mod fanout;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use config::FanOutConfig;
pub use fanout::{FanOutCoordinator, FanOutResult, Outcome, Target};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
