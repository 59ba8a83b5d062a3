//! delay-fanout server
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request        ┌────────────────────────────────────────────────┐
//!     ──────────────────────┼─▶ http::server ──▶ http::request               │
//!                           │   (axum, ids,       (delay list / URLs         │
//!                           │    tracing)          → Vec<Target>)            │
//!                           │                          │                     │
//!                           │                          ▼                     │
//!                           │              fanout::FanOutCoordinator         │
//!                           │              ┌──────┬──────┬──────┐           │
//!                           │              ▼      ▼      ▼      ▼           │
//!                           │           fetch  fetch  fetch  fetch ─────────┼──▶ Upstreams
//!                           │              └──────┴──┬───┴──────┘           │
//!                           │                        ▼ barrier              │
//!     Client Response       │                  FanOutResult                 │
//!     ◀─────────────────────┼── http::response ◀─────┘                      │
//!                           └────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use delay_fanout::config::{load_config, FanOutConfig};
use delay_fanout::lifecycle::startup;
use delay_fanout::observability::logging;

#[derive(Parser)]
#[command(name = "delay-fanout")]
#[command(about = "Fan out to slow upstreams and report how long it took", long_about = None)]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override `listener.bind_address`.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => load_config(path)?,
        None => FanOutConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.listener.bind_address = bind;
    }

    logging::init_logging(&config.observability)?;
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?args.config,
        "delay-fanout starting"
    );

    startup::run(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
