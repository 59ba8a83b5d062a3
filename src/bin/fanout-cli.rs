use std::sync::Arc;
use std::time::Duration;

use clap::{Parser, Subcommand};
use serde_json::Value;

use delay_fanout::fanout::{DecodeMode, FanOutCoordinator, ReqwestUpstreamClient};
use delay_fanout::http::request::parse_targets;
use delay_fanout::http::{FanOutReport, FanOutRequest};

#[derive(Parser)]
#[command(name = "fanout-cli")]
#[command(about = "Client for the delay-fanout server", long_about = None)]
struct Cli {
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fan out to the server's default targets
    DelayMe,
    /// Fan out to the delay service, e.g. `secs 2,3`
    Secs {
        list: String,
        /// Batch timeout in seconds
        #[arg(short, long)]
        timeout: Option<f64>,
    },
    /// Ask the server to fan out to arbitrary URLs
    Batch {
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(short, long)]
        timeout_ms: Option<u64>,
    },
    /// Fan out from this process, without a server
    Local {
        #[arg(required = true)]
        targets: Vec<String>,
        #[arg(short, long)]
        timeout_ms: Option<u64>,
        #[arg(short, long, default_value_t = 64)]
        max_in_flight: usize,
        /// Read bodies without decoding them
        #[arg(long)]
        discard: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    match cli.command {
        Commands::DelayMe => {
            let res = client.get(format!("{}/delay-me", cli.url)).send().await?;
            print_text(res).await?;
        }
        Commands::Secs { list, timeout } => {
            let mut req = client.get(format!("{}/secs/{}", cli.url, list));
            if let Some(timeout) = timeout {
                req = req.query(&[("timeout", timeout)]);
            }
            print_text(req.send().await?).await?;
        }
        Commands::Batch { targets, timeout_ms } => {
            let res = client
                .post(format!("{}/api/v1/fanout", cli.url))
                .json(&FanOutRequest { targets, timeout_ms })
                .send()
                .await?;
            print_json(res).await?;
        }
        Commands::Local {
            targets,
            timeout_ms,
            max_in_flight,
            discard,
        } => {
            let targets = parse_targets(&targets)?;
            let decode = if discard { DecodeMode::Discard } else { DecodeMode::Json };
            let upstream = ReqwestUpstreamClient::new(decode)?;
            let coordinator =
                FanOutCoordinator::new(Arc::new(upstream)).with_max_in_flight(max_in_flight);

            let result = coordinator
                .run(targets, timeout_ms.map(Duration::from_millis))
                .await;
            let report = FanOutReport::from(&result);
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

async fn print_text(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        eprintln!("Response: {}", text);
        return Ok(());
    }
    println!("{}", text.trim_end());
    Ok(())
}

async fn print_json(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: server returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
