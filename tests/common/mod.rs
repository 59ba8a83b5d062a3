//! Shared utilities for integration tests.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use delay_fanout::config::FanOutConfig;
use delay_fanout::http::HttpServer;
use delay_fanout::lifecycle::Shutdown;

/// Start a mock upstream on an ephemeral port.
///
/// Routes:
/// - `/delay/{secs}` sleeps, then returns `{"delay": secs}`
/// - `/status/{code}` returns `code` with a JSON body
/// - `/text` returns a plain-text body
/// - `/hang` accepts the request and never answers
#[allow(dead_code)]
pub async fn start_upstream() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((socket, _)) => {
                    tokio::spawn(handle_upstream(socket));
                }
                Err(_) => break,
            }
        }
    });

    addr
}

async fn handle_upstream(mut socket: TcpStream) {
    let Some(path) = read_request_path(&mut socket).await else {
        return;
    };

    let (status, body) = if let Some(secs) = path.strip_prefix("/delay/") {
        let secs: f64 = secs.parse().unwrap_or(0.0);
        tokio::time::sleep(Duration::from_secs_f64(secs)).await;
        ("200 OK", format!("{{\"delay\": {}}}", secs))
    } else if let Some(code) = path.strip_prefix("/status/") {
        let status = match code {
            "404" => "404 Not Found",
            "500" => "500 Internal Server Error",
            "503" => "503 Service Unavailable",
            _ => "200 OK",
        };
        (status, "{}".to_string())
    } else if path == "/text" {
        ("200 OK", "hello from upstream".to_string())
    } else if path == "/hang" {
        std::future::pending::<()>().await;
        unreachable!()
    } else {
        ("200 OK", "{}".to_string())
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        body.len(),
        body
    );
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.shutdown().await;
}

/// Read request headers and return the request path.
async fn read_request_path(socket: &mut TcpStream) -> Option<String> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buf.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buf);
    let request_line = head.lines().next()?;
    request_line.split_whitespace().nth(1).map(str::to_string)
}

/// An address nothing is listening on.
#[allow(dead_code)]
pub async fn refused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}

/// Start the fan-out server on an ephemeral port.
#[allow(dead_code)]
pub async fn start_server(config: FanOutConfig) -> (SocketAddr, Shutdown, tokio::task::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let shutdown = Shutdown::new();
    let signal = shutdown.subscribe();
    let server = HttpServer::new(config).unwrap();
    let handle = tokio::spawn(async move {
        server.run(listener, signal).await.unwrap();
    });

    (addr, shutdown, handle)
}

/// Config pointing the delay service and default targets at a mock upstream.
#[allow(dead_code)]
pub fn config_for(upstream: SocketAddr) -> FanOutConfig {
    let mut config = FanOutConfig::default();
    config.listener.bind_address = "127.0.0.1:0".to_string();
    config.upstream.delay_base_url = format!("http://{}/delay", upstream);
    config.upstream.default_targets = vec![
        format!("http://{}/delay/0.3", upstream),
        format!("http://{}/delay/0.2", upstream),
    ];
    config
}
