//! HTTP server setup and configuration.
//!
//! # Responsibilities
//! - Create Axum Router with all handlers
//! - Wire up middleware (request ID, tracing, timeout, metrics)
//! - Turn inbound requests into target lists for the coordinator
//! - Render batch results as text or JSON

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{MatchedPath, Path, Query, Request, State},
    http::header::HeaderName,
    middleware::{self, Next},
    response::{Html, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::{FanOutConfig, UpstreamConfig};
use crate::fanout::{FanOutCoordinator, ReqwestUpstreamClient, Target};
use crate::http::request::{
    check_target_limit, delay_targets, parse_targets, parse_timeout_secs, FanOutRequest,
    RequestError, SecsQuery,
};
use crate::http::response::{render_delayed, render_elapsed, FanOutReport};
use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

pub const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

const INDEX_HTML: &str = r#"<h1>Looking to get <a href="/delay-me">delayed</a>?</h1>"#;

/// Time reserved for rendering a batch before the request timeout fires.
const RESPONSE_MARGIN: Duration = Duration::from_millis(250);

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: FanOutCoordinator,
    pub upstream: Arc<UpstreamConfig>,
    /// `upstream.default_targets`, parsed once at startup.
    pub default_targets: Arc<Vec<Target>>,
    /// Longest a batch may run and still be reported within the request timeout.
    pub batch_budget: Duration,
}

impl AppState {
    /// Deadline for one batch: the requested timeout, else the configured one,
    /// never longer than the batch budget.
    fn batch_timeout(&self, requested: Option<Duration>) -> Duration {
        requested
            .or_else(|| self.upstream.batch_timeout_secs.map(Duration::from_secs))
            .map_or(self.batch_budget, |timeout| timeout.min(self.batch_budget))
    }
}

/// HTTP server fronting the fan-out coordinator.
pub struct HttpServer {
    router: Router,
    config: FanOutConfig,
}

impl HttpServer {
    /// Create a server whose coordinator talks to upstreams over reqwest.
    pub fn new(config: FanOutConfig) -> Result<Self, reqwest::Error> {
        let client = ReqwestUpstreamClient::from_config(&config.upstream)?;
        let coordinator = FanOutCoordinator::new(Arc::new(client))
            .with_max_in_flight(config.upstream.max_in_flight);
        Ok(Self::with_coordinator(config, coordinator))
    }

    /// Create a server around an existing coordinator.
    pub fn with_coordinator(config: FanOutConfig, coordinator: FanOutCoordinator) -> Self {
        let default_targets = config
            .upstream
            .default_targets
            .iter()
            .filter_map(|url| match Target::parse(url) {
                Ok(target) => Some(target),
                Err(e) => {
                    tracing::warn!(url = %url, error = %e, "Ignoring invalid default target");
                    None
                }
            })
            .collect();

        let request_timeout = Duration::from_secs(config.timeouts.request_secs);
        let state = AppState {
            coordinator,
            upstream: Arc::new(config.upstream.clone()),
            default_targets: Arc::new(default_targets),
            batch_budget: request_timeout
                .saturating_sub(RESPONSE_MARGIN)
                .max(request_timeout / 2),
        };

        let router = Self::build_router(&config, state);
        Self { router, config }
    }

    /// Build the Axum router with all middleware layers.
    #[allow(deprecated)]
    fn build_router(config: &FanOutConfig, state: AppState) -> Router {
        let layers = ServiceBuilder::new()
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!(
                    "request",
                    request_id = %request_id,
                    method = %request.method(),
                    uri = %request.uri(),
                )
            }))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TimeoutLayer::new(Duration::from_secs(config.timeouts.request_secs)));

        Router::new()
            .route("/", get(index))
            .route("/delay-me", get(delay_me))
            .route("/secs/{secs}", get(secs))
            .route("/api/v1/fanout", post(fanout))
            .route_layer(middleware::from_fn(track_metrics))
            .with_state(state)
            .layer(layers)
    }

    /// The router, for embedding or driving without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    /// Run the server, accepting connections on the given listener until shutdown.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: ShutdownSignal,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(
            address = %addr,
            max_in_flight = self.config.upstream.max_in_flight,
            "HTTP server starting"
        );

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move { shutdown.recv().await })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Fan out to the configured default targets.
async fn delay_me(State(state): State<AppState>) -> String {
    let targets = state.default_targets.as_ref().clone();
    let result = state.coordinator.run(targets, Some(state.batch_timeout(None))).await;
    render_delayed(&result)
}

/// Fan out to the delay service, one target per entry of the comma-separated list.
async fn secs(
    State(state): State<AppState>,
    Path(list): Path<String>,
    Query(query): Query<SecsQuery>,
) -> Result<String, RequestError> {
    let targets = delay_targets(&state.upstream.delay_base_url, &list)?;
    check_target_limit(targets.len(), state.upstream.max_targets)?;
    let requested = query.timeout.map(parse_timeout_secs).transpose()?;
    let timeout = state.batch_timeout(requested);

    tracing::debug!(targets = targets.len(), "Processing delay list");
    let result = state.coordinator.run(targets, Some(timeout)).await;
    Ok(render_elapsed(&result))
}

/// Fan out to caller-supplied URLs and report every outcome.
async fn fanout(
    State(state): State<AppState>,
    Json(request): Json<FanOutRequest>,
) -> Result<Json<FanOutReport>, RequestError> {
    check_target_limit(request.targets.len(), state.upstream.max_targets)?;
    let targets = parse_targets(&request.targets)?;
    let timeout = state.batch_timeout(request.timeout_ms.map(Duration::from_millis));

    let result = state.coordinator.run(targets, Some(timeout)).await;
    Ok(Json(FanOutReport::from(&result)))
}

async fn track_metrics(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let response = next.run(request).await;
    metrics::record_request(route, response.status().as_u16(), start);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fanout::{Outcome, UpstreamClient};
    use async_trait::async_trait;
    use axum::http::{Request as HttpRequest, StatusCode};
    use tower::ServiceExt;

    /// Succeeds instantly without touching the network.
    struct InstantClient;

    #[async_trait]
    impl UpstreamClient for InstantClient {
        async fn fetch(&self, target: &Target) -> Outcome {
            Outcome::Success {
                target: target.clone(),
                status: 200,
                payload: crate::fanout::Payload::Discarded { bytes: 0 },
                duration: Duration::ZERO,
            }
        }
    }

    fn router(max_targets: usize) -> Router {
        let mut config = FanOutConfig::default();
        config.upstream.max_targets = max_targets;
        let coordinator = FanOutCoordinator::new(Arc::new(InstantClient));
        HttpServer::with_coordinator(config, coordinator).router()
    }

    async fn send(router: Router, request: Request<Body>) -> (StatusCode, String, bool) {
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let has_request_id = response.headers().contains_key(X_REQUEST_ID);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap(), has_request_id)
    }

    fn get(uri: &str) -> Request<Body> {
        HttpRequest::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_index_links_to_delay_me() {
        let (status, body, has_request_id) = send(router(10), get("/")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.contains("/delay-me"));
        assert!(has_request_id);
    }

    #[tokio::test]
    async fn test_secs_reports_elapsed() {
        let (status, body, _) = send(router(10), get("/secs/2,3")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Elapsed: "), "{}", body);
        assert!(body.ends_with("s\n"));
    }

    #[tokio::test]
    async fn test_delay_me_uses_default_targets() {
        let (status, body, _) = send(router(10), get("/delay-me")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Your day has been delayed by "));
    }

    #[tokio::test]
    async fn test_secs_rejects_bad_input() {
        let (status, body, _) = send(router(10), get("/secs/2,abc")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body.contains("abc"));

        let (status, _, _) = send(router(1), get("/secs/1,2")).await;
        assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);

        let (status, _, _) = send(router(10), get("/secs/1?timeout=0")).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_secs_accepts_huge_timeout() {
        let (status, body, _) = send(router(10), get("/secs/1?timeout=1e19")).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body.starts_with("Elapsed: "), "{}", body);
    }

    #[test]
    fn test_batch_timeout_is_capped_by_request_timeout() {
        let mut upstream = FanOutConfig::default().upstream;
        upstream.batch_timeout_secs = Some(3);
        let state = AppState {
            coordinator: FanOutCoordinator::new(Arc::new(InstantClient)),
            upstream: Arc::new(upstream),
            default_targets: Arc::new(Vec::new()),
            batch_budget: Duration::from_millis(9750),
        };

        assert_eq!(state.batch_timeout(None), Duration::from_secs(3));
        assert_eq!(state.batch_timeout(Some(Duration::from_secs(1))), Duration::from_secs(1));
        assert_eq!(state.batch_timeout(Some(Duration::MAX)), Duration::from_millis(9750));

        let unconfigured = AppState {
            upstream: Arc::new(FanOutConfig::default().upstream),
            ..state
        };
        assert_eq!(unconfigured.batch_timeout(None), Duration::from_millis(9750));
    }

    #[tokio::test]
    async fn test_api_returns_report() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/v1/fanout")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"targets": ["http://a.test/", "http://b.test/"]}"#))
            .unwrap();
        let (status, body, _) = send(router(10), request).await;
        assert_eq!(status, StatusCode::OK);

        let report: FanOutReport = serde_json::from_str(&body).unwrap();
        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.outcomes[1].target, "http://b.test/");
    }

    #[tokio::test]
    async fn test_api_rejects_relative_target() {
        let request = HttpRequest::builder()
            .method("POST")
            .uri("/api/v1/fanout")
            .header("content-type", "application/json")
            .body(Body::from(r#"{"targets": ["/relative"]}"#))
            .unwrap();
        let (status, _, _) = send(router(10), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
