//! Sample web application
//!
//! The service the pipeline builds, deploys, tests and monitors. It serves
//! a status page, a health endpoint, Prometheus metrics and two small JSON
//! APIs, and answers unknown paths with a JSON 404.

pub mod config;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::{self, Next},
    response::{Html, IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use prometheus::{Encoder, Histogram, HistogramOpts, IntCounterVec, Opts, Registry, TextEncoder};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpListener;
use tracing::{error, info};

pub use config::AppConfig;

/// Page title shown on `/`
pub const APP_TITLE: &str = "Container Delivery Sample App";
pub const APP_NAME: &str = "Container Delivery Sample";
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Simulated processing time of `/api/test`
const API_TEST_DELAY: Duration = Duration::from_millis(100);

/// Content routes tracked in `app_requests_total`; scrapes and misses are not
const COUNTED_ROUTES: &[&str] = &["/", "/health", "/api/info", "/api/test"];

/// Prometheus metrics owned by one application instance
pub struct AppMetrics {
    registry: Registry,
    requests_total: IntCounterVec,
    request_duration: Histogram,
}

impl AppMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = IntCounterVec::new(
            Opts::new("app_requests_total", "Total requests"),
            &["method", "endpoint"],
        )?;
        let request_duration = Histogram::with_opts(HistogramOpts::new(
            "app_request_duration_seconds",
            "Request duration",
        ))?;

        registry.register(Box::new(requests_total.clone()))?;
        registry.register(Box::new(request_duration.clone()))?;

        Ok(Self {
            registry,
            requests_total,
            request_duration,
        })
    }

    fn observe(&self, method: &str, endpoint: &str, elapsed: Duration) {
        self.requests_total
            .with_label_values(&[method, endpoint])
            .inc();
        self.request_duration.observe(elapsed.as_secs_f64());
    }

    /// Text exposition of every registered metric
    pub fn encode(&self) -> prometheus::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(buffer)
    }
}

/// Shared application state
pub struct AppState {
    pub config: AppConfig,
    pub metrics: AppMetrics,
    started: Instant,
    started_at: DateTime<Utc>,
    request_count: AtomicU64,
}

impl AppState {
    pub fn new(config: AppConfig) -> prometheus::Result<Self> {
        Ok(Self {
            config,
            metrics: AppMetrics::new()?,
            started: Instant::now(),
            started_at: Utc::now(),
            request_count: AtomicU64::new(0),
        })
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }

    /// Requests served since start, including unknown paths
    pub fn request_count(&self) -> u64 {
        self.request_count.load(Ordering::Relaxed)
    }
}

/// Counts every request; content routes also feed the Prometheus metrics
async fn track_requests(State(state): State<Arc<AppState>>, request: Request, next: Next) -> Response {
    state.request_count.fetch_add(1, Ordering::Relaxed);

    let method = request.method().as_str().to_string();
    let path = request.uri().path();
    let endpoint = COUNTED_ROUTES.iter().find(|r| **r == path).copied();

    let start = Instant::now();
    let response = next.run(request).await;
    if let Some(endpoint) = endpoint {
        state.metrics.observe(&method, endpoint, start.elapsed());
    }

    response
}

async fn home(State(state): State<Arc<AppState>>) -> Html<String> {
    let now = Utc::now().format("%Y-%m-%d %H:%M:%S");
    Html(format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>{title}</title>
    <style>
        body {{ font-family: Arial, sans-serif; margin: 40px; }}
        .status {{ padding: 20px; background: #f0f8ff; border-radius: 5px; }}
        .metric {{ margin: 10px 0; }}
    </style>
</head>
<body>
    <h1>{title}</h1>
    <div class="status">
        <h2>Application Status</h2>
        <div class="metric">Status: Running</div>
        <div class="metric">Current Time: {now}</div>
        <div class="metric">Uptime: {uptime:.2} seconds</div>
        <div class="metric">Total Requests: {requests}</div>
        <div class="metric">Branch: {branch}</div>
        <div class="metric">Environment: {env}</div>
    </div>
    <h2>Available Endpoints</h2>
    <ul>
        <li><a href="/health">Health Check</a></li>
        <li><a href="/metrics">Prometheus Metrics</a></li>
        <li><a href="/api/info">API Info</a></li>
        <li><a href="/api/test">API Test</a></li>
    </ul>
</body>
</html>
"#,
        title = APP_TITLE,
        now = now,
        uptime = state.uptime().as_secs_f64(),
        requests = state.request_count(),
        branch = state.config.branch_name,
        env = state.config.app_env,
    ))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339(),
        "uptime": state.uptime().as_secs_f64(),
        "version": VERSION,
    }))
}

/// Prometheus metrics endpoint
async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    match state.metrics.encode() {
        Ok(buffer) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            internal_error()
        }
    }
}

async fn api_info(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({
        "app_name": APP_NAME,
        "version": VERSION,
        "branch": state.config.branch_name,
        "environment": state.config.app_env,
        "container_id": state.config.hostname,
        "start_time": state.started_at.to_rfc3339(),
        "current_time": Utc::now().to_rfc3339(),
    }))
}

async fn api_test() -> impl IntoResponse {
    tokio::time::sleep(API_TEST_DELAY).await;

    let now = Utc::now();
    Json(json!({
        "test": "success",
        "message": "API is working correctly",
        "timestamp": now.to_rfc3339(),
        "random_number": now.timestamp_millis().rem_euclid(1000),
    }))
}

async fn not_found() -> impl IntoResponse {
    (StatusCode::NOT_FOUND, Json(json!({ "error": "Not found" })))
}

fn internal_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "error": "Internal server error" })),
    )
        .into_response()
}

/// Create the application router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .route("/api/info", get(api_info))
        .route("/api/test", get(api_test))
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), track_requests))
        .with_state(state)
}

/// Serve on an already bound listener until `shutdown` resolves
pub async fn serve_listener(
    listener: TcpListener,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);
    info!(addr = %listener.local_addr()?, "Starting sample application");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
