//! End-to-end checks against a real sample application server
//!
//! The server is bound to an ephemeral local port, so these tests need no
//! container engine.

use pipeline_lib::health::{HealthPoller, HealthState, HttpHealthSource};
use pipeline_lib::models::TestReport;
use pipeline_lib::probe::HttpProbe;
use pipeline_lib::suite::{LoadTest, TestSuite};
use sample_app::{AppConfig, AppState, APP_TITLE};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

struct RunningApp {
    base_url: String,
    state: Arc<AppState>,
    _shutdown: oneshot::Sender<()>,
}

async fn start_app() -> RunningApp {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let state = Arc::new(AppState::new(AppConfig::default()).unwrap());
    let (tx, rx) = oneshot::channel::<()>();

    tokio::spawn(sample_app::serve_listener(listener, state.clone(), async move {
        let _ = rx.await;
    }));

    RunningApp {
        base_url: format!("http://{}", addr),
        state,
        _shutdown: tx,
    }
}

#[tokio::test]
async fn test_suite_passes_against_sample_app() {
    let app = start_app().await;
    let probe = HttpProbe::new(&app.base_url).unwrap();

    let results = TestSuite::new(probe).with_title(APP_TITLE).run().await;
    let failures: Vec<_> = results.tests().iter().filter(|t| !t.success).collect();
    assert!(failures.is_empty(), "failed checks: {:?}", failures);

    let report = TestReport::new(&app.base_url, results);
    assert_eq!(report.summary.total, 9);
    assert_eq!(report.summary.success_rate, 100.0);

    // Nine checks, the concurrent one issuing twenty requests
    assert!(app.state.request_count() >= 28);
}

#[tokio::test]
async fn test_poller_sees_sample_app_healthy() {
    let app = start_app().await;
    let source = HttpHealthSource::new(HttpProbe::new(&app.base_url).unwrap());

    let outcome = HealthPoller::new(Duration::from_millis(100), Duration::from_secs(5))
        .wait(&source)
        .await;

    assert_eq!(outcome.state, HealthState::Healthy);
    assert_eq!(outcome.queries, 1);
}

#[tokio::test]
async fn test_poller_times_out_without_server() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let probe = HttpProbe::with_timeout(&format!("http://{}", addr), Duration::from_millis(100)).unwrap();
    let outcome = HealthPoller::new(Duration::from_millis(50), Duration::from_millis(300))
        .wait(&HttpHealthSource::new(probe))
        .await;

    assert_eq!(outcome.state, HealthState::TimedOut);
    assert!(outcome.queries >= 2);
}

#[tokio::test]
async fn test_load_against_sample_app() {
    let app = start_app().await;
    let probe = HttpProbe::new(&app.base_url).unwrap();

    let report = LoadTest::new(5, 4, "/health").run(&probe).await;

    assert_eq!(report.total, 20);
    assert!(report.all_succeeded());
    assert!(report.min_latency_ms <= report.avg_latency_ms);
    assert!(report.avg_latency_ms <= report.max_latency_ms);
    assert_eq!(app.state.request_count(), 20);
}
