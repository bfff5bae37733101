//! Integration tests for the sample application endpoints

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use sample_app::{create_router, AppConfig, AppState, APP_TITLE};
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn setup_test_app() -> (Router, Arc<AppState>) {
    let config = AppConfig {
        branch_name: "feature/login".to_string(),
        app_env: "test".to_string(),
        ..AppConfig::default()
    };
    let state = Arc::new(AppState::new(config).unwrap());
    (create_router(state.clone()), state)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, String) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(body.to_vec()).unwrap())
}

async fn get_json(app: &Router, uri: &str) -> (StatusCode, Value) {
    let (status, body) = get(app, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn test_home_page() {
    let (app, _) = setup_test_app();
    let (status, body) = get(&app, "/").await;

    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(APP_TITLE));
    assert!(body.contains("feature/login"));
}

#[tokio::test]
async fn test_health_endpoint() {
    let (app, _) = setup_test_app();
    let (status, json) = get_json(&app, "/health").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
    assert!(json["uptime"].is_number());
    assert!(json.get("version").is_some());
}

#[tokio::test]
async fn test_api_info() {
    let (app, _) = setup_test_app();
    let (status, json) = get_json(&app, "/api/info").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["branch"], "feature/login");
    assert_eq!(json["environment"], "test");
    assert_eq!(json["container_id"], "unknown");
    assert!(json.get("app_name").is_some());
}

#[tokio::test]
async fn test_api_test_endpoint() {
    let (app, _) = setup_test_app();
    let (status, json) = get_json(&app, "/api/test").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["test"], "success");
    assert!(json.get("message").is_some());
    let random = json["random_number"].as_i64().unwrap();
    assert!((0..1000).contains(&random));
}

#[tokio::test]
async fn test_unknown_path_returns_json_404() {
    let (app, _) = setup_test_app();
    let (status, json) = get_json(&app, "/nonexistent").await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json["error"], "Not found");
}

#[tokio::test]
async fn test_query_string_is_ignored() {
    let (app, _) = setup_test_app();
    let (status, _) = get_json(&app, "/api/info?id=1%27%20OR%20%271%27=%271").await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_requests_are_counted() {
    let (app, state) = setup_test_app();
    get(&app, "/health").await;
    get(&app, "/health").await;
    get(&app, "/missing").await;

    assert_eq!(state.request_count(), 3);

    let (status, body) = get(&app, "/metrics").await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.contains(r#"app_requests_total{endpoint="/health",method="GET"} 2"#));
    assert!(body.contains("app_request_duration_seconds_count 2"));
}

#[tokio::test]
async fn test_scrapes_and_misses_do_not_inflate_request_metric() {
    let (app, state) = setup_test_app();
    get(&app, "/api/info").await;
    get(&app, "/missing").await;
    get(&app, "/metrics").await;
    get(&app, "/metrics").await;

    let (_, body) = get(&app, "/metrics").await;
    assert_eq!(state.request_count(), 5);
    assert!(body.contains(r#"app_requests_total{endpoint="/api/info",method="GET"} 1"#));
    assert!(!body.contains(r#"endpoint="/metrics""#));
    assert!(!body.contains("unmatched"));
}
