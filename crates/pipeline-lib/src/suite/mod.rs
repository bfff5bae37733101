//! HTTP acceptance checks against a deployed application
//!
//! The suite runs a fixed, ordered list of checks. Every check yields
//! exactly one [`TestResult`]; transport errors become failed results.

mod load;

pub use load::{LoadReport, LoadTest, RequestOutcome};

use crate::error::PipelineResult;
use crate::models::{TestReport, TestResult, TestResultSet};
use crate::probe::{HttpProbe, ProbeResponse};
use std::future::Future;
use std::path::Path;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Title the home page is expected to show
pub const DEFAULT_TITLE: &str = "Container Delivery Sample App";

const QUERY_STRING_PATH: &str = "/api/info?id=1' OR '1'='1";

type CheckResult = Result<String, String>;

/// Ordered HTTP checks for the sample application
#[derive(Debug, Clone)]
pub struct TestSuite {
    probe: HttpProbe,
    title: String,
    max_response_time: Duration,
    concurrency: LoadTest,
}

impl TestSuite {
    pub fn new(probe: HttpProbe) -> Self {
        Self {
            probe,
            title: DEFAULT_TITLE.to_string(),
            max_response_time: Duration::from_secs(1),
            concurrency: LoadTest::new(10, 2, "/api/test"),
        }
    }

    /// Expect a different home page title
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn base_url(&self) -> &str {
        self.probe.base_url().as_str()
    }

    /// Run every check in order
    pub async fn run(&self) -> TestResultSet {
        let mut results = TestResultSet::new();
        info!(base_url = %self.base_url(), "Running HTTP test suite");

        results.record(self.check("home_page", self.home_page()).await);
        results.record(self.check("health_endpoint", self.health_endpoint()).await);
        results.record(self.check("api_info", self.api_info()).await);
        results.record(self.check("api_test", self.api_test()).await);
        results.record(self.check("metrics_endpoint", self.metrics_endpoint()).await);
        results.record(self.check("not_found", self.not_found()).await);
        results.record(self.check("response_time", self.response_time()).await);
        results.record(self.check("concurrent_requests", self.concurrent_requests()).await);
        results.record(self.check("query_string_probe", self.query_string_probe()).await);

        results
    }

    async fn check(&self, name: &str, check: impl Future<Output = CheckResult>) -> TestResult {
        let start = Instant::now();
        let outcome = check.await;
        let duration_ms = start.elapsed().as_millis() as u64;

        match outcome {
            Ok(detail) => {
                debug!(test = name, duration_ms = duration_ms, "Check passed");
                TestResult::passed(name, detail, duration_ms)
            }
            Err(detail) => {
                debug!(test = name, detail = %detail, "Check failed");
                TestResult::failed(name, detail, duration_ms)
            }
        }
    }

    async fn fetch(&self, path: &str) -> Result<ProbeResponse, String> {
        self.probe
            .get(path)
            .await
            .map_err(|e| format!("request to {} failed: {}", path, e))
    }

    async fn home_page(&self) -> CheckResult {
        let response = self.fetch("/").await?;
        expect_status(&response, 200)?;
        if !response.body.contains(&self.title) {
            return Err(format!("page does not contain {:?}", self.title));
        }
        Ok("home page served".to_string())
    }

    async fn health_endpoint(&self) -> CheckResult {
        let response = self.fetch("/health").await?;
        expect_status(&response, 200)?;
        match response.json_str("status") {
            Some("healthy") => {}
            other => return Err(format!("status is {:?}, expected \"healthy\"", other)),
        }
        expect_fields(&response, &["timestamp", "uptime", "version"])?;
        Ok("healthy".to_string())
    }

    async fn api_info(&self) -> CheckResult {
        let response = self.fetch("/api/info").await?;
        expect_status(&response, 200)?;
        expect_fields(&response, &["app_name", "version", "branch", "environment"])?;
        Ok(format!(
            "branch {}, environment {}",
            response.json_str("branch").unwrap_or("?"),
            response.json_str("environment").unwrap_or("?")
        ))
    }

    async fn api_test(&self) -> CheckResult {
        let response = self.fetch("/api/test").await?;
        expect_status(&response, 200)?;
        if response.json_str("test") != Some("success") {
            return Err("field \"test\" is not \"success\"".to_string());
        }
        expect_fields(&response, &["message", "timestamp", "random_number"])?;
        Ok("api responded".to_string())
    }

    async fn metrics_endpoint(&self) -> CheckResult {
        let response = self.fetch("/metrics").await?;
        expect_status(&response, 200)?;
        if !response.body.contains("app_requests_total") {
            return Err("app_requests_total not exposed".to_string());
        }
        Ok("metrics exposed".to_string())
    }

    async fn not_found(&self) -> CheckResult {
        let response = self.fetch("/nonexistent").await?;
        expect_status(&response, 404)?;
        expect_fields(&response, &["error"])?;
        Ok("404 with JSON error".to_string())
    }

    async fn response_time(&self) -> CheckResult {
        let response = self.fetch("/api/test").await?;
        expect_status(&response, 200)?;
        if response.elapsed > self.max_response_time {
            return Err(format!(
                "took {}ms, limit {}ms",
                response.elapsed.as_millis(),
                self.max_response_time.as_millis()
            ));
        }
        Ok(format!("{}ms", response.elapsed.as_millis()))
    }

    async fn concurrent_requests(&self) -> CheckResult {
        let report = self.concurrency.run(&self.probe).await;
        if report.all_succeeded() && report.total > 0 {
            Ok(format!(
                "{} requests from {} workers, avg {:.1}ms",
                report.total, report.workers, report.avg_latency_ms
            ))
        } else {
            Err(format!("{} of {} requests failed", report.failed, report.total))
        }
    }

    async fn query_string_probe(&self) -> CheckResult {
        let response = self.fetch(QUERY_STRING_PATH).await?;
        if response.status >= 500 {
            return Err(format!("server error {}", response.status));
        }
        Ok(format!(
            "status {}; records the response code only, does not validate injection safety",
            response.status
        ))
    }
}

fn expect_status(response: &ProbeResponse, expected: u16) -> Result<(), String> {
    if response.status == expected {
        Ok(())
    } else {
        Err(format!("status {}, expected {}", response.status, expected))
    }
}

fn expect_fields(response: &ProbeResponse, fields: &[&str]) -> Result<(), String> {
    if response.json.is_none() {
        return Err("body is not JSON".to_string());
    }
    let missing: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|f| !response.has_field(f))
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!("missing fields: {}", missing.join(", ")))
    }
}

/// Serialize a test report as pretty JSON
pub fn write_report(report: &TestReport, path: &Path) -> PipelineResult<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(report)?;
    std::fs::write(path, json)?;
    Ok(())
}
