//! Core data models for the pipeline

use crate::health::HealthSignal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Container lifecycle state as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContainerState {
    Created,
    Running,
    Paused,
    Restarting,
    Removing,
    Exited,
    Dead,
    Unknown,
}

impl ContainerState {
    /// Parse the engine's `.State.Status` string
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "paused" => ContainerState::Paused,
            "restarting" => ContainerState::Restarting,
            "removing" => ContainerState::Removing,
            "exited" => ContainerState::Exited,
            "dead" => ContainerState::Dead,
            _ => ContainerState::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ContainerState::Created => "created",
            ContainerState::Running => "running",
            ContainerState::Paused => "paused",
            ContainerState::Restarting => "restarting",
            ContainerState::Removing => "removing",
            ContainerState::Exited => "exited",
            ContainerState::Dead => "dead",
            ContainerState::Unknown => "unknown",
        }
    }
}

/// One resource and health snapshot of a running target
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSample {
    pub timestamp: DateTime<Utc>,
    pub cpu_percent: f64,
    /// Memory in use, normalized to MiB
    pub memory_used_mb: f64,
    /// Memory limit, normalized to MiB
    pub memory_limit_mb: f64,
    pub memory_percent: f64,
    pub network_in_bytes: u64,
    pub network_out_bytes: u64,
    pub block_read_bytes: u64,
    pub block_write_bytes: u64,
    pub process_count: u32,
    pub container_status: ContainerState,
    pub container_health: HealthSignal,
    pub application_health_status: HealthSignal,
    pub application_request_count: Option<u64>,
}

/// Build metadata recorded next to the image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildInfo {
    pub timestamp: DateTime<Utc>,
    pub branch: String,
    pub commit: String,
    pub tags: Vec<String>,
}

impl BuildInfo {
    pub fn new(branch: impl Into<String>, commit: impl Into<String>, tags: Vec<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            branch: branch.into(),
            commit: commit.into(),
            tags,
        }
    }

    /// Default tags for an image: `latest` and `<branch>-<commit>`
    pub fn default_tags(image: &str, branch: &str, commit: &str) -> Vec<String> {
        let branch = branch.replace('/', "-");
        vec![
            format!("{}:latest", image),
            format!("{}:{}-{}", image, branch, commit),
        ]
    }
}

/// Outcome of one HTTP check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestResult {
    pub name: String,
    pub success: bool,
    pub detail: String,
    pub duration_ms: u64,
}

impl TestResult {
    pub fn passed(name: impl Into<String>, detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            success: true,
            detail: detail.into(),
            duration_ms,
        }
    }

    pub fn failed(name: impl Into<String>, detail: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            name: name.into(),
            success: false,
            detail: detail.into(),
            duration_ms,
        }
    }
}

/// Accumulated results of one test run
///
/// `total == passed + failed == tests.len()` holds at all times; `record`
/// is the only way in.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TestResultSet {
    total: usize,
    passed: usize,
    failed: usize,
    tests: Vec<TestResult>,
}

impl TestResultSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, result: TestResult) {
        if result.success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.total += 1;
        self.tests.push(result);
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn passed(&self) -> usize {
        self.passed
    }

    pub fn failed(&self) -> usize {
        self.failed
    }

    pub fn tests(&self) -> &[TestResult] {
        &self.tests
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }

    /// Percentage of passed tests rounded to two decimals; 0 for an empty run
    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        let rate = self.passed as f64 / self.total as f64 * 100.0;
        (rate * 100.0).round() / 100.0
    }
}

/// Summary block of a test report
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub success_rate: f64,
}

/// Serialized test report artifact
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestReport {
    pub timestamp: DateTime<Utc>,
    pub target: String,
    pub summary: TestSummary,
    pub tests: Vec<TestResult>,
}

impl TestReport {
    pub fn new(target: impl Into<String>, results: TestResultSet) -> Self {
        let summary = TestSummary {
            total: results.total(),
            passed: results.passed(),
            failed: results.failed(),
            success_rate: results.success_rate(),
        };

        Self {
            timestamp: Utc::now(),
            target: target.into(),
            summary,
            tests: results.tests,
        }
    }
}

/// How a monitoring session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Termination {
    Completed,
    Cancelled,
}

/// Aggregate statistics of one monitoring session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub target: String,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub samples: usize,
    pub avg_cpu_percent: f64,
    pub max_cpu_percent: f64,
    pub avg_memory_percent: f64,
    pub max_memory_percent: f64,
    pub termination: Termination,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_set_invariant() {
        let mut set = TestResultSet::new();
        set.record(TestResult::passed("a", "ok", 1));
        set.record(TestResult::failed("b", "status 500", 2));
        set.record(TestResult::passed("c", "ok", 3));

        assert_eq!(set.total(), set.passed() + set.failed());
        assert_eq!(set.total(), set.tests().len());
        assert_eq!(set.passed(), 2);
        assert!(!set.all_passed());
    }

    #[test]
    fn test_success_rate_rounding() {
        let mut set = TestResultSet::new();
        set.record(TestResult::passed("a", "", 0));
        set.record(TestResult::passed("b", "", 0));
        set.record(TestResult::failed("c", "", 0));

        assert_eq!(set.success_rate(), 66.67);
    }

    #[test]
    fn test_success_rate_empty_run() {
        let set = TestResultSet::new();
        assert_eq!(set.success_rate(), 0.0);
        assert!(set.all_passed());
    }

    #[test]
    fn test_report_summary_matches_results() {
        let mut set = TestResultSet::new();
        set.record(TestResult::passed("health", "ok", 4));
        let report = TestReport::new("http://localhost:8000", set);

        assert_eq!(report.summary.total, 1);
        assert_eq!(report.summary.success_rate, 100.0);
        assert_eq!(report.tests.len(), 1);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["summary"]["passed"], 1);
        assert_eq!(json["target"], "http://localhost:8000");
    }

    #[test]
    fn test_container_state_parse() {
        assert_eq!(ContainerState::parse("running\n"), ContainerState::Running);
        assert_eq!(ContainerState::parse("Exited"), ContainerState::Exited);
        assert_eq!(ContainerState::parse("<no value>"), ContainerState::Unknown);
    }

    #[test]
    fn test_default_tags_sanitize_branch() {
        let tags = BuildInfo::default_tags("sample-app", "feature/login", "abc1234");
        assert_eq!(
            tags,
            vec![
                "sample-app:latest".to_string(),
                "sample-app:feature-login-abc1234".to_string()
            ]
        );
    }
}
