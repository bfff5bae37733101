//! Structured event logging for pipeline runs
//!
//! Every event carries an `event` name and the application it concerns,
//! so JSON log consumers can follow one delivery end to end.

use crate::health::HealthState;
use crate::models::SessionSummary;
use std::path::Path;
use std::time::Duration;
use tracing::{info, warn};

/// Structured logger for pipeline events
#[derive(Debug, Clone)]
pub struct StructuredLogger {
    app: String,
}

impl StructuredLogger {
    pub fn new(app: impl Into<String>) -> Self {
        Self { app: app.into() }
    }

    pub fn app(&self) -> &str {
        &self.app
    }

    pub fn log_stage_started(&self, stage: &str) {
        info!(
            event = "stage_started",
            app = %self.app,
            stage = %stage,
            "Pipeline stage started"
        );
    }

    pub fn log_stage_finished(&self, stage: &str, elapsed: Duration, success: bool, detail: &str) {
        if success {
            info!(
                event = "stage_finished",
                app = %self.app,
                stage = %stage,
                elapsed_ms = elapsed.as_millis() as u64,
                success = true,
                "Pipeline stage finished"
            );
        } else {
            warn!(
                event = "stage_finished",
                app = %self.app,
                stage = %stage,
                elapsed_ms = elapsed.as_millis() as u64,
                success = false,
                detail = %detail,
                "Pipeline stage failed"
            );
        }
    }

    /// Log the terminal state of a health poll
    pub fn log_health_poll(&self, source: &str, state: HealthState, elapsed: Duration, queries: u32) {
        let message = match state {
            HealthState::Healthy => "Target is healthy",
            HealthState::Unhealthy => "Target reported unhealthy",
            _ => "Gave up waiting for target health",
        };

        if state == HealthState::Healthy {
            info!(
                event = "health_poll_finished",
                app = %self.app,
                source = %source,
                state = state.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                queries = queries,
                "{}", message
            );
        } else {
            warn!(
                event = "health_poll_finished",
                app = %self.app,
                source = %source,
                state = state.as_str(),
                elapsed_ms = elapsed.as_millis() as u64,
                queries = queries,
                "{}", message
            );
        }
    }

    pub fn log_session_started(&self, container: &str, interval: Duration, duration: Option<Duration>) {
        info!(
            event = "session_started",
            app = %self.app,
            container = %container,
            interval_secs = interval.as_secs_f64(),
            duration_secs = ?duration.map(|d| d.as_secs()),
            "Monitoring session started"
        );
    }

    pub fn log_snapshot_flushed(&self, path: &Path, samples: usize, terminal: bool) {
        info!(
            event = "snapshot_flushed",
            app = %self.app,
            path = %path.display(),
            samples = samples,
            terminal = terminal,
            "Metrics snapshot flushed"
        );
    }

    pub fn log_session_finished(&self, summary: &SessionSummary, errors: usize) {
        info!(
            event = "session_finished",
            app = %self.app,
            container = %summary.target,
            samples = summary.samples,
            errors = errors,
            termination = ?summary.termination,
            avg_cpu_percent = summary.avg_cpu_percent,
            max_memory_percent = summary.max_memory_percent,
            "Monitoring session finished"
        );
    }

    pub fn log_test_run(&self, base_url: &str, total: usize, passed: usize, success_rate: f64) {
        if passed == total {
            info!(
                event = "test_run",
                app = %self.app,
                base_url = %base_url,
                total = total,
                passed = passed,
                success_rate = success_rate,
                "Test run passed"
            );
        } else {
            warn!(
                event = "test_run",
                app = %self.app,
                base_url = %base_url,
                total = total,
                passed = passed,
                success_rate = success_rate,
                "Test run had failures"
            );
        }
    }
}
