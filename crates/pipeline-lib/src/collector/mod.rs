//! Metrics sampling for a running target
//!
//! This module provides the collector that turns engine stats and
//! application metrics into [`MetricSample`]s, the append-only session
//! history with its on-disk snapshots, and the sampling loop that ties
//! them together with periodic flushing and cancellation.

mod docker;
mod exposition;
mod history;
mod r#loop;
mod units;


pub use docker::{build_sample, DockerCollector};
pub use exposition::sum_metric;
pub use history::{MetricsHistory, SnapshotStore};
pub use r#loop::{MetricsSampler, MetricsSamplerBuilder, SamplerConfig, SessionReport};
pub use units::{
    parse_byte_size, parse_count, parse_io_pair, parse_memory_usage, parse_percent, MemoryUsage,
};

use crate::models::{MetricSample, SessionSummary};
use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

/// Trait for metrics collection implementations
#[async_trait]
pub trait MetricsCollector: Send + Sync {
    /// Acquire one sample for `target`
    async fn collect(&self, target: &str) -> Result<MetricSample>;
}

/// Receives each sample as it is recorded.
///
/// Presenters only ever see immutable snapshots; they own no session state.
pub trait SamplePresenter: Send + Sync {
    /// `index` is the 1-based position of the sample in the session
    fn present(&self, index: usize, sample: &MetricSample);

    fn present_summary(&self, _summary: &SessionSummary) {}
}

/// Presenter that writes samples to the tracing log
#[derive(Debug, Default, Clone, Copy)]
pub struct LogPresenter;

impl SamplePresenter for LogPresenter {
    fn present(&self, index: usize, sample: &MetricSample) {
        info!(
            sample = index,
            cpu_percent = sample.cpu_percent,
            memory_percent = sample.memory_percent,
            memory_used_mb = sample.memory_used_mb,
            processes = sample.process_count,
            container_status = sample.container_status.as_str(),
            container_health = sample.container_health.as_str(),
            app_health = sample.application_health_status.as_str(),
            requests = ?sample.application_request_count,
            "Metrics sample"
        );
    }

    fn present_summary(&self, summary: &SessionSummary) {
        info!(
            samples = summary.samples,
            avg_cpu_percent = summary.avg_cpu_percent,
            max_cpu_percent = summary.max_cpu_percent,
            avg_memory_percent = summary.avg_memory_percent,
            max_memory_percent = summary.max_memory_percent,
            "Monitoring session summary"
        );
    }
}
