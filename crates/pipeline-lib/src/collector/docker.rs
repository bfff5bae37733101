//! Collector backed by the container engine and the application's HTTP surface

use super::exposition::sum_metric;
use super::units::{parse_count, parse_io_pair, parse_memory_usage, parse_percent};
use super::MetricsCollector;
use crate::engine::{ContainerEngine, RawStats};
use crate::health::{HealthSignal, HealthSource, HttpHealthSource};
use crate::models::{ContainerState, MetricSample};
use crate::probe::HttpProbe;
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tracing::debug;

/// Counter scraped from the application's `/metrics` endpoint
const REQUEST_COUNTER: &str = "app_requests_total";

/// Assemble a sample from raw engine stats plus state and health readings
pub fn build_sample(
    timestamp: DateTime<Utc>,
    stats: &RawStats,
    container_status: ContainerState,
    container_health: HealthSignal,
    application_health_status: HealthSignal,
    application_request_count: Option<u64>,
) -> MetricSample {
    let memory = parse_memory_usage(&stats.mem_usage);
    let (network_in_bytes, network_out_bytes) = parse_io_pair(&stats.net_io);
    let (block_read_bytes, block_write_bytes) = parse_io_pair(&stats.block_io);

    MetricSample {
        timestamp,
        cpu_percent: parse_percent(&stats.cpu_perc),
        memory_used_mb: memory.used_mb,
        memory_limit_mb: memory.limit_mb,
        memory_percent: memory.percent,
        network_in_bytes,
        network_out_bytes,
        block_read_bytes,
        block_write_bytes,
        process_count: parse_count(&stats.pids),
        container_status,
        container_health,
        application_health_status,
        application_request_count,
    }
}

/// Samples a container through the engine CLI.
///
/// When an application probe is attached, each sample also carries the
/// application's health and its request counter. Only the stats call is
/// required; every other reading degrades to an absent value.
pub struct DockerCollector {
    engine: ContainerEngine,
    application: Option<(HttpHealthSource, HttpProbe)>,
}

impl DockerCollector {
    pub fn new(engine: ContainerEngine) -> Self {
        Self {
            engine,
            application: None,
        }
    }

    /// Also read the application's `/health` and `/metrics` endpoints
    pub fn with_application(mut self, probe: HttpProbe) -> Self {
        self.application = Some((HttpHealthSource::new(probe.clone()), probe));
        self
    }

    async fn container_state(&self, target: &str) -> (ContainerState, HealthSignal) {
        match self.engine.state(target).await {
            Ok(state) => state,
            Err(e) => {
                debug!(container = %target, error = %e, "Inspect failed");
                (ContainerState::Unknown, HealthSignal::Absent)
            }
        }
    }

    async fn application_readings(&self) -> (HealthSignal, Option<u64>) {
        let Some((health, probe)) = &self.application else {
            return (HealthSignal::Absent, None);
        };

        let signal = match health.query().await {
            Ok(signal) => signal,
            Err(e) => {
                debug!(error = %e, "Application health unavailable");
                HealthSignal::Absent
            }
        };

        let requests = match probe.get("/metrics").await {
            Ok(response) if response.is_success() => {
                sum_metric(&response.body, REQUEST_COUNTER).map(|v| v.max(0.0).round() as u64)
            }
            Ok(response) => {
                debug!(status = response.status, "Application metrics unavailable");
                None
            }
            Err(e) => {
                debug!(error = %e, "Application metrics unavailable");
                None
            }
        };

        (signal, requests)
    }
}

#[async_trait]
impl MetricsCollector for DockerCollector {
    async fn collect(&self, target: &str) -> Result<MetricSample> {
        let timestamp = Utc::now();
        let stats = self
            .engine
            .stats(target)
            .await
            .with_context(|| format!("Failed to read stats for {}", target))?;

        let (status, container_health) = self.container_state(target).await;
        let (app_health, requests) = self.application_readings().await;

        Ok(build_sample(
            timestamp,
            &stats,
            status,
            container_health,
            app_health,
            requests,
        ))
    }
}
