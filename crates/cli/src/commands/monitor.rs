//! Live metrics monitoring command

use anyhow::{Context as _, Result};
use colored::Colorize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::warn;

use super::Context;
use crate::output::{
    color_load, color_status, format_bytes, format_mib, format_percent, print_info, print_json,
    OutputFormat,
};
use pipeline_lib::collector::{
    DockerCollector, MetricsSamplerBuilder, SamplePresenter, SnapshotStore,
};
use pipeline_lib::models::{MetricSample, SessionSummary};

/// Prints each sample as a console line or a JSON document
struct ConsolePresenter {
    format: OutputFormat,
}

impl SamplePresenter for ConsolePresenter {
    fn present(&self, index: usize, sample: &MetricSample) {
        match self.format {
            OutputFormat::Json => match serde_json::to_string(sample) {
                Ok(line) => println!("{}", line),
                Err(e) => warn!(error = %e, "Failed to serialize sample"),
            },
            OutputFormat::Table => {
                let requests = sample
                    .application_request_count
                    .map(|n| n.to_string())
                    .unwrap_or_else(|| "-".to_string());
                println!(
                    "{:>4}  {}  cpu {:>7}  mem {:>9} / {:<9} {:>7}  net {:>9}/{:<9}  pids {:>3}  {} {}  app {}  req {}",
                    index,
                    sample.timestamp.format("%H:%M:%S"),
                    color_load(sample.cpu_percent),
                    format_mib(sample.memory_used_mb),
                    format_mib(sample.memory_limit_mb),
                    color_load(sample.memory_percent),
                    format_bytes(sample.network_in_bytes),
                    format_bytes(sample.network_out_bytes),
                    sample.process_count,
                    color_status(sample.container_status.as_str()),
                    color_status(sample.container_health.as_str()),
                    color_status(sample.application_health_status.as_str()),
                    requests,
                );
            }
        }
    }

    fn present_summary(&self, summary: &SessionSummary) {
        if self.format == OutputFormat::Json {
            return;
        }
        println!();
        println!("{}", "Session Summary".bold());
        println!("{}", "=".repeat(50));
        println!("Target:        {}", summary.target.cyan());
        println!(
            "Duration:      {}s",
            (summary.ended_at - summary.started_at).num_seconds()
        );
        println!("Samples:       {}", summary.samples);
        println!(
            "CPU:           avg {} / max {}",
            format_percent(summary.avg_cpu_percent),
            format_percent(summary.max_cpu_percent)
        );
        println!(
            "Memory:        avg {} / max {}",
            format_percent(summary.avg_memory_percent),
            format_percent(summary.max_memory_percent)
        );
        let termination = serde_json::to_value(summary.termination)
            .ok()
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();
        println!("Ended:         {}", color_status(&termination));
    }
}

/// Options for one monitoring session
pub struct MonitorOptions<'a> {
    pub compose: Option<&'a Path>,
    pub service: &'a str,
    pub interval: Option<u64>,
    pub duration: Option<u64>,
    pub persist: bool,
    pub with_app: bool,
}

/// Sample the target until the duration elapses or Ctrl-C is pressed
pub async fn monitor(ctx: &Context, options: MonitorOptions<'_>) -> Result<()> {
    let engine = ctx.engine();
    engine.ensure_available().await?;

    let target = match options.compose {
        Some(file) => engine
            .compose_container(&file.to_string_lossy(), options.service)
            .await
            .with_context(|| format!("Service {} is not running", options.service))?,
        None => ctx.settings.container.clone(),
    };

    let mut collector = DockerCollector::new(engine);
    if options.with_app {
        collector = collector.with_application(ctx.probe()?);
    }

    let interval = Duration::from_secs(
        options
            .interval
            .unwrap_or(ctx.settings.monitor_interval_secs)
            .max(1),
    );

    let mut builder = MetricsSamplerBuilder::new()
        .collector(Arc::new(collector))
        .target(target.clone())
        .presenter(Arc::new(ConsolePresenter { format: ctx.format }))
        .interval(interval)
        .duration(options.duration.map(Duration::from_secs))
        .flush_every(ctx.settings.flush_every);
    if options.persist {
        builder = builder.store(SnapshotStore::new(ctx.settings.output_dir.clone()));
    }
    let sampler = builder.build()?;

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                let _ = shutdown_tx.send(());
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for Ctrl-C");
                // Keep the sender alive so the session is not cancelled
                std::future::pending::<()>().await;
            }
        }
    });

    if ctx.format == OutputFormat::Table {
        print_info(&format!(
            "Monitoring {} every {}s (Ctrl-C to stop)",
            target.bold(),
            interval.as_secs()
        ));
    }

    let report = sampler.run(shutdown_rx).await;

    match ctx.format {
        OutputFormat::Json => print_json(&report.summary),
        OutputFormat::Table => {
            if report.errors > 0 {
                println!("Skipped:       {} samples", report.errors);
            }
            if let Some(path) = &report.snapshot_path {
                println!("Snapshot:      {} ({} flushes)", path.display(), report.flushes);
            }
            if let Some(path) = &report.summary_path {
                println!("Summary:       {}", path.display());
            }
        }
    }

    Ok(())
}
