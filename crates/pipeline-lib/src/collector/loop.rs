//! Metrics sampling loop
//!
//! Samples one target on a fixed interval, keeps the session history,
//! flushes it to disk every `flush_every` samples and writes a summary when
//! the session ends. The session ends when its duration elapses or when the
//! shutdown channel fires; both paths run the same finalization.

use super::history::{MetricsHistory, SnapshotStore};
use super::{LogPresenter, MetricsCollector, SamplePresenter};
use crate::models::{MetricSample, SessionSummary, Termination};
use crate::observability::StructuredLogger;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast::{self, error::TryRecvError};
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Configuration for a sampling session
#[derive(Debug, Clone)]
pub struct SamplerConfig {
    /// Time between samples (default: 5 seconds)
    pub interval: Duration,
    /// Total session length; `None` runs until shutdown
    pub duration: Option<Duration>,
    /// Snapshot cadence in samples (default: 10)
    pub flush_every: usize,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            duration: None,
            flush_every: 10,
        }
    }
}

/// What a finished session leaves behind
#[derive(Debug, Clone)]
pub struct SessionReport {
    pub summary: SessionSummary,
    /// Samples recorded
    pub samples: usize,
    /// Snapshot writes, including the terminal one
    pub flushes: usize,
    /// Ticks skipped because acquisition failed
    pub errors: usize,
    pub snapshot_path: Option<PathBuf>,
    pub summary_path: Option<PathBuf>,
}

/// Periodic sampler for one target
pub struct MetricsSampler {
    collector: Arc<dyn MetricsCollector>,
    presenter: Arc<dyn SamplePresenter>,
    store: Option<SnapshotStore>,
    logger: StructuredLogger,
    target: String,
    config: SamplerConfig,
}

impl MetricsSampler {
    /// Run until the duration elapses or `shutdown` fires.
    ///
    /// A closed or lagged shutdown channel counts as a shutdown. If the
    /// returned future is dropped mid-session, the terminal flush and
    /// summary are still written.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) -> SessionReport {
        let mut session = Session::new(
            self.target.clone(),
            self.store.clone(),
            self.presenter.clone(),
            self.logger.clone(),
            self.config.flush_every,
        );

        self.logger
            .log_session_started(&self.target, self.config.interval, self.config.duration);

        let deadline = self
            .config
            .duration
            .filter(|d| !d.is_zero())
            .map(|d| Instant::now() + d);

        let mut ticker = interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let termination = loop {
            match shutdown.try_recv() {
                Err(TryRecvError::Empty) => {}
                _ => break Termination::Cancelled,
            }

            tokio::select! {
                biased;
                _ = shutdown.recv() => {
                    info!(target_name = %self.target, "Sampling interrupted");
                    break Termination::Cancelled;
                }
                _ = until(deadline) => break Termination::Completed,
                _ = ticker.tick() => {}
            }

            match self.collector.collect(&self.target).await {
                Ok(sample) => session.record(sample),
                Err(e) => {
                    session.errors += 1;
                    warn!(target_name = %self.target, error = %e, "Sample skipped");
                }
            }
        };

        session.finalize(termination)
    }
}

/// Resolves at the deadline, or never without one
async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Mutable state of one running session, owned by the loop alone
struct Session {
    target: String,
    started_at: DateTime<Utc>,
    history: MetricsHistory,
    store: Option<SnapshotStore>,
    presenter: Arc<dyn SamplePresenter>,
    logger: StructuredLogger,
    flush_every: usize,
    flushes: usize,
    errors: usize,
    snapshot_path: Option<PathBuf>,
    finished: bool,
}

impl Session {
    fn new(
        target: String,
        store: Option<SnapshotStore>,
        presenter: Arc<dyn SamplePresenter>,
        logger: StructuredLogger,
        flush_every: usize,
    ) -> Self {
        Self {
            target,
            started_at: Utc::now(),
            history: MetricsHistory::new(),
            store,
            presenter,
            logger,
            flush_every: flush_every.max(1),
            flushes: 0,
            errors: 0,
            snapshot_path: None,
            finished: false,
        }
    }

    fn record(&mut self, sample: MetricSample) {
        self.history.push(sample);
        let count = self.history.len();

        if let Some(last) = self.history.last() {
            self.presenter.present(count, last);
        }

        if count % self.flush_every == 0 {
            self.flush(false);
        }
    }

    fn flush(&mut self, terminal: bool) {
        let Some(store) = &self.store else {
            return;
        };

        let path = match self.snapshot_path.take() {
            Some(path) => path,
            None => match store.claim_snapshot(self.started_at) {
                Ok(path) => path,
                Err(e) => {
                    warn!(error = %e, terminal = terminal, "Snapshot flush failed");
                    return;
                }
            },
        };

        match store.write_snapshot(&path, &self.target, self.started_at, &self.history) {
            Ok(()) => {
                self.logger
                    .log_snapshot_flushed(&path, self.history.len(), terminal);
                self.flushes += 1;
            }
            Err(e) => warn!(error = %e, terminal = terminal, "Snapshot flush failed"),
        }
        self.snapshot_path = Some(path);
    }

    fn write_summary(&self, summary: &SessionSummary) -> Option<PathBuf> {
        let store = self.store.as_ref()?;
        match store.write_summary(summary) {
            Ok(path) => Some(path),
            Err(e) => {
                warn!(error = %e, "Summary write failed");
                None
            }
        }
    }

    /// Terminal flush plus summary. Runs at most once.
    fn finalize(&mut self, termination: Termination) -> SessionReport {
        self.finished = true;
        self.flush(true);

        let summary = self
            .history
            .summarize(&self.target, self.started_at, termination);
        let summary_path = self.write_summary(&summary);

        self.presenter.present_summary(&summary);
        self.logger.log_session_finished(&summary, self.errors);

        let report = SessionReport {
            samples: self.history.len(),
            flushes: self.flushes,
            errors: self.errors,
            snapshot_path: self.snapshot_path.clone().filter(|_| self.flushes > 0),
            summary_path,
            summary,
        };

        // The files are the durable record from here on
        drop(std::mem::take(&mut self.history));
        report
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.finished {
            debug!(target_name = %self.target, "Session dropped before completion");
            self.finalize(Termination::Cancelled);
        }
    }
}

/// Builder for creating a metrics sampler
pub struct MetricsSamplerBuilder {
    collector: Option<Arc<dyn MetricsCollector>>,
    presenter: Arc<dyn SamplePresenter>,
    store: Option<SnapshotStore>,
    target: Option<String>,
    config: SamplerConfig,
}

impl MetricsSamplerBuilder {
    pub fn new() -> Self {
        Self {
            collector: None,
            presenter: Arc::new(LogPresenter),
            store: None,
            target: None,
            config: SamplerConfig::default(),
        }
    }

    pub fn collector(mut self, collector: Arc<dyn MetricsCollector>) -> Self {
        self.collector = Some(collector);
        self
    }

    /// Container or service to sample
    pub fn target(mut self, target: impl Into<String>) -> Self {
        self.target = Some(target.into());
        self
    }

    pub fn presenter(mut self, presenter: Arc<dyn SamplePresenter>) -> Self {
        self.presenter = presenter;
        self
    }

    /// Enable persistence into `store`
    pub fn store(mut self, store: SnapshotStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    /// Total session length; zero means run until shutdown
    pub fn duration(mut self, duration: Option<Duration>) -> Self {
        self.config.duration = duration.filter(|d| !d.is_zero());
        self
    }

    pub fn flush_every(mut self, samples: usize) -> Self {
        self.config.flush_every = samples;
        self
    }

    pub fn config(mut self, config: SamplerConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<MetricsSampler> {
        let collector = self
            .collector
            .ok_or_else(|| anyhow::anyhow!("Collector is required"))?;
        let target = self
            .target
            .ok_or_else(|| anyhow::anyhow!("Target is required"))?;

        if self.config.interval.is_zero() {
            anyhow::bail!("Sampling interval must be greater than zero");
        }

        Ok(MetricsSampler {
            collector,
            presenter: self.presenter,
            store: self.store,
            logger: StructuredLogger::new(target.clone()),
            target,
            config: self.config,
        })
    }
}

impl Default for MetricsSamplerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
