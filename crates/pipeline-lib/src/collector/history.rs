//! Session history and its on-disk snapshots

use crate::models::{MetricSample, SessionSummary, Termination};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Append-only, time-ordered record of one monitoring session
#[derive(Debug, Default)]
pub struct MetricsHistory {
    samples: Vec<MetricSample>,
}

impl MetricsHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a sample.
    ///
    /// Timestamps are kept strictly increasing: a sample stamped at or
    /// before its predecessor is moved to one millisecond after it.
    pub fn push(&mut self, mut sample: MetricSample) {
        if let Some(last) = self.samples.last() {
            if sample.timestamp <= last.timestamp {
                sample.timestamp = last.timestamp + ChronoDuration::milliseconds(1);
            }
        }
        self.samples.push(sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn last(&self) -> Option<&MetricSample> {
        self.samples.last()
    }

    pub fn samples(&self) -> &[MetricSample] {
        &self.samples
    }

    pub fn into_samples(self) -> Vec<MetricSample> {
        self.samples
    }

    /// Aggregate statistics over everything recorded so far
    pub fn summarize(
        &self,
        target: &str,
        started_at: DateTime<Utc>,
        termination: Termination,
    ) -> SessionSummary {
        let count = self.samples.len();
        let (avg_cpu, max_cpu, avg_mem, max_mem) = if count == 0 {
            (0.0, 0.0, 0.0, 0.0)
        } else {
            let n = count as f64;
            let cpu = self.samples.iter().map(|s| s.cpu_percent);
            let mem = self.samples.iter().map(|s| s.memory_percent);
            (
                cpu.clone().sum::<f64>() / n,
                cpu.fold(f64::MIN, f64::max),
                mem.clone().sum::<f64>() / n,
                mem.fold(f64::MIN, f64::max),
            )
        };

        SessionSummary {
            target: target.to_string(),
            started_at,
            ended_at: Utc::now(),
            samples: count,
            avg_cpu_percent: avg_cpu,
            max_cpu_percent: max_cpu,
            avg_memory_percent: avg_mem,
            max_memory_percent: max_mem,
            termination,
        }
    }
}

#[derive(Serialize)]
struct Snapshot<'a> {
    target: &'a str,
    session_started: DateTime<Utc>,
    flushed_at: DateTime<Utc>,
    samples: &'a [MetricSample],
}

/// Writes history snapshots and session summaries into one directory
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// First-choice snapshot file for a session, named after its start date
    pub fn snapshot_path(&self, session_started: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("metrics_{}.json", session_started.format("%Y%m%d")))
    }

    pub fn summary_path(&self, ended_at: DateTime<Utc>) -> PathBuf {
        self.dir
            .join(format!("summary_{}.json", ended_at.format("%Y%m%d_%H%M%S")))
    }

    /// Reserve a snapshot file no other session is using.
    ///
    /// A session claims once and rewrites the same file on every flush.
    pub fn claim_snapshot(&self, session_started: DateTime<Utc>) -> Result<PathBuf> {
        claim_unique(&self.snapshot_path(session_started))
    }

    /// Replace the snapshot at `path` with the full history
    pub fn write_snapshot(
        &self,
        path: &Path,
        target: &str,
        session_started: DateTime<Utc>,
        history: &MetricsHistory,
    ) -> Result<()> {
        let snapshot = Snapshot {
            target,
            session_started,
            flushed_at: Utc::now(),
            samples: history.samples(),
        };
        let json = serde_json::to_vec_pretty(&snapshot).context("Failed to serialize snapshot")?;
        write_atomic(path, &json)?;

        debug!(path = %path.display(), samples = history.len(), "Snapshot written");
        Ok(())
    }

    /// Write the summary under a name no earlier summary holds
    pub fn write_summary(&self, summary: &SessionSummary) -> Result<PathBuf> {
        let path = claim_unique(&self.summary_path(summary.ended_at))?;
        let json = serde_json::to_vec_pretty(summary).context("Failed to serialize summary")?;
        write_atomic(&path, &json)?;
        Ok(path)
    }
}

/// Create `preferred`, or `<stem>_1.json`, `<stem>_2.json`... if taken
fn claim_unique(preferred: &Path) -> Result<PathBuf> {
    let dir = preferred.parent().unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create directory {:?}", dir))?;

    let stem = preferred
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();

    for n in 0u32.. {
        let candidate = match n {
            0 => preferred.to_path_buf(),
            n => dir.join(format!("{}_{}.json", stem, n)),
        };
        match OpenOptions::new().write(true).create_new(true).open(&candidate) {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to create {:?}", candidate));
            }
        }
    }
    anyhow::bail!("No free file name for {:?}", preferred)
}

/// Write through a temp file and rename so readers never see a partial file
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {:?}", parent))?;
    }

    let temp_path = path.with_extension("tmp");
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&temp_path)
        .with_context(|| format!("Failed to create temp file {:?}", temp_path))?;

    file.write_all(bytes)
        .with_context(|| format!("Failed to write {:?}", temp_path))?;
    file.sync_all()
        .with_context(|| format!("Failed to sync {:?}", temp_path))?;

    std::fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to rename {:?} to {:?}", temp_path, path))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::health::HealthSignal;
    use crate::models::ContainerState;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn sample(at: DateTime<Utc>, cpu: f64, mem: f64) -> MetricSample {
        MetricSample {
            timestamp: at,
            cpu_percent: cpu,
            memory_used_mb: 100.0,
            memory_limit_mb: 1000.0,
            memory_percent: mem,
            network_in_bytes: 0,
            network_out_bytes: 0,
            block_read_bytes: 0,
            block_write_bytes: 0,
            process_count: 1,
            container_status: ContainerState::Running,
            container_health: HealthSignal::Healthy,
            application_health_status: HealthSignal::Absent,
            application_request_count: None,
        }
    }

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 0).unwrap()
    }

    #[test]
    fn test_push_keeps_timestamps_increasing() {
        let mut history = MetricsHistory::new();
        history.push(sample(start(), 1.0, 1.0));
        history.push(sample(start(), 2.0, 2.0));
        history.push(sample(start() - ChronoDuration::seconds(5), 3.0, 3.0));

        let stamps: Vec<_> = history.samples().iter().map(|s| s.timestamp).collect();
        assert!(stamps.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(history.len(), 3);
    }

    #[test]
    fn test_summarize() {
        let mut history = MetricsHistory::new();
        history.push(sample(start(), 10.0, 20.0));
        history.push(sample(start() + ChronoDuration::seconds(5), 30.0, 40.0));

        let summary = history.summarize("web", start(), Termination::Completed);
        assert_eq!(summary.samples, 2);
        assert_eq!(summary.avg_cpu_percent, 20.0);
        assert_eq!(summary.max_cpu_percent, 30.0);
        assert_eq!(summary.avg_memory_percent, 30.0);
        assert_eq!(summary.max_memory_percent, 40.0);
    }

    #[test]
    fn test_summarize_empty_history() {
        let summary = MetricsHistory::new().summarize("web", start(), Termination::Cancelled);
        assert_eq!(summary.samples, 0);
        assert_eq!(summary.max_cpu_percent, 0.0);
        assert_eq!(summary.termination, Termination::Cancelled);
    }

    #[test]
    fn test_file_names() {
        let store = SnapshotStore::new("/tmp/metrics");
        assert_eq!(
            store.snapshot_path(start()),
            PathBuf::from("/tmp/metrics/metrics_20240309.json")
        );
        assert_eq!(
            store.summary_path(start()),
            PathBuf::from("/tmp/metrics/summary_20240309_140500.json")
        );
    }

    #[test]
    fn test_snapshot_contains_full_history() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path().join("nested"));

        let path = store.claim_snapshot(start()).unwrap();
        let mut history = MetricsHistory::new();
        history.push(sample(start(), 1.0, 1.0));
        store.write_snapshot(&path, "web", start(), &history).unwrap();

        history.push(sample(start() + ChronoDuration::seconds(5), 2.0, 2.0));
        store.write_snapshot(&path, "web", start(), &history).unwrap();

        let written: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written["target"], "web");
        assert_eq!(written["samples"].as_array().unwrap().len(), 2);
        assert!(!path.with_extension("tmp").exists());
    }

    #[test]
    fn test_write_summary() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());
        let summary = MetricsHistory::new().summarize("web", start(), Termination::Completed);

        let path = store.write_summary(&summary).unwrap();
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("summary_"));

        let written: SessionSummary =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(written.termination, Termination::Completed);
    }

    #[test]
    fn test_same_day_sessions_get_separate_files() {
        let dir = TempDir::new().unwrap();
        let store = SnapshotStore::new(dir.path());

        let first = store.claim_snapshot(start()).unwrap();
        let second = store.claim_snapshot(start() + ChronoDuration::hours(3)).unwrap();
        assert_eq!(first, dir.path().join("metrics_20240309.json"));
        assert_eq!(second, dir.path().join("metrics_20240309_1.json"));

        let mut history = MetricsHistory::new();
        history.push(sample(start(), 1.0, 1.0));
        store.write_snapshot(&first, "web", start(), &history).unwrap();
        history.push(sample(start() + ChronoDuration::seconds(5), 2.0, 2.0));
        store.write_snapshot(&second, "db", start(), &history).unwrap();

        let read = |path: &Path| -> serde_json::Value {
            serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
        };
        assert_eq!(read(&first)["target"], "web");
        assert_eq!(read(&first)["samples"].as_array().unwrap().len(), 1);
        assert_eq!(read(&second)["target"], "db");

        // Summaries ending in the same second do not overwrite each other
        let mut summary = MetricsHistory::new().summarize("web", start(), Termination::Completed);
        summary.ended_at = start();
        let a = store.write_summary(&summary).unwrap();
        let b = store.write_summary(&summary).unwrap();
        assert_ne!(a, b);
        assert!(a.exists() && b.exists());
    }
}
