//! Fork-join load generator
//!
//! Each worker issues its requests sequentially and returns its own
//! outcomes; results are merged only after every worker has finished.

use crate::probe::HttpProbe;
use serde::Serialize;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, warn};

/// One request issued by a worker
#[derive(Debug, Clone, Serialize)]
pub struct RequestOutcome {
    pub worker: usize,
    /// HTTP status, absent on transport failure
    pub status: Option<u16>,
    pub latency_ms: f64,
    pub success: bool,
}

/// Aggregated result of a load run
#[derive(Debug, Clone, Default, Serialize)]
pub struct LoadReport {
    pub path: String,
    pub workers: usize,
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    pub min_latency_ms: f64,
    pub avg_latency_ms: f64,
    pub max_latency_ms: f64,
    pub requests_per_sec: f64,
    pub elapsed_ms: u64,
}

impl LoadReport {
    fn from_outcomes(path: &str, workers: usize, outcomes: &[RequestOutcome], elapsed: Duration) -> Self {
        let total = outcomes.len();
        let succeeded = outcomes.iter().filter(|o| o.success).count();

        let latencies = outcomes.iter().map(|o| o.latency_ms);
        let (min, max, sum) = latencies.fold((f64::MAX, 0.0f64, 0.0), |(min, max, sum), l| {
            (min.min(l), max.max(l), sum + l)
        });

        let secs = elapsed.as_secs_f64();
        Self {
            path: path.to_string(),
            workers,
            total,
            succeeded,
            failed: total - succeeded,
            min_latency_ms: if total == 0 { 0.0 } else { min },
            avg_latency_ms: if total == 0 { 0.0 } else { sum / total as f64 },
            max_latency_ms: max,
            requests_per_sec: if secs > 0.0 { total as f64 / secs } else { 0.0 },
            elapsed_ms: elapsed.as_millis() as u64,
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failed == 0
    }
}

/// N workers each issuing M sequential GETs against one path
#[derive(Debug, Clone)]
pub struct LoadTest {
    pub workers: usize,
    pub requests_per_worker: usize,
    pub path: String,
}

impl Default for LoadTest {
    fn default() -> Self {
        Self {
            workers: 10,
            requests_per_worker: 10,
            path: "/api/test".to_string(),
        }
    }
}

impl LoadTest {
    pub fn new(workers: usize, requests_per_worker: usize, path: impl Into<String>) -> Self {
        Self {
            workers,
            requests_per_worker,
            path: path.into(),
        }
    }

    pub async fn run(&self, probe: &HttpProbe) -> LoadReport {
        let start = Instant::now();
        let mut set = JoinSet::new();

        for worker in 0..self.workers {
            let probe = probe.clone();
            let path = self.path.clone();
            let requests = self.requests_per_worker;
            set.spawn(async move { run_worker(worker, probe, path, requests).await });
        }

        let mut outcomes = Vec::with_capacity(self.workers * self.requests_per_worker);
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(mut results) => outcomes.append(&mut results),
                Err(e) => {
                    // The worker's results are lost; count its quota as failed
                    warn!(error = %e, "Load worker aborted");
                    outcomes.extend((0..self.requests_per_worker).map(|_| RequestOutcome {
                        worker: usize::MAX,
                        status: None,
                        latency_ms: 0.0,
                        success: false,
                    }));
                }
            }
        }

        let report = LoadReport::from_outcomes(&self.path, self.workers, &outcomes, start.elapsed());
        debug!(
            path = %report.path,
            total = report.total,
            failed = report.failed,
            rps = report.requests_per_sec,
            "Load run complete"
        );
        report
    }
}

async fn run_worker(worker: usize, probe: HttpProbe, path: String, requests: usize) -> Vec<RequestOutcome> {
    let mut results = Vec::with_capacity(requests);

    for _ in 0..requests {
        let start = Instant::now();
        let outcome = match probe.get(&path).await {
            Ok(response) => RequestOutcome {
                worker,
                status: Some(response.status),
                latency_ms: response.elapsed.as_secs_f64() * 1000.0,
                success: response.is_success(),
            },
            Err(e) => {
                debug!(worker = worker, error = %e, "Load request failed");
                RequestOutcome {
                    worker,
                    status: None,
                    latency_ms: start.elapsed().as_secs_f64() * 1000.0,
                    success: false,
                }
            }
        };
        results.push(outcome);
    }

    results
}
