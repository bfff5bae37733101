//! Bounded health poll loop
//!
//! Queries a [`HealthSource`] on a fixed interval until the target reports
//! a terminal state or the time budget runs out. An explicit `unhealthy`
//! ends the loop immediately; errors and missing signals only mean "not
//! ready yet".

use super::{HealthSignal, HealthSource, HealthState};
use crate::error::{PipelineError, PipelineResult};
use std::time::Duration;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info, warn};

/// Result of one poll sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollOutcome {
    /// Terminal state reached
    pub state: HealthState,
    pub elapsed: Duration,
    /// Number of queries issued to the source
    pub queries: u32,
}

impl PollOutcome {
    pub fn is_healthy(&self) -> bool {
        self.state == HealthState::Healthy
    }

    /// Map a failed outcome onto the error taxonomy
    pub fn into_result(self, target: &str, timeout: Duration) -> PipelineResult<Duration> {
        match self.state {
            HealthState::Healthy => Ok(self.elapsed),
            HealthState::Unhealthy => Err(PipelineError::Unhealthy {
                target: target.to_string(),
                elapsed: self.elapsed,
            }),
            _ => Err(PipelineError::HealthTimedOut {
                target: target.to_string(),
                timeout,
            }),
        }
    }
}

/// Polls a health source until it reaches a terminal state
#[derive(Debug, Clone, Copy)]
pub struct HealthPoller {
    interval: Duration,
    timeout: Duration,
}

impl Default for HealthPoller {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(60),
        }
    }
}

impl HealthPoller {
    pub fn new(interval: Duration, timeout: Duration) -> Self {
        Self { interval, timeout }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Poll `source` until a terminal state is reached
    pub async fn wait(&self, source: &dyn HealthSource) -> PollOutcome {
        let target = source.describe();
        let start = Instant::now();
        let mut state = HealthState::Unknown;
        let mut queries = 0u32;

        info!(
            endpoint = %target,
            interval_secs = self.interval.as_secs_f64(),
            timeout_secs = self.timeout.as_secs_f64(),
            "Waiting for target to become healthy"
        );

        loop {
            if start.elapsed() >= self.timeout {
                state = state.expire();
                break;
            }

            queries += 1;
            let remaining = self.timeout.saturating_sub(start.elapsed());
            let signal = match timeout(remaining, source.query()).await {
                Ok(Ok(signal)) => signal,
                Ok(Err(e)) => {
                    debug!(endpoint = %target, error = %e, "Health query failed, retrying");
                    HealthSignal::Absent
                }
                Err(_) => {
                    debug!(endpoint = %target, "Health query still running at deadline");
                    HealthSignal::Absent
                }
            };

            let next = state.observe(signal);
            if next != state {
                debug!(
                    endpoint = %target,
                    from = state.as_str(),
                    to = next.as_str(),
                    "Health state changed"
                );
            }
            state = next;

            if state.is_terminal() {
                break;
            }

            let remaining = self.timeout.saturating_sub(start.elapsed());
            if remaining.is_zero() {
                continue;
            }
            sleep(self.interval.min(remaining)).await;
        }

        let outcome = PollOutcome {
            state,
            elapsed: start.elapsed(),
            queries,
        };

        match outcome.state {
            HealthState::Healthy => info!(
                endpoint = %target,
                elapsed_ms = outcome.elapsed.as_millis(),
                queries = queries,
                "Target is healthy"
            ),
            _ => warn!(
                endpoint = %target,
                state = outcome.state.as_str(),
                elapsed_ms = outcome.elapsed.as_millis(),
                queries = queries,
                "Target did not become healthy"
            ),
        }

        outcome
    }
}
