//! Deployment health tracking
//!
//! Provides the health signal and state types, the sources that read the
//! signal from a deployed target, and the poller that waits for a terminal
//! state within a bounded time budget.

mod poller;
mod sources;

pub use poller::{HealthPoller, PollOutcome};
pub use sources::{ContainerHealthSource, HttpHealthSource};

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Health status as reported by the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthSignal {
    Healthy,
    Unhealthy,
    Starting,
    /// Nothing reported, or the report could not be read
    #[serde(rename = "none")]
    Absent,
}

impl HealthSignal {
    /// Parse the literal status string reported by the engine or the app
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "healthy" => HealthSignal::Healthy,
            "unhealthy" => HealthSignal::Unhealthy,
            "starting" => HealthSignal::Starting,
            _ => HealthSignal::Absent,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthSignal::Healthy => "healthy",
            HealthSignal::Unhealthy => "unhealthy",
            HealthSignal::Starting => "starting",
            HealthSignal::Absent => "none",
        }
    }
}

/// State of one poll sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthState {
    Unknown,
    Starting,
    Healthy,
    Unhealthy,
    TimedOut,
}

impl HealthState {
    /// Whether no further transition can occur
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HealthState::Healthy | HealthState::Unhealthy | HealthState::TimedOut
        )
    }

    /// Apply one observed signal
    pub fn observe(self, signal: HealthSignal) -> HealthState {
        if self.is_terminal() {
            return self;
        }

        match signal {
            HealthSignal::Healthy => HealthState::Healthy,
            HealthSignal::Unhealthy => HealthState::Unhealthy,
            HealthSignal::Starting => HealthState::Starting,
            HealthSignal::Absent => self,
        }
    }

    /// Apply the deadline
    pub fn expire(self) -> HealthState {
        if self.is_terminal() {
            self
        } else {
            HealthState::TimedOut
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Unknown => "unknown",
            HealthState::Starting => "starting",
            HealthState::Healthy => "healthy",
            HealthState::Unhealthy => "unhealthy",
            HealthState::TimedOut => "timed_out",
        }
    }
}

/// Something that can report the health signal of a target
#[async_trait]
pub trait HealthSource: Send + Sync {
    /// Query the current signal. Errors are treated as "not ready yet".
    async fn query(&self) -> Result<HealthSignal>;

    /// Human-readable target for logs and errors
    fn describe(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_parse() {
        assert_eq!(HealthSignal::parse("healthy\n"), HealthSignal::Healthy);
        assert_eq!(HealthSignal::parse("UNHEALTHY"), HealthSignal::Unhealthy);
        assert_eq!(HealthSignal::parse("Starting"), HealthSignal::Starting);
        assert_eq!(HealthSignal::parse(""), HealthSignal::Absent);
        assert_eq!(HealthSignal::parse("<no value>"), HealthSignal::Absent);
    }

    #[test]
    fn test_unknown_transitions() {
        let state = HealthState::Unknown;
        assert_eq!(state.observe(HealthSignal::Absent), HealthState::Unknown);
        assert_eq!(state.observe(HealthSignal::Starting), HealthState::Starting);
        assert_eq!(state.observe(HealthSignal::Healthy), HealthState::Healthy);
        assert_eq!(state.observe(HealthSignal::Unhealthy), HealthState::Unhealthy);
        assert_eq!(state.expire(), HealthState::TimedOut);
    }

    #[test]
    fn test_starting_never_returns_to_unknown() {
        let state = HealthState::Starting;
        assert_eq!(state.observe(HealthSignal::Absent), HealthState::Starting);
        assert_eq!(state.observe(HealthSignal::Starting), HealthState::Starting);
    }

    #[test]
    fn test_terminal_states_are_sticky() {
        for terminal in [HealthState::Healthy, HealthState::Unhealthy, HealthState::TimedOut] {
            assert!(terminal.is_terminal());
            assert_eq!(terminal.observe(HealthSignal::Starting), terminal);
            assert_eq!(terminal.observe(HealthSignal::Healthy), terminal);
            assert_eq!(terminal.expire(), terminal);
        }
    }

    #[test]
    fn test_signal_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&HealthSignal::Absent).unwrap(),
            "\"none\""
        );
        assert_eq!(
            serde_json::to_string(&HealthSignal::Healthy).unwrap(),
            "\"healthy\""
        );
    }
}
