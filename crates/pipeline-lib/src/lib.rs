//! Container delivery pipeline library
//!
//! This crate provides the core functionality for:
//! - Running external tools with timeouts and probing HTTP endpoints
//! - Waiting for a deployment to become healthy within a time budget
//! - Sampling container and application metrics with periodic snapshots
//! - Driving the container engine and reading source control metadata
//! - HTTP acceptance checks, load generation and stage orchestration

pub mod collector;
pub mod engine;
pub mod error;
pub mod health;
pub mod models;
pub mod observability;
pub mod pipeline;
pub mod probe;
pub mod runner;
pub mod suite;
pub mod vcs;

pub use error::{PipelineError, PipelineResult};
pub use health::{HealthPoller, HealthSignal, HealthSource, HealthState, PollOutcome};
pub use models::*;
pub use observability::StructuredLogger;
