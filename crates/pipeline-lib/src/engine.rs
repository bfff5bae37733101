//! Container engine adapter
//!
//! Wraps the engine CLI (`docker` by default) behind typed operations.
//! Engine output is parsed into closed types here and nowhere else.

use crate::error::{PipelineError, PipelineResult};
use crate::health::HealthSignal;
use crate::models::ContainerState;
use crate::runner::{render_command, CommandOutput, CommandRunner};
use serde::Deserialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const HEALTH_FORMAT: &str = "{{if .State.Health}}{{.State.Health.Status}}{{end}}";
const STATE_FORMAT: &str = "{{.State.Status}}|{{if .State.Health}}{{.State.Health.Status}}{{end}}";

/// Parameters for an image build
#[derive(Debug, Clone)]
pub struct BuildRequest {
    /// Fully qualified tags (`image:tag`)
    pub tags: Vec<String>,
    pub dockerfile: PathBuf,
    pub context: PathBuf,
    pub build_args: Vec<(String, String)>,
    pub no_cache: bool,
}

/// Parameters for starting a single container
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub container: String,
    pub image: String,
    pub host_port: u16,
    pub container_port: u16,
    pub env: Vec<(String, String)>,
}

/// Raw `stats --format '{{json .}}'` record
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawStats {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "CPUPerc", default)]
    pub cpu_perc: String,
    #[serde(rename = "MemUsage", default)]
    pub mem_usage: String,
    #[serde(rename = "NetIO", default)]
    pub net_io: String,
    #[serde(rename = "BlockIO", default)]
    pub block_io: String,
    #[serde(rename = "PIDs", default)]
    pub pids: String,
}

/// One service row of `compose ps`
#[derive(Debug, Clone, Deserialize)]
pub struct ComposeService {
    #[serde(rename = "Name", default)]
    pub name: String,
    #[serde(rename = "Service", default)]
    pub service: String,
    #[serde(rename = "State", default)]
    pub state: String,
    #[serde(rename = "Health", default)]
    pub health: String,
}

impl ComposeService {
    pub fn container_state(&self) -> ContainerState {
        ContainerState::parse(&self.state)
    }

    pub fn health_signal(&self) -> HealthSignal {
        HealthSignal::parse(&self.health)
    }
}

/// Typed front end to the container engine CLI
#[derive(Clone)]
pub struct ContainerEngine {
    runner: Arc<dyn CommandRunner>,
    program: String,
}

impl ContainerEngine {
    pub fn new(runner: Arc<dyn CommandRunner>, program: impl Into<String>) -> Self {
        Self {
            runner,
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    async fn exec(&self, args: &[&str]) -> PipelineResult<CommandOutput> {
        let output = self.runner.run(&self.program, args).await?;
        output.into_success(&render_command(&self.program, args))
    }

    /// Check that the engine binary exists and its daemon answers
    pub async fn ensure_available(&self) -> PipelineResult<String> {
        let output = self
            .exec(&["version", "--format", "{{.Server.Version}}"])
            .await?;
        let version = output.stdout.trim().to_string();
        debug!(engine = %self.program, version = %version, "Container engine available");
        Ok(version)
    }

    /// Build an image, returning the build duration
    pub async fn build(&self, request: &BuildRequest) -> PipelineResult<Duration> {
        let dockerfile = request.dockerfile.to_string_lossy().into_owned();
        let context = request.context.to_string_lossy().into_owned();
        let build_args: Vec<String> = request
            .build_args
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut args: Vec<&str> = vec!["build", "-f", dockerfile.as_str()];
        for tag in &request.tags {
            args.push("-t");
            args.push(tag);
        }
        for arg in &build_args {
            args.push("--build-arg");
            args.push(arg);
        }
        if request.no_cache {
            args.push("--no-cache");
        }
        args.push(&context);

        info!(tags = ?request.tags, "Building image");
        let output = self.exec(&args).await?;
        Ok(output.elapsed)
    }

    /// Start a container, replacing any stale one with the same name.
    /// Returns the container ID.
    pub async fn run(&self, request: &RunRequest) -> PipelineResult<String> {
        if let Err(e) = self.remove(&request.container).await {
            debug!(container = %request.container, error = %e, "No stale container removed");
        }

        let port = format!("{}:{}", request.host_port, request.container_port);
        let env: Vec<String> = request
            .env
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect();

        let mut args: Vec<&str> = vec![
            "run",
            "-d",
            "--name",
            request.container.as_str(),
            "-p",
            port.as_str(),
        ];
        for pair in &env {
            args.push("-e");
            args.push(pair);
        }
        args.push(&request.image);

        info!(container = %request.container, image = %request.image, port = %port, "Starting container");
        let output = self.exec(&args).await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn stop(&self, container: &str) -> PipelineResult<()> {
        self.exec(&["stop", container]).await?;
        Ok(())
    }

    /// Force-remove a container
    pub async fn remove(&self, container: &str) -> PipelineResult<()> {
        self.exec(&["rm", "-f", container]).await?;
        Ok(())
    }

    /// Engine-reported health check status
    pub async fn health_signal(&self, container: &str) -> PipelineResult<HealthSignal> {
        let output = self
            .exec(&["inspect", "--format", HEALTH_FORMAT, container])
            .await?;
        Ok(HealthSignal::parse(&output.stdout))
    }

    /// Lifecycle state and health status in one inspect call
    pub async fn state(&self, container: &str) -> PipelineResult<(ContainerState, HealthSignal)> {
        let output = self
            .exec(&["inspect", "--format", STATE_FORMAT, container])
            .await?;
        Ok(parse_state_line(&output.stdout))
    }

    /// One-shot resource usage snapshot
    pub async fn stats(&self, container: &str) -> PipelineResult<RawStats> {
        let output = self
            .exec(&["stats", "--no-stream", "--format", "{{json .}}", container])
            .await?;

        let line = output
            .stdout
            .lines()
            .find(|l| !l.trim().is_empty())
            .ok_or_else(|| PipelineError::Parse(format!("no stats returned for {}", container)))?;

        Ok(serde_json::from_str(line)?)
    }

    /// Start all services of a composition in the background
    pub async fn compose_up(&self, file: &str, build: bool) -> PipelineResult<()> {
        let mut args = vec!["compose", "-f", file, "up", "-d"];
        if build {
            args.push("--build");
        }
        info!(file = %file, "Starting composition");
        self.exec(&args).await?;
        Ok(())
    }

    pub async fn compose_down(&self, file: &str) -> PipelineResult<()> {
        info!(file = %file, "Stopping composition");
        self.exec(&["compose", "-f", file, "down"]).await?;
        Ok(())
    }

    /// Service rows of a composition
    pub async fn compose_ps(&self, file: &str) -> PipelineResult<Vec<ComposeService>> {
        let output = self
            .exec(&["compose", "-f", file, "ps", "--format", "json"])
            .await?;
        parse_compose_ps(&output.stdout)
    }

    /// Container ID backing one composition service
    pub async fn compose_container(&self, file: &str, service: &str) -> PipelineResult<String> {
        let output = self
            .exec(&["compose", "-f", file, "ps", "-q", service])
            .await?;

        output
            .stdout
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                PipelineError::Parse(format!("service {} has no running container", service))
            })
    }
}

/// Parse `<state>|<health>` produced by [`STATE_FORMAT`]
fn parse_state_line(stdout: &str) -> (ContainerState, HealthSignal) {
    let line = stdout.trim();
    let (state, health) = line.split_once('|').unwrap_or((line, ""));
    (ContainerState::parse(state), HealthSignal::parse(health))
}

/// `compose ps --format json` emits either one JSON array or one object per line
fn parse_compose_ps(stdout: &str) -> PipelineResult<Vec<ComposeService>> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Ok(Vec::new());
    }

    if trimmed.starts_with('[') {
        return Ok(serde_json::from_str(trimmed)?);
    }

    trimmed
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| serde_json::from_str(l).map_err(PipelineError::from))
        .collect()
}
