//! CLI command implementations

pub mod build;
pub mod deploy;
pub mod monitor;
pub mod pipeline;
pub mod test;

use crate::config::Settings;
use crate::output::OutputFormat;
use anyhow::{Context as _, Result};
use pipeline_lib::engine::ContainerEngine;
use pipeline_lib::health::HealthPoller;
use pipeline_lib::pipeline::{Pipeline, PipelineConfig};
use pipeline_lib::probe::HttpProbe;
use pipeline_lib::runner::SystemRunner;
use pipeline_lib::vcs::SourceControl;
use std::sync::Arc;
use std::time::Duration;

/// Resolved settings plus output choice, shared by every command
pub struct Context {
    pub settings: Settings,
    pub format: OutputFormat,
}

impl Context {
    pub fn new(settings: Settings, format: OutputFormat) -> Self {
        Self { settings, format }
    }

    pub fn engine(&self) -> ContainerEngine {
        let runner = SystemRunner::new(Duration::from_secs(self.settings.command_timeout_secs));
        ContainerEngine::new(Arc::new(runner), self.settings.engine.clone())
    }

    pub fn source_control(&self) -> SourceControl {
        SourceControl::new(Arc::new(SystemRunner::default()))
    }

    pub fn probe(&self) -> Result<HttpProbe> {
        HttpProbe::new(&self.settings.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.settings.base_url))
    }

    pub fn poller(&self) -> HealthPoller {
        HealthPoller::new(
            Duration::from_secs(self.settings.health_interval_secs),
            Duration::from_secs(self.settings.health_timeout_secs),
        )
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            image: self.settings.image.clone(),
            container: self.settings.container.clone(),
            host_port: self.settings.host_port,
            container_port: self.settings.container_port,
            health_check: self.settings.health_check,
            poller: self.poller(),
            output_dir: self.settings.output_dir.clone(),
            ..PipelineConfig::default()
        }
    }

    pub fn pipeline(&self, config: PipelineConfig) -> Result<Pipeline> {
        Ok(Pipeline::new(
            self.engine(),
            self.source_control(),
            self.probe()?,
            config,
        ))
    }
}

/// Parse `KEY=VALUE` pairs from repeated `--env` flags
pub fn parse_env_pairs(pairs: &[String]) -> Result<Vec<(String, String)>> {
    pairs
        .iter()
        .map(|pair| match pair.split_once('=') {
            Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
            _ => anyhow::bail!("Expected KEY=VALUE, got {:?}", pair),
        })
        .collect()
}
