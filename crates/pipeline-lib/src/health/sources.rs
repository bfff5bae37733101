//! Health signal sources
//!
//! - `ContainerHealthSource` reads the engine's built-in health check
//! - `HttpHealthSource` reads the application's own `/health` endpoint

use super::{HealthSignal, HealthSource};
use crate::engine::ContainerEngine;
use crate::probe::HttpProbe;
use anyhow::Result;
use async_trait::async_trait;

/// Reads the health status reported by the container engine
pub struct ContainerHealthSource {
    engine: ContainerEngine,
    container: String,
}

impl ContainerHealthSource {
    pub fn new(engine: ContainerEngine, container: impl Into<String>) -> Self {
        Self {
            engine,
            container: container.into(),
        }
    }
}

#[async_trait]
impl HealthSource for ContainerHealthSource {
    async fn query(&self) -> Result<HealthSignal> {
        Ok(self.engine.health_signal(&self.container).await?)
    }

    fn describe(&self) -> String {
        format!("container {}", self.container)
    }
}

/// Reads the application's health endpoint
pub struct HttpHealthSource {
    probe: HttpProbe,
    path: String,
}

impl HttpHealthSource {
    pub fn new(probe: HttpProbe) -> Self {
        Self::with_path(probe, "/health")
    }

    pub fn with_path(probe: HttpProbe, path: impl Into<String>) -> Self {
        Self {
            probe,
            path: path.into(),
        }
    }
}

#[async_trait]
impl HealthSource for HttpHealthSource {
    async fn query(&self) -> Result<HealthSignal> {
        let response = self.probe.get(&self.path).await?;

        // The body's `status` field wins over the HTTP status code
        if let Some(status) = response.json_str("status") {
            let signal = HealthSignal::parse(status);
            if signal != HealthSignal::Absent {
                return Ok(signal);
            }
        }

        if response.is_success() {
            Ok(HealthSignal::Healthy)
        } else {
            Ok(HealthSignal::Absent)
        }
    }

    fn describe(&self) -> String {
        self.probe
            .url_for(&self.path)
            .map(|u| u.to_string())
            .unwrap_or_else(|_| self.path.clone())
    }
}
