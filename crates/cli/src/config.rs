//! Configuration management for the CLI
//!
//! Settings are layered, later sources winning: built-in defaults, the user
//! file `~/.config/cdp/config.toml`, `./cdp.toml`, then `CDP_*` environment
//! variables. Command-line flags are applied on top by the caller.

use anyhow::{Context, Result};
use pipeline_lib::pipeline::HealthCheck;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

const LOCAL_CONFIG_FILE: &str = "cdp.toml";

/// Resolved CLI settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Image name, without tag
    pub image: String,
    /// Container name for single-container mode
    pub container: String,
    /// Container engine binary
    pub engine: String,
    /// Where the application answers HTTP
    pub base_url: String,
    pub host_port: u16,
    pub container_port: u16,
    pub health_check: HealthCheck,
    pub health_interval_secs: u64,
    pub health_timeout_secs: u64,
    /// Per-command limit for engine calls, builds included
    pub command_timeout_secs: u64,
    pub monitor_interval_secs: u64,
    /// Directory for build info, reports and metrics snapshots
    pub output_dir: PathBuf,
    pub flush_every: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            image: "sample-app".to_string(),
            container: "sample-app".to_string(),
            engine: "docker".to_string(),
            base_url: "http://localhost:8000".to_string(),
            host_port: 8000,
            container_port: 8000,
            health_check: HealthCheck::Container,
            health_interval_secs: 5,
            health_timeout_secs: 60,
            command_timeout_secs: 600,
            monitor_interval_secs: 5,
            output_dir: PathBuf::from("."),
            flush_every: 10,
        }
    }
}

impl Settings {
    /// Load settings from every layer
    pub fn load() -> Result<Self> {
        Self::load_from(
            Self::user_config_path().as_deref(),
            Path::new(LOCAL_CONFIG_FILE),
            config::Environment::with_prefix("CDP"),
        )
    }

    fn load_from(user: Option<&Path>, local: &Path, env: config::Environment) -> Result<Self> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Settings::default())?);

        if let Some(user) = user {
            builder = builder.add_source(config::File::from(user).required(false));
        }

        let settings: Settings = builder
            .add_source(config::File::from(local).required(false))
            .add_source(env)
            .build()
            .context("Failed to read configuration")?
            .try_deserialize()
            .context("Invalid configuration")?;

        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        Url::parse(&self.base_url)
            .with_context(|| format!("Invalid base URL: {}", self.base_url))?;
        if self.health_interval_secs == 0 || self.monitor_interval_secs == 0 {
            anyhow::bail!("Intervals must be at least one second");
        }
        Ok(())
    }

    /// Get the user configuration file path
    fn user_config_path() -> Option<PathBuf> {
        let home = dirs_next::home_dir()?;
        Some(home.join(".config").join("cdp").join("config.toml"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::TempDir;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::with_prefix("CDP").source(Some(map))
    }

    #[test]
    fn test_defaults_without_files() {
        let dir = TempDir::new().unwrap();
        let settings =
            Settings::load_from(None, &dir.path().join("cdp.toml"), env(&[])).unwrap();

        assert_eq!(settings.engine, "docker");
        assert_eq!(settings.health_timeout_secs, 60);
        assert_eq!(settings.flush_every, 10);
        assert_eq!(settings.health_check, HealthCheck::Container);
    }

    #[test]
    fn test_layers_override_in_order() {
        let dir = TempDir::new().unwrap();
        let user = dir.path().join("user.toml");
        let local = dir.path().join("cdp.toml");

        std::fs::write(&user, "image = \"from-user\"\ncontainer = \"web\"\n").unwrap();
        std::fs::write(&local, "image = \"from-local\"\nhealth_check = \"http\"\n").unwrap();

        let settings =
            Settings::load_from(Some(&user), &local, env(&[("CDP_HOST_PORT", "9000")])).unwrap();

        assert_eq!(settings.image, "from-local");
        assert_eq!(settings.container, "web");
        assert_eq!(settings.health_check, HealthCheck::Http);
        assert_eq!(settings.host_port, 9000);
    }

    #[test]
    fn test_invalid_base_url_is_rejected() {
        let dir = TempDir::new().unwrap();
        let result = Settings::load_from(
            None,
            &dir.path().join("cdp.toml"),
            env(&[("CDP_BASE_URL", "not a url")]),
        );
        assert!(result.is_err());
    }
}
