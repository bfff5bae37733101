//! Application configuration

use anyhow::{Context, Result};
use serde::Deserialize;

/// Runtime settings, read from plain environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Listen port (`PORT`)
    #[serde(default = "default_port")]
    pub port: u16,

    /// Branch the image was built from (`BRANCH_NAME`)
    #[serde(default = "default_branch_name")]
    pub branch_name: String,

    /// Deployment environment (`APP_ENV`)
    #[serde(default = "default_app_env")]
    pub app_env: String,

    /// Container hostname, which the engine sets to the container ID
    #[serde(default = "default_hostname")]
    pub hostname: String,
}

fn default_port() -> u16 {
    8000
}

fn default_branch_name() -> String {
    "main".to_string()
}

fn default_app_env() -> String {
    "development".to_string()
}

fn default_hostname() -> String {
    "unknown".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            branch_name: default_branch_name(),
            app_env: default_app_env(),
            hostname: default_hostname(),
        }
    }
}

impl AppConfig {
    /// Load configuration from the process environment
    pub fn load() -> Result<Self> {
        Self::from_env(config::Environment::default())
    }

    fn from_env(env: config::Environment) -> Result<Self> {
        let config = config::Config::builder()
            .add_source(env)
            .build()
            .context("Failed to read environment")?;

        config
            .try_deserialize()
            .context("Invalid application configuration")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> config::Environment {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        config::Environment::default().source(Some(map))
    }

    #[test]
    fn test_defaults() {
        let config = AppConfig::from_env(env(&[])).unwrap();
        assert_eq!(config.port, 8000);
        assert_eq!(config.branch_name, "main");
        assert_eq!(config.app_env, "development");
        assert_eq!(config.hostname, "unknown");
    }

    #[test]
    fn test_environment_overrides() {
        let config = AppConfig::from_env(env(&[
            ("PORT", "9000"),
            ("BRANCH_NAME", "feature/login"),
            ("APP_ENV", "staging"),
            ("HOSTNAME", "f00dcafe"),
        ]))
        .unwrap();

        assert_eq!(config.port, 9000);
        assert_eq!(config.branch_name, "feature/login");
        assert_eq!(config.app_env, "staging");
        assert_eq!(config.hostname, "f00dcafe");
    }

    #[test]
    fn test_invalid_port_is_rejected() {
        assert!(AppConfig::from_env(env(&[("PORT", "eighty")])).is_err());
    }
}
