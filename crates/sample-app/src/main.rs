//! Sample application server
//!
//! Listens on `PORT` and serves until interrupted.

use anyhow::{Context, Result};
use sample_app::{serve_listener, AppConfig, AppState};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    let config = AppConfig::load()?;
    info!(
        port = config.port,
        environment = %config.app_env,
        branch = %config.branch_name,
        "Starting application"
    );

    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    let state = Arc::new(AppState::new(config).context("Failed to register metrics")?);

    serve_listener(listener, state, async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for shutdown signal");
        }
        info!("Shutting down");
    })
    .await
}
