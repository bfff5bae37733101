//! Deployment lifecycle commands: deploy, stop, status

use anyhow::{Context as _, Result};
use colored::Colorize;
use serde::Serialize;
use std::path::Path;
use tabled::Tabled;

use super::Context;
use crate::output::{color_status, format_millis, print_info, print_json, print_success, print_table, OutputFormat};
use pipeline_lib::health::{ContainerHealthSource, HealthSignal, HealthSource, HttpHealthSource};
use pipeline_lib::pipeline::HealthCheck;
use pipeline_lib::StructuredLogger;

/// Row for the status table
#[derive(Debug, Tabled, Serialize)]
struct StatusRow {
    #[tabled(rename = "Service")]
    service: String,
    #[tabled(rename = "Container")]
    container: String,
    #[tabled(rename = "State")]
    state: String,
    #[tabled(rename = "Health")]
    health: String,
}

#[derive(Serialize)]
struct DeployResult<'a> {
    container: &'a str,
    healthy_after_ms: u64,
}

/// Start the application and wait for it to become healthy
pub async fn deploy(
    ctx: &Context,
    env: Vec<(String, String)>,
    compose: Option<&Path>,
    service: &str,
) -> Result<()> {
    let (container, elapsed) = match compose {
        None => {
            let mut config = ctx.pipeline_config();
            config.env = env;
            let pipeline = ctx.pipeline(config)?;
            let elapsed = pipeline.deploy(None).await?;
            (ctx.settings.container.clone(), elapsed)
        }
        Some(file) => deploy_composition(ctx, file, service).await?,
    };

    let healthy_after_ms = elapsed.as_millis() as u64;
    match ctx.format {
        OutputFormat::Json => print_json(&DeployResult {
            container: &container,
            healthy_after_ms,
        }),
        OutputFormat::Table => print_success(&format!(
            "{} is healthy after {}",
            container.bold(),
            format_millis(healthy_after_ms)
        )),
    }

    Ok(())
}

async fn deploy_composition(
    ctx: &Context,
    file: &Path,
    service: &str,
) -> Result<(String, std::time::Duration)> {
    let engine = ctx.engine();
    let file = file.to_string_lossy();

    engine.compose_up(&file, true).await?;
    let container = engine
        .compose_container(&file, service)
        .await
        .with_context(|| format!("Service {} did not start", service))?;

    let source: Box<dyn HealthSource> = match ctx.settings.health_check {
        HealthCheck::Container => Box::new(ContainerHealthSource::new(engine, container.clone())),
        HealthCheck::Http => Box::new(HttpHealthSource::new(ctx.probe()?)),
    };

    let poller = ctx.poller();
    let outcome = poller.wait(source.as_ref()).await;
    StructuredLogger::new(service).log_health_poll(
        &source.describe(),
        outcome.state,
        outcome.elapsed,
        outcome.queries,
    );

    let elapsed = outcome.into_result(service, poller.timeout())?;
    Ok((service.to_string(), elapsed))
}

/// Stop the application
pub async fn stop(ctx: &Context, compose: Option<&Path>, remove: bool) -> Result<()> {
    let engine = ctx.engine();

    match compose {
        Some(file) => {
            engine.compose_down(&file.to_string_lossy()).await?;
            print_success("Composition stopped");
        }
        None => {
            let container = &ctx.settings.container;
            engine.stop(container).await?;
            if remove {
                engine.remove(container).await?;
                print_success(&format!("Container {} stopped and removed", container));
            } else {
                print_success(&format!("Container {} stopped", container));
            }
        }
    }

    Ok(())
}

/// Show container state and application health
pub async fn status(ctx: &Context, compose: Option<&Path>) -> Result<()> {
    let engine = ctx.engine();

    let rows = match compose {
        Some(file) => engine
            .compose_ps(&file.to_string_lossy())
            .await?
            .into_iter()
            .map(|svc| StatusRow {
                state: svc.container_state().as_str().to_string(),
                health: svc.health_signal().as_str().to_string(),
                service: svc.service,
                container: svc.name,
            })
            .collect(),
        None => {
            let container = ctx.settings.container.clone();
            let (state, health) = engine.state(&container).await?;
            vec![StatusRow {
                service: "-".to_string(),
                container,
                state: state.as_str().to_string(),
                health: health.as_str().to_string(),
            }]
        }
    };

    let app_health = match HttpHealthSource::new(ctx.probe()?).query().await {
        Ok(signal) => signal,
        Err(_) => HealthSignal::Absent,
    };

    match ctx.format {
        OutputFormat::Json => print_json(&serde_json::json!({
            "containers": rows,
            "application_health": app_health,
        })),
        OutputFormat::Table => {
            let colored_rows: Vec<StatusRow> = rows
                .into_iter()
                .map(|row| StatusRow {
                    state: color_status(&row.state),
                    health: color_status(&row.health),
                    ..row
                })
                .collect();
            print_table(&colored_rows, OutputFormat::Table);
            print_info(&format!(
                "Application at {}: {}",
                ctx.settings.base_url,
                color_status(app_health.as_str())
            ));
        }
    }

    Ok(())
}
