//! Container Delivery Pipeline CLI
//!
//! Builds, deploys, tests and monitors a containerized application
//! from the command line.

mod commands;
mod config;
mod output;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::{build, deploy, monitor, parse_env_pairs, pipeline, test, Context};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Container Delivery Pipeline CLI
#[derive(Parser)]
#[command(name = "cdp")]
#[command(author, version, about = "CLI for the Container Delivery Pipeline", long_about = None)]
pub struct Cli {
    /// Application base URL (can also be set via CDP_BASE_URL env var)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Container engine binary
    #[arg(long, global = true)]
    pub engine: Option<String>,

    /// Output format
    #[arg(long, short, global = true, default_value = "table")]
    pub format: output::OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build the application image
    Build {
        /// Dockerfile to build from
        #[arg(long, default_value = "Dockerfile")]
        dockerfile: PathBuf,

        /// Build context directory
        #[arg(long, default_value = ".")]
        context: PathBuf,

        /// Do not use the build cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Start the application and wait until it is healthy
    Deploy {
        /// Environment variable for the container (KEY=VALUE, repeatable)
        #[arg(long, short)]
        env: Vec<String>,

        /// Compose file to deploy instead of a single container
        #[arg(long)]
        compose: Option<PathBuf>,

        /// Compose service to wait on
        #[arg(long, default_value = "app")]
        service: String,
    },

    /// Run the HTTP test suite against the application
    Test {
        /// Where to write the JSON report
        #[arg(long, short)]
        report: Option<PathBuf>,
    },

    /// Send concurrent requests to one endpoint
    Load {
        /// Number of concurrent workers
        #[arg(long, default_value_t = 10)]
        workers: usize,

        /// Requests per worker
        #[arg(long, default_value_t = 10)]
        requests: usize,

        /// Path to request
        #[arg(long, default_value = "/api/test")]
        path: String,
    },

    /// Sample container metrics until stopped
    Monitor {
        /// Container to monitor (defaults to the configured container)
        container: Option<String>,

        /// Compose file whose service should be monitored
        #[arg(long)]
        compose: Option<PathBuf>,

        /// Compose service to monitor
        #[arg(long, default_value = "app")]
        service: String,

        /// Seconds between samples
        #[arg(long, short)]
        interval: Option<u64>,

        /// Stop after this many seconds
        #[arg(long, short)]
        duration: Option<u64>,

        /// Do not write snapshot and summary files
        #[arg(long)]
        no_persist: bool,

        /// Also query application health and request count
        #[arg(long)]
        with_app: bool,
    },

    /// Stop the application
    Stop {
        /// Compose file to bring down
        #[arg(long)]
        compose: Option<PathBuf>,

        /// Also remove the container
        #[arg(long)]
        remove: bool,
    },

    /// Show container state and application health
    Status {
        /// Compose file to inspect
        #[arg(long)]
        compose: Option<PathBuf>,
    },

    /// Build, deploy and test in one run
    Pipeline {
        /// Dockerfile to build from
        #[arg(long, default_value = "Dockerfile")]
        dockerfile: PathBuf,

        /// Build context directory
        #[arg(long, default_value = ".")]
        context: PathBuf,

        /// Environment variable for the container (KEY=VALUE, repeatable)
        #[arg(long, short)]
        env: Vec<String>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut settings = config::Settings::load()?;
    if let Some(base_url) = cli.base_url {
        settings.base_url = base_url;
    }
    if let Some(engine) = cli.engine {
        settings.engine = engine;
    }

    let mut ctx = Context::new(settings, cli.format);

    match cli.command {
        Commands::Build {
            dockerfile,
            context,
            no_cache,
        } => {
            build::build(&ctx, dockerfile, context, no_cache).await?;
        }
        Commands::Deploy {
            env,
            compose,
            service,
        } => {
            let env = parse_env_pairs(&env)?;
            deploy::deploy(&ctx, env, compose.as_deref(), &service).await?;
        }
        Commands::Test { report } => {
            test::test(&ctx, report).await?;
        }
        Commands::Load {
            workers,
            requests,
            path,
        } => {
            test::load(&ctx, workers, requests, path).await?;
        }
        Commands::Monitor {
            container,
            compose,
            service,
            interval,
            duration,
            no_persist,
            with_app,
        } => {
            if let Some(container) = container {
                ctx.settings.container = container;
            }
            let options = monitor::MonitorOptions {
                compose: compose.as_deref(),
                service: &service,
                interval,
                duration,
                persist: !no_persist,
                with_app,
            };
            monitor::monitor(&ctx, options).await?;
        }
        Commands::Stop { compose, remove } => {
            deploy::stop(&ctx, compose.as_deref(), remove).await?;
        }
        Commands::Status { compose } => {
            deploy::status(&ctx, compose.as_deref()).await?;
        }
        Commands::Pipeline {
            dockerfile,
            context,
            env,
        } => {
            let env = parse_env_pairs(&env)?;
            pipeline::pipeline(&ctx, dockerfile, context, env).await?;
        }
    }

    Ok(())
}
