//! Full build, deploy and test run

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tabled::Tabled;

use super::Context;
use crate::output::{color_status, format_millis, print_error, print_json, print_success, print_table, OutputFormat};

/// Row for the stage table
#[derive(Tabled, serde::Serialize)]
struct StageRow {
    #[tabled(rename = "Stage")]
    stage: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Run every stage in order; the first failure stops the run
pub async fn pipeline(
    ctx: &Context,
    dockerfile: PathBuf,
    build_context: PathBuf,
    env: Vec<(String, String)>,
) -> Result<()> {
    let mut config = ctx.pipeline_config();
    config.dockerfile = dockerfile;
    config.context = build_context;
    config.env = env;

    let report = ctx.pipeline(config)?.run().await;

    match ctx.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            println!("{}", format!("Pipeline for {}", report.app).bold());
            let rows: Vec<StageRow> = report
                .stages
                .iter()
                .map(|s| StageRow {
                    stage: s.stage.as_str().to_string(),
                    result: color_status(if s.success { "passed" } else { "failed" }),
                    time: format_millis(s.elapsed_ms),
                    detail: s.detail.clone(),
                })
                .collect();
            print_table(&rows, OutputFormat::Table);

            if let Some(build) = &report.build {
                println!("Commit:  {} on {}", build.commit.cyan(), build.branch.cyan());
            }
            if let Some(tests) = &report.tests {
                println!(
                    "Tests:   {}/{} passed ({:.2}%)",
                    tests.passed, tests.total, tests.success_rate
                );
            }

            match report.failed_stage() {
                Some(failed) => print_error(&format!("Stage {} failed", failed.stage.as_str())),
                None => print_success("Pipeline completed"),
            }
        }
    }

    report.into_result()?;
    Ok(())
}
