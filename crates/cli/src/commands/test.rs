//! HTTP test and load commands

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;
use tabled::Tabled;

use super::Context;
use crate::output::{color_status, format_millis, print_json, print_success, print_table, print_warning, OutputFormat};
use pipeline_lib::models::TestReport;
use pipeline_lib::pipeline::TEST_REPORT_FILE;
use pipeline_lib::suite::{write_report, LoadTest, TestSuite};
use pipeline_lib::StructuredLogger;

/// Row for the test results table
#[derive(Tabled, serde::Serialize)]
struct TestRow {
    #[tabled(rename = "Test")]
    name: String,
    #[tabled(rename = "Result")]
    result: String,
    #[tabled(rename = "Time")]
    time: String,
    #[tabled(rename = "Detail")]
    detail: String,
}

/// Run the HTTP suite; fails when any check fails
pub async fn test(ctx: &Context, report_path: Option<PathBuf>) -> Result<()> {
    let suite = TestSuite::new(ctx.probe()?);
    let results = suite.run().await;
    let report = TestReport::new(suite.base_url(), results);

    StructuredLogger::new(ctx.settings.image.clone()).log_test_run(
        suite.base_url(),
        report.summary.total,
        report.summary.passed,
        report.summary.success_rate,
    );

    let path = report_path.unwrap_or_else(|| ctx.settings.output_dir.join(TEST_REPORT_FILE));
    write_report(&report, &path)?;

    match ctx.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => print_report(&report, &path),
    }

    if report.summary.failed > 0 {
        anyhow::bail!(
            "{} of {} checks failed",
            report.summary.failed,
            report.summary.total
        );
    }
    Ok(())
}

fn print_report(report: &TestReport, path: &std::path::Path) {
    println!("{}", format!("Test results for {}", report.target).bold());

    let rows: Vec<TestRow> = report
        .tests
        .iter()
        .map(|t| TestRow {
            name: t.name.clone(),
            result: color_status(if t.success { "passed" } else { "failed" }),
            time: format_millis(t.duration_ms),
            detail: t.detail.clone(),
        })
        .collect();
    print_table(&rows, OutputFormat::Table);

    let summary = &report.summary;
    let line = format!(
        "{}/{} passed ({:.2}%)",
        summary.passed, summary.total, summary.success_rate
    );
    if summary.failed == 0 {
        print_success(&line);
    } else {
        print_warning(&line);
    }
    println!("Report written to {}", path.display());
}

/// Generate load against one path and report latency
pub async fn load(ctx: &Context, workers: usize, requests: usize, path: String) -> Result<()> {
    if workers == 0 || requests == 0 {
        anyhow::bail!("Workers and requests per worker must be positive");
    }

    let probe = ctx.probe()?;
    let report = LoadTest::new(workers, requests, path).run(&probe).await;

    match ctx.format {
        OutputFormat::Json => print_json(&report),
        OutputFormat::Table => {
            println!("{}", "Load Test".bold());
            println!("{}", "=".repeat(50));
            println!("Target:        {}{}", ctx.settings.base_url, report.path);
            println!("Workers:       {}", report.workers);
            println!(
                "Requests:      {} ({} ok, {} failed)",
                report.total,
                report.succeeded.to_string().green(),
                if report.failed > 0 {
                    report.failed.to_string().red()
                } else {
                    report.failed.to_string().normal()
                }
            );
            println!(
                "Latency:       min {:.1}ms / avg {:.1}ms / max {:.1}ms",
                report.min_latency_ms, report.avg_latency_ms, report.max_latency_ms
            );
            println!("Throughput:    {:.1} req/s", report.requests_per_sec);
        }
    }

    if !report.all_succeeded() {
        anyhow::bail!("{} of {} requests failed", report.failed, report.total);
    }
    Ok(())
}
