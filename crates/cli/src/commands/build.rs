//! Image build command

use anyhow::Result;
use colored::Colorize;
use std::path::PathBuf;

use super::Context;
use crate::output::{print_json, print_success, OutputFormat};
use pipeline_lib::pipeline::BUILD_INFO_FILE;

/// Build the image and record its build info
pub async fn build(ctx: &Context, dockerfile: PathBuf, build_context: PathBuf, no_cache: bool) -> Result<()> {
    let mut config = ctx.pipeline_config();
    config.dockerfile = dockerfile;
    config.context = build_context;
    config.no_cache = no_cache;

    let pipeline = ctx.pipeline(config)?;
    let info = pipeline.build().await?;

    match ctx.format {
        OutputFormat::Json => print_json(&info),
        OutputFormat::Table => {
            print_success(&format!("Built {}", ctx.settings.image.bold()));
            println!("Branch:  {}", info.branch.cyan());
            println!("Commit:  {}", info.commit.cyan());
            for tag in &info.tags {
                println!("Tag:     {}", tag);
            }
            println!(
                "Build info written to {}",
                ctx.settings.output_dir.join(BUILD_INFO_FILE).display()
            );
        }
    }

    Ok(())
}
