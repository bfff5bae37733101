//! Source control queries for build metadata

use crate::runner::CommandRunner;
use std::sync::Arc;
use tracing::warn;

const UNKNOWN: &str = "unknown";

/// Reads branch and commit from the working tree via `git`
#[derive(Clone)]
pub struct SourceControl {
    runner: Arc<dyn CommandRunner>,
}

impl SourceControl {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self { runner }
    }

    /// Current branch name, or `unknown` outside a repository
    pub async fn branch(&self) -> String {
        self.rev_parse(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// Abbreviated commit hash, or `unknown` outside a repository
    pub async fn commit(&self) -> String {
        self.rev_parse(&["rev-parse", "--short", "HEAD"]).await
    }

    async fn rev_parse(&self, args: &[&str]) -> String {
        match self.runner.run("git", args).await {
            Ok(output) if output.success() => {
                let value = output.stdout.trim();
                if value.is_empty() {
                    UNKNOWN.to_string()
                } else {
                    value.to_string()
                }
            }
            Ok(output) => {
                warn!(stderr = %output.stderr.trim(), "git query failed");
                UNKNOWN.to_string()
            }
            Err(e) => {
                warn!(error = %e, "git unavailable");
                UNKNOWN.to_string()
            }
        }
    }
}
