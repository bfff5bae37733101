//! External process execution
//!
//! Every interaction with the container engine and source control goes
//! through [`CommandRunner`], so tests can substitute scripted output.

use crate::error::{PipelineError, PipelineResult};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tokio::time::Instant;
use tracing::debug;

/// Default per-call timeout for external commands
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured result of one external command
#[derive(Debug, Clone)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was killed by a signal
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub elapsed: Duration,
}

impl CommandOutput {
    /// Whether the command exited with status 0
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Convert a non-zero exit into a [`PipelineError::CommandFailed`]
    pub fn into_success(self, command: &str) -> PipelineResult<CommandOutput> {
        if self.success() {
            return Ok(self);
        }

        let cause = if self.stderr.trim().is_empty() {
            self.stdout.trim().to_string()
        } else {
            self.stderr.trim().to_string()
        };

        Err(PipelineError::CommandFailed {
            command: command.to_string(),
            code: self
                .status
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            cause,
        })
    }
}

/// Trait for running external commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` and capture its output.
    ///
    /// A non-zero exit is not an error at this level; callers decide.
    async fn run(&self, program: &str, args: &[&str]) -> PipelineResult<CommandOutput>;
}

/// Runs commands on the host with a per-call timeout
#[derive(Debug, Clone)]
pub struct SystemRunner {
    timeout: Duration,
}

impl SystemRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

impl Default for SystemRunner {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &str, args: &[&str]) -> PipelineResult<CommandOutput> {
        let command_line = render_command(program, args);
        debug!(command = %command_line, "Running command");

        let start = Instant::now();
        let child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => PipelineError::ToolMissing {
                    tool: program.to_string(),
                    cause: e.to_string(),
                },
                _ => PipelineError::Io(e),
            })?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(PipelineError::CommandTimedOut {
                    command: command_line,
                    timeout: self.timeout,
                })
            }
        };

        let elapsed = start.elapsed();
        debug!(
            command = %command_line,
            status = ?output.status.code(),
            elapsed_ms = elapsed.as_millis(),
            "Command finished"
        );

        Ok(CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            elapsed,
        })
    }
}

/// Render a command line for logs and error messages
pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut line = program.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_success_prefers_stderr() {
        let output = CommandOutput {
            status: Some(1),
            stdout: "partial".to_string(),
            stderr: "Error: No such container: web\n".to_string(),
            elapsed: Duration::from_millis(5),
        };

        let err = output.into_success("docker stop web").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("No such container"));
        assert!(message.contains("exited with 1"));
    }

    #[test]
    fn test_render_command() {
        assert_eq!(
            render_command("docker", &["ps", "-a"]),
            "docker ps -a".to_string()
        );
    }

    #[tokio::test]
    async fn test_missing_tool_is_declared_failure() {
        let runner = SystemRunner::default();
        let err = runner
            .run("definitely-not-a-real-binary-cdp", &[])
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::ToolMissing { .. }));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_captures_stdout_and_status() {
        let runner = SystemRunner::default();
        let output = runner.run("sh", &["-c", "echo hello; exit 3"]).await.unwrap();

        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert!(!output.success());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_timeout_kills_command() {
        let runner = SystemRunner::new(Duration::from_millis(100));
        let err = runner.run("sleep", &["5"]).await.unwrap_err();

        assert!(err.is_timeout());
    }
}
