//! Pipeline error types.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by pipeline operations.
///
/// Transient unavailability never appears here: the poll and sample loops
/// retry it internally. What remains is either a declared failure, a
/// timeout, or a wrapped I/O cause.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("required tool not found: {tool} ({cause})")]
    ToolMissing { tool: String, cause: String },

    #[error("command `{command}` exited with {code}: {cause}")]
    CommandFailed {
        command: String,
        code: String,
        cause: String,
    },

    #[error("command `{command}` timed out after {timeout:?}")]
    CommandTimedOut { command: String, timeout: Duration },

    #[error("{target} reported unhealthy after {elapsed:?}")]
    Unhealthy { target: String, elapsed: Duration },

    #[error("{target} did not become healthy within {timeout:?}")]
    HealthTimedOut { target: String, timeout: Duration },

    #[error("{stage} stage failed: {cause}")]
    StageFailed { stage: String, cause: String },

    #[error("invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected engine output: {0}")]
    Parse(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl PipelineError {
    /// True when the error means "gave up waiting" rather than "was told no".
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            PipelineError::HealthTimedOut { .. } | PipelineError::CommandTimedOut { .. }
        )
    }
}

pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeout_is_distinct_from_declared_failure() {
        let timed_out = PipelineError::HealthTimedOut {
            target: "web".to_string(),
            timeout: Duration::from_secs(60),
        };
        let unhealthy = PipelineError::Unhealthy {
            target: "web".to_string(),
            elapsed: Duration::from_secs(5),
        };

        assert!(timed_out.is_timeout());
        assert!(!unhealthy.is_timeout());
    }

    #[test]
    fn test_messages_carry_cause() {
        let err = PipelineError::CommandFailed {
            command: "docker build".to_string(),
            code: "1".to_string(),
            cause: "no such file: Dockerfile".to_string(),
        };

        assert!(err.to_string().contains("no such file: Dockerfile"));
    }
}
