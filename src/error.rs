use std::path::PathBuf;

use thiserror::Error;

pub type PipeResult<T> = Result<T, PipeError>;

#[derive(Debug, Error)]
pub enum PipeError {
    #[error("i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("json failure: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing command `{command}` on PATH")]
    CommandMissing { command: String },

    #[error("command failed: `{command}` (status: {status}){stderr_suffix}")]
    CommandFailed {
        command: String,
        status: i32,
        stderr_suffix: String,
    },

    #[error("command timed out after {timeout_ms}ms: `{command}`{stderr_suffix}")]
    CommandTimedOut {
        command: String,
        timeout_ms: u64,
        stderr_suffix: String,
    },

    #[error("artifact at `{path}` is unusable: {reason}")]
    ArtifactParse { path: PathBuf, reason: String },

    #[error("missing expected artifact at `{0}`")]
    MissingArtifact(PathBuf),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("no viable output: {0}")]
    NoViableOutput(String),
}

impl PipeError {
    #[must_use]
    pub fn from_command_failure(command: String, status: i32, stderr: String) -> Self {
        Self::CommandFailed {
            command,
            status,
            stderr_suffix: stderr_suffix(&stderr),
        }
    }

    #[must_use]
    pub fn from_command_timeout(command: String, timeout_ms: u64, stderr: String) -> Self {
        Self::CommandTimedOut {
            command,
            timeout_ms,
            stderr_suffix: stderr_suffix(&stderr),
        }
    }

    #[must_use]
    pub fn artifact_parse(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::ArtifactParse {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True for the collaborator-invocation failure kinds. Chopped mode
    /// isolates these per chunk; everything else aborts the run.
    #[must_use]
    pub const fn is_collaborator_failure(&self) -> bool {
        matches!(
            self,
            Self::CommandMissing { .. } | Self::CommandFailed { .. } | Self::CommandTimedOut { .. }
        )
    }
}

fn stderr_suffix(stderr: &str) -> String {
    let trimmed = stderr.trim();
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("; stderr: {trimmed}")
    }
}
