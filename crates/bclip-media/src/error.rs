//! Error types for media operations.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Maximum number of tool diagnostic lines carried by an error.
pub const STDERR_TAIL_LINES: usize = 10;

/// Pipeline stage a compositing failure is attributed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompositeStage {
    /// The encoder exited non-zero or a precondition was not met
    Compose,
    /// An external invocation exceeded its wall-clock budget
    Timeout,
    /// The produced file failed the sanity checks
    Verify,
}

impl CompositeStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeStage::Compose => "compose",
            CompositeStage::Timeout => "timeout",
            CompositeStage::Verify => "verify",
        }
    }
}

impl fmt::Display for CompositeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("{0} not found")]
    ToolNotFound(String),

    /// Only ever seen inside the inspector, which replaces it with defaults.
    #[error("Probe failed: {0}")]
    ProbeFailed(String),

    #[error("Compositing failed at {stage}: {message}")]
    Compositing {
        stage: CompositeStage,
        message: String,
        stderr_tail: Option<String>,
    },

    #[error("Workspace error at {}: {source}", path.display())]
    Workspace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{tool} timed out after {secs} seconds")]
    Timeout { tool: String, secs: u64 },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl MediaError {
    /// Create a compositing failure.
    pub fn compositing(
        stage: CompositeStage,
        message: impl Into<String>,
        stderr_tail: Option<String>,
    ) -> Self {
        Self::Compositing {
            stage,
            message: message.into(),
            stderr_tail,
        }
    }

    /// Create a compose-stage failure.
    pub fn compose_failed(message: impl Into<String>, stderr_tail: Option<String>) -> Self {
        Self::compositing(CompositeStage::Compose, message, stderr_tail)
    }

    /// Create a verify-stage failure.
    pub fn verify_failed(message: impl Into<String>, stderr_tail: Option<String>) -> Self {
        Self::compositing(CompositeStage::Verify, message, stderr_tail)
    }

    /// Create a workspace failure.
    pub fn workspace(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Workspace {
            path: path.into(),
            source,
        }
    }

    /// Create a probe failure.
    pub fn probe_failed(message: impl Into<String>) -> Self {
        Self::ProbeFailed(message.into())
    }

    /// Stage of a compositing failure, if this is one.
    pub fn stage(&self) -> Option<CompositeStage> {
        match self {
            Self::Compositing { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// Bounded excerpt of the tool's diagnostic output, if any.
    pub fn stderr_tail(&self) -> Option<&str> {
        match self {
            Self::Compositing { stderr_tail, .. } => stderr_tail.as_deref(),
            _ => None,
        }
    }

    /// Re-tag a runner error with the pipeline stage it happened in.
    ///
    /// Timeouts always become stage `timeout`; a missing tool stays
    /// `ToolNotFound`.
    pub fn at_stage(self, stage: CompositeStage) -> Self {
        match self {
            Self::Timeout { tool, secs } => Self::compositing(
                CompositeStage::Timeout,
                format!("{tool} exceeded {secs}s during {stage}"),
                None,
            ),
            Self::Io(e) => Self::compositing(stage, format!("failed to run tool: {e}"), None),
            other => other,
        }
    }
}

/// Keep only the last `max_lines` non-empty lines of tool output.
pub fn tail_lines(text: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    let start = lines.len().saturating_sub(max_lines);
    lines[start..].join("\n")
}
