//! Compositing job types.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use uuid::Uuid;

/// Unique identifier for a job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().simple().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of whoever asked for a job (a chat user, an API key, ...).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct RequesterId(pub String);

impl RequesterId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequesterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for RequesterId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<u64> for RequesterId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

/// Algorithm used to produce the composited output.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum CompositeStrategy {
    /// One encoder pass with a time-gated overlay over the whole video
    #[default]
    SinglePass,
    /// Encode the overlay window, stream-copy the rest, concat-demux both
    SegmentConcat,
}

impl CompositeStrategy {
    /// Get the strategy name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            CompositeStrategy::SinglePass => "single_pass",
            CompositeStrategy::SegmentConcat => "segment_concat",
        }
    }
}

impl std::str::FromStr for CompositeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "single_pass" | "single" => Ok(CompositeStrategy::SinglePass),
            "segment_concat" | "concat" => Ok(CompositeStrategy::SegmentConcat),
            other => Err(format!("unknown composite strategy: {other}")),
        }
    }
}

impl fmt::Display for CompositeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One execution of the compositing pipeline.
///
/// Owned by a single run; the scratch directory is purged when the run
/// ends and the paths must not be used afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CompositingJob {
    pub job_id: JobId,
    pub requester_id: RequesterId,
    /// Video supplied by the requester
    pub input_path: PathBuf,
    /// Operator-provisioned overlay clip (read-only)
    pub overlay_path: PathBuf,
    /// Scratch directory exclusively owned by this job
    pub workspace_dir: PathBuf,
    /// Where the finished video is written
    pub output_path: PathBuf,
    pub created_at: DateTime<Utc>,
}

impl CompositingJob {
    pub fn new(
        job_id: JobId,
        requester_id: RequesterId,
        input_path: impl Into<PathBuf>,
        overlay_path: impl Into<PathBuf>,
        workspace_dir: impl Into<PathBuf>,
        output_path: impl Into<PathBuf>,
    ) -> Self {
        Self {
            job_id,
            requester_id,
            input_path: input_path.into(),
            overlay_path: overlay_path.into(),
            workspace_dir: workspace_dir.into(),
            output_path: output_path.into(),
            created_at: Utc::now(),
        }
    }

    /// Path for an intermediate artifact inside this job's scratch directory.
    pub fn scratch_file(&self, name: &str) -> PathBuf {
        self.workspace_dir.join(format!("{}_{}", self.job_id, name))
    }
}
