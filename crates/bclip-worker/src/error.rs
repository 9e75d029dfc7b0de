//! Worker error types.

use bclip_media::{CompositeStage, MediaError};
use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Job already in progress for {0}")]
    ConcurrencyRejected(String),

    #[error("Input rejected: {0}")]
    InputRejected(String),

    #[error("Overlay asset unavailable: {0}")]
    OverlayUnavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn input_rejected(msg: impl Into<String>) -> Self {
        Self::InputRejected(msg.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Short, stable label for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            WorkerError::ConcurrencyRejected(_) => "concurrency_rejected",
            WorkerError::InputRejected(_) => "input_rejected",
            WorkerError::OverlayUnavailable(_) => "overlay_unavailable",
            WorkerError::Config(_) => "config",
            WorkerError::Media(e) => match e {
                MediaError::ToolNotFound(_) => "tool_not_found",
                MediaError::Workspace { .. } | MediaError::Io(_) => "workspace",
                MediaError::Compositing { stage, .. } => stage.as_str(),
                MediaError::Timeout { .. } => "timeout",
                MediaError::ProbeFailed(_) => "probe",
                MediaError::InvalidConfig(_) => "config",
            },
            WorkerError::Io(_) => "io",
        }
    }

    /// Whether the requester is at fault (bad input or double submit).
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            WorkerError::ConcurrencyRejected(_) | WorkerError::InputRejected(_)
        )
    }

    /// Message suitable for showing to the requester.
    ///
    /// At most the bounded tool excerpt is included, never full tool output.
    pub fn user_message(&self) -> String {
        match self {
            WorkerError::ConcurrencyRejected(_) => {
                "You already have a video being processed. Please wait for it to finish.".to_string()
            }
            WorkerError::InputRejected(reason) => format!("This video can't be processed: {reason}."),
            WorkerError::OverlayUnavailable(_) => {
                "The overlay clip is not installed on this server. Please contact the operator."
                    .to_string()
            }
            WorkerError::Config(_) => {
                "The server is misconfigured. Please contact the operator.".to_string()
            }
            WorkerError::Media(e) => media_message(e),
            WorkerError::Io(_) => "A file error occurred on the server. Please try again.".to_string(),
        }
    }
}

fn media_message(error: &MediaError) -> String {
    let base = match error {
        MediaError::ToolNotFound(tool) => {
            return format!("The video tool ({tool}) is not available on this server. Please contact the operator.");
        }
        MediaError::Compositing { stage, .. } => match stage {
            CompositeStage::Compose => "Adding the overlay failed. The video may be corrupt or in an unsupported format.",
            CompositeStage::Timeout => "Processing took too long and was stopped. Try a shorter video.",
            CompositeStage::Verify => "The processed video failed a playback check. Please try another file.",
        },
        MediaError::Timeout { .. } => "Processing took too long and was stopped. Try a shorter video.",
        MediaError::Workspace { .. } | MediaError::Io(_) => {
            "The server could not prepare working space for your video. Please try again."
        }
        MediaError::ProbeFailed(_) => "The video could not be read.",
        MediaError::InvalidConfig(_) => "The server is misconfigured. Please contact the operator.",
    };

    match error.stderr_tail().filter(|t| !t.is_empty()) {
        Some(tail) => format!("{base}\n\nDetails:\n{tail}"),
        None => base.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_each_kind_has_distinct_message() {
        let errors = vec![
            WorkerError::ConcurrencyRejected("u1".into()),
            WorkerError::input_rejected("file is empty"),
            WorkerError::OverlayUnavailable("/app/assets/overlay.mp4".into()),
            WorkerError::config_error("bad crf"),
            WorkerError::Media(MediaError::ToolNotFound("ffmpeg".into())),
            WorkerError::Media(MediaError::compose_failed("exit 1", None)),
            WorkerError::Media(MediaError::compositing(CompositeStage::Timeout, "slow", None)),
            WorkerError::Media(MediaError::verify_failed("tiny", None)),
            WorkerError::Media(MediaError::workspace(
                "/tmp/x",
                std::io::Error::other("denied"),
            )),
        ];

        let messages: HashSet<String> = errors.iter().map(|e| e.user_message()).collect();
        assert_eq!(messages.len(), errors.len());

        let kinds: HashSet<&str> = errors.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds.len(), errors.len());
    }

    #[test]
    fn test_user_message_carries_bounded_tail() {
        let tail = "line 9\nline 10";
        let err = WorkerError::Media(MediaError::compose_failed("exit 1", Some(tail.to_string())));
        let msg = err.user_message();
        assert!(msg.contains("line 10"));
        assert!(!msg.contains("exit 1"));
    }

    #[test]
    fn test_user_errors() {
        assert!(WorkerError::ConcurrencyRejected("u".into()).is_user_error());
        assert!(!WorkerError::Media(MediaError::ToolNotFound("ffmpeg".into())).is_user_error());
    }
}
