//! Structured job logging.

use tracing::{error, info, warn, Span};

use bclip_models::{JobId, RequesterId};

/// Logs job lifecycle events with the job and requester attached.
#[derive(Debug, Clone)]
pub struct JobLogger {
    job_id: String,
    requester: String,
}

impl JobLogger {
    pub fn new(job_id: &JobId, requester: &RequesterId) -> Self {
        Self {
            job_id: job_id.to_string(),
            requester: requester.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(job_id = %self.job_id, requester = %self.requester, "Job started: {}", message);
    }

    pub fn log_progress(&self, message: &str) {
        info!(job_id = %self.job_id, requester = %self.requester, "Job progress: {}", message);
    }

    pub fn log_warning(&self, message: &str) {
        warn!(job_id = %self.job_id, requester = %self.requester, "Job warning: {}", message);
    }

    /// Log a failure with its kind label.
    pub fn log_error(&self, kind: &str, message: &str) {
        error!(
            job_id = %self.job_id,
            requester = %self.requester,
            kind = kind,
            "Job failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str, elapsed_ms: u64) {
        info!(
            job_id = %self.job_id,
            requester = %self.requester,
            elapsed_ms,
            "Job completed: {}", message
        );
    }

    /// Span covering the whole job; tool invocations nest under it.
    pub fn create_span(&self) -> Span {
        tracing::info_span!("job", job_id = %self.job_id, requester = %self.requester)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_span_carries_identity() {
        let logger = JobLogger::new(&JobId::new(), &RequesterId::from(7u64));
        let subscriber = tracing_subscriber::fmt().with_test_writer().finish();

        tracing::subscriber::with_default(subscriber, || {
            let span = logger.create_span();
            let meta = span.metadata().unwrap();
            assert_eq!(meta.name(), "job");
            assert!(meta.fields().field("job_id").is_some());
            assert!(meta.fields().field("requester").is_some());
        });
    }
}
