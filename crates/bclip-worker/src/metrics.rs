//! Job metrics.
//!
//! Recorded through the `metrics` facade; nothing is exported unless the
//! embedding process installs a recorder.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ADMITTED_TOTAL: &str = "bclip_jobs_admitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "bclip_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "bclip_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "bclip_jobs_failed_total";
    pub const JOBS_ACTIVE: &str = "bclip_jobs_active";
    pub const JOB_DURATION_SECONDS: &str = "bclip_job_duration_seconds";
}

pub fn record_job_admitted() {
    counter!(names::JOBS_ADMITTED_TOTAL).increment(1);
}

/// Record a job turned away before any work started.
pub fn record_job_rejected(kind: &'static str) {
    counter!(names::JOBS_REJECTED_TOTAL, "kind" => kind).increment(1);
}

pub fn record_job_completed(duration_secs: f64) {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "success").record(duration_secs);
}

pub fn record_job_failed(kind: &'static str, duration_secs: f64) {
    counter!(names::JOBS_FAILED_TOTAL, "kind" => kind).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, "outcome" => "failure").record(duration_secs);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}
