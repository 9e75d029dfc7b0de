//! Overlay compositing worker.
//!
//! This crate provides:
//! - Environment-driven configuration
//! - Single-flight admission per requester
//! - Input validation and job orchestration around the media pipeline
//! - User-facing error messages, structured job logging and metrics

pub mod config;
pub mod error;
pub mod guard;
pub mod logging;
pub mod metrics;
pub mod processor;

pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use guard::{JobGuard, JobPermit};
pub use logging::JobLogger;
pub use processor::{OverlayProcessor, OverlayRequest, StatusReport};
