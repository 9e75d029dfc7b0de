//! Shared data models for the BannerClip overlay pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Media probe results and overlay bar geometry
//! - Compositing jobs and requester identities
//! - Encoding configuration
//! - Strategy and bar-height policy selection

pub mod encoding;
pub mod job;
pub mod media;

// Re-export common types
pub use encoding::EncodingConfig;
pub use job::{CompositeStrategy, CompositingJob, JobId, RequesterId};
pub use media::{BarHeightPolicy, MediaProbe, OverlayGeometry};
