//! FFmpeg CLI wrapper for BannerClip.
//!
//! This crate provides:
//! - Tool discovery for `ffmpeg`/`ffprobe` with PATH fallback
//! - A command builder and a runner with hard timeouts
//! - Media probing with safe fallbacks
//! - Overlay bar geometry and filter graph construction
//! - Per-job scratch workspaces with guaranteed cleanup
//! - The compositing pipeline and output verification

pub mod command;
pub mod config;
pub mod error;
pub mod geometry;
pub mod locator;
pub mod overlay;
pub mod pipeline;
pub mod probe;
pub mod verify;
pub mod workspace;

pub use command::{FfmpegCommand, ToolOutput, ToolRunner};
pub use config::PipelineConfig;
pub use error::{CompositeStage, MediaError, MediaResult};
pub use geometry::compute_geometry;
pub use locator::{ToolLocator, ToolPath, Toolchain};
pub use pipeline::{CompositePlan, CompositingPipeline};
pub use probe::MediaInspector;
pub use verify::OutputVerifier;
pub use workspace::{Workspace, WorkspaceManager};
