//! Media probe results and overlay placement.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Width used when a file cannot be probed.
pub const FALLBACK_WIDTH: u32 = 1280;
/// Height used when a file cannot be probed.
pub const FALLBACK_HEIGHT: u32 = 720;
/// Duration (seconds) used when a file cannot be probed.
pub const FALLBACK_DURATION_SECS: f64 = 5.0;

/// Smallest bar the overlay is ever scaled to.
pub const MIN_BAR_HEIGHT: u32 = 30;

/// Duration and frame size of a media file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MediaProbe {
    /// Container duration in seconds
    pub duration_secs: f64,
    /// Width of the first video stream in pixels
    pub width: u32,
    /// Height of the first video stream in pixels
    pub height: u32,
}

impl MediaProbe {
    /// Create a probe result, replacing unusable values with the fallbacks.
    pub fn new(duration_secs: f64, width: u32, height: u32) -> Self {
        let fallback = Self::fallback();
        Self {
            duration_secs: if duration_secs.is_finite() && duration_secs >= 0.0 {
                duration_secs
            } else {
                fallback.duration_secs
            },
            width: if width > 0 { width } else { fallback.width },
            height: if height > 0 { height } else { fallback.height },
        }
    }

    /// The documented default returned when the tool cannot answer.
    pub const fn fallback() -> Self {
        Self {
            duration_secs: FALLBACK_DURATION_SECS,
            width: FALLBACK_WIDTH,
            height: FALLBACK_HEIGHT,
        }
    }
}

impl Default for MediaProbe {
    fn default() -> Self {
        Self::fallback()
    }
}

/// How the overlay bar height is derived from the video height.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum BarHeightPolicy {
    /// 30px up to 360p, 45px up to 720p, 60px above
    #[default]
    Thresholds,
    /// One tenth of the height, never below 30px
    Proportional,
}

impl BarHeightPolicy {
    /// Get the policy name as used in configuration.
    pub fn as_str(&self) -> &'static str {
        match self {
            BarHeightPolicy::Thresholds => "thresholds",
            BarHeightPolicy::Proportional => "proportional",
        }
    }
}

impl std::str::FromStr for BarHeightPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "thresholds" | "threshold" => Ok(BarHeightPolicy::Thresholds),
            "proportional" | "ratio" => Ok(BarHeightPolicy::Proportional),
            other => Err(format!("unknown bar height policy: {other}")),
        }
    }
}

/// Placement of the overlay bar on the main video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct OverlayGeometry {
    /// Height the overlay is scaled to
    pub bar_height: u32,
    /// Vertical offset of the bar's top edge
    pub overlay_y: u32,
}
