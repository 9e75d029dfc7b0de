//! FFprobe media inspection.
//!
//! Probing is best-effort: each sub-query (container duration, first video
//! stream dimensions) runs independently under its own timeout, and any
//! failure is replaced by the documented fallback so geometry can always
//! be computed.

use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, warn};

use bclip_models::MediaProbe;

use crate::command::ToolRunner;
use crate::error::{MediaError, MediaResult};
use crate::locator::ToolPath;

/// Default timeout for each probe sub-query.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: Option<FfprobeFormat>,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    width: Option<u32>,
    height: Option<u32>,
}

/// Queries duration and frame size through `ffprobe`.
#[derive(Debug, Clone)]
pub struct MediaInspector {
    ffprobe: ToolPath,
    runner: ToolRunner,
}

impl MediaInspector {
    pub fn new(ffprobe: ToolPath) -> Self {
        Self::with_timeout(ffprobe, PROBE_TIMEOUT)
    }

    pub fn with_timeout(ffprobe: ToolPath, timeout: Duration) -> Self {
        Self {
            ffprobe,
            runner: ToolRunner::new(timeout),
        }
    }

    /// Probe a file for duration and dimensions, never failing.
    pub async fn probe(&self, path: impl AsRef<Path>) -> MediaProbe {
        let path = path.as_ref();
        let fallback = MediaProbe::fallback();

        if !is_regular_file(path).await {
            warn!(path = %path.display(), "Probe target missing, using defaults");
            return fallback;
        }

        let duration = match self.query_duration(path).await {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Duration probe failed, using default");
                fallback.duration_secs
            }
        };

        let (width, height) = match self.query_dimensions(path).await {
            Ok(dims) => dims,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Dimension probe failed, using default");
                (fallback.width, fallback.height)
            }
        };

        let probe = MediaProbe::new(duration, width, height);
        debug!(
            path = %path.display(),
            duration = probe.duration_secs,
            width = probe.width,
            height = probe.height,
            "Probed media"
        );
        probe
    }

    /// Container duration only (the overlay's dimensions are irrelevant).
    pub async fn probe_duration(&self, path: impl AsRef<Path>) -> f64 {
        let path = path.as_ref();
        if !is_regular_file(path).await {
            return MediaProbe::fallback().duration_secs;
        }
        match self.query_duration(path).await {
            Ok(d) => d,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Duration probe failed, using default");
                MediaProbe::fallback().duration_secs
            }
        }
    }

    /// Container-level duration in seconds.
    pub async fn query_duration(&self, path: &Path) -> MediaResult<f64> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-show_entries".to_string(),
            "format=duration".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = self.runner.run(&self.ffprobe, &args).await?;
        if !output.success() {
            return Err(MediaError::probe_failed(format!(
                "ffprobe exited with {}: {}",
                output.status,
                output.stderr_tail()
            )));
        }
        parse_duration(&output.stdout)
    }

    /// Width and height of the first video stream.
    pub async fn query_dimensions(&self, path: &Path) -> MediaResult<(u32, u32)> {
        let args = vec![
            "-v".to_string(),
            "error".to_string(),
            "-select_streams".to_string(),
            "v:0".to_string(),
            "-show_entries".to_string(),
            "stream=width,height".to_string(),
            "-of".to_string(),
            "json".to_string(),
            path.to_string_lossy().to_string(),
        ];
        let output = self.runner.run(&self.ffprobe, &args).await?;
        if !output.success() {
            return Err(MediaError::probe_failed(format!(
                "ffprobe exited with {}: {}",
                output.status,
                output.stderr_tail()
            )));
        }
        parse_dimensions(&output.stdout)
    }
}

/// Parse `-show_entries format=duration -of json` output.
pub fn parse_duration(stdout: &str) -> MediaResult<f64> {
    let probe: FfprobeOutput = serde_json::from_str(stdout)
        .map_err(|e| MediaError::probe_failed(format!("unparseable ffprobe output: {e}")))?;

    let duration = probe
        .format
        .and_then(|f| f.duration)
        .ok_or_else(|| MediaError::probe_failed("no duration reported"))?;

    match duration.trim().parse::<f64>() {
        Ok(d) if d.is_finite() && d >= 0.0 => Ok(d),
        _ => Err(MediaError::probe_failed(format!(
            "non-numeric duration: {duration:?}"
        ))),
    }
}

/// Parse `-select_streams v:0 -show_entries stream=width,height -of json` output.
pub fn parse_dimensions(stdout: &str) -> MediaResult<(u32, u32)> {
    let probe: FfprobeOutput = serde_json::from_str(stdout)
        .map_err(|e| MediaError::probe_failed(format!("unparseable ffprobe output: {e}")))?;

    let stream = probe
        .streams
        .first()
        .ok_or_else(|| MediaError::probe_failed("no video stream found"))?;

    match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => Ok((w, h)),
        _ => Err(MediaError::probe_failed("video stream has no dimensions")),
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_parse_duration() {
        let json = r#"{"format": {"duration": "3.041000"}}"#;
        assert!((parse_duration(json).unwrap() - 3.041).abs() < 1e-9);
    }

    #[test]
    fn test_parse_duration_rejects_garbage() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration(r#"{"format": {"duration": "N/A"}}"#).is_err());
        assert!(parse_duration(r#"{"format": {}}"#).is_err());
        assert!(parse_duration(r#"{"format": {"duration": "-1"}}"#).is_err());
    }

    #[test]
    fn test_parse_dimensions() {
        let json = r#"{"programs": [], "streams": [{"width": 1920, "height": 1080}]}"#;
        assert_eq!(parse_dimensions(json).unwrap(), (1920, 1080));
    }

    #[test]
    fn test_parse_dimensions_without_video_stream() {
        assert!(parse_dimensions(r#"{"streams": []}"#).is_err());
        assert!(parse_dimensions(r#"{"streams": [{"width": 0, "height": 0}]}"#).is_err());
    }

    #[tokio::test]
    async fn test_missing_file_short_circuits_to_defaults() {
        // A tool that cannot exist proves nothing was spawned.
        let inspector = MediaInspector::new(ToolPath::new("bclip-definitely-missing-ffprobe"));
        let probe = inspector.probe("/nonexistent/video.mp4").await;
        assert_eq!(probe, MediaProbe::fallback());
    }

    #[tokio::test]
    async fn test_tool_failure_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("corrupt.mp4");
        std::fs::write(&path, b"definitely not a video").unwrap();

        let inspector = MediaInspector::new(ToolPath::new("bclip-definitely-missing-ffprobe"));
        let probe = inspector.probe(&path).await;
        assert_eq!(probe, MediaProbe::fallback());
        assert_eq!(inspector.probe_duration(&path).await, 5.0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_empty_answer_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("clip.mp4");
        std::fs::write(&path, b"x").unwrap();

        // `true` exits cleanly with no output, like a tool that has nothing to say.
        let inspector = MediaInspector::new(ToolPath::new("true"));
        let probe = inspector.probe(&path).await;
        assert_eq!(probe.width, 1280);
        assert_eq!(probe.height, 720);
        assert_eq!(probe.duration_secs, 5.0);
    }
}
