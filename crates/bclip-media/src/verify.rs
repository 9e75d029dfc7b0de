//! Sanity checks on a produced video.

use std::path::Path;
use std::time::Duration;
use tracing::{debug, error};

use crate::command::{FfmpegCommand, ToolRunner};
use crate::error::{CompositeStage, MediaError, MediaResult};
use crate::locator::ToolPath;

/// Checks that an output exists, is not trivially small, and decodes.
#[derive(Debug, Clone)]
pub struct OutputVerifier {
    ffmpeg: ToolPath,
    runner: ToolRunner,
    min_bytes: u64,
}

impl OutputVerifier {
    pub fn new(ffmpeg: ToolPath, timeout: Duration, min_bytes: u64) -> Self {
        Self {
            ffmpeg,
            runner: ToolRunner::new(timeout),
            min_bytes,
        }
    }

    /// Verify `path`, decoding the first `window_secs` seconds.
    pub async fn verify(&self, path: &Path, window_secs: f64) -> MediaResult<()> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|_| MediaError::verify_failed(format!("output missing: {}", path.display()), None))?;

        if !metadata.is_file() {
            return Err(MediaError::verify_failed(
                format!("output is not a file: {}", path.display()),
                None,
            ));
        }

        if metadata.len() < self.min_bytes {
            return Err(MediaError::verify_failed(
                format!(
                    "output is {} bytes, below the {} byte minimum",
                    metadata.len(),
                    self.min_bytes
                ),
                None,
            ));
        }

        let cmd = FfmpegCommand::null_output()
            .input(path)
            .output_arg("-xerror")
            .duration(window_secs);

        let output = self
            .runner
            .run_ffmpeg(&self.ffmpeg, &cmd)
            .await
            .map_err(|e| e.at_stage(CompositeStage::Verify))?;

        if !output.success() {
            let tail = output.stderr_tail();
            error!(path = %path.display(), stderr = %tail, "Output failed decode check");
            return Err(MediaError::verify_failed(
                format!("decode check exited with {}", output.status),
                Some(tail),
            ));
        }

        debug!(
            path = %path.display(),
            bytes = metadata.len(),
            elapsed_ms = output.elapsed.as_millis() as u64,
            "Output verified"
        );
        Ok(())
    }
}
