//! Overlay compositing pipeline.
//!
//! # Strategies
//!
//! ## `SinglePass` (default)
//! One encoder invocation over the whole input. The overlay is scaled into
//! a bar, laid over the bottom of the frame and gated with
//! `between(t,0,N)`. Audio is mapped optionally and copied.
//!
//! ## `SegmentConcat`
//! 1. Encode the first N seconds with the overlay.
//! 2. Stream-copy everything after N seconds.
//! 3. Concat-demux both parts with stream copy.
//!
//! Fewer frames are re-encoded, but the copied remainder must share codec
//! parameters with the encoded head, so this is opt-in.
//!
//! Both strategies finish with the same verification step; a job never
//! reports success for an output that does not decode.

use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

use bclip_models::{CompositeStrategy, CompositingJob, MediaProbe, OverlayGeometry};

use crate::command::{FfmpegCommand, ToolRunner};
use crate::config::{PipelineConfig, MIN_VERIFY_WINDOW_SECS};
use crate::error::{CompositeStage, MediaError, MediaResult};
use crate::geometry::compute_geometry;
use crate::locator::{ToolPath, Toolchain};
use crate::overlay::{build_concat_list, build_overlay_filter, COMPOSITED_LABEL};
use crate::probe::MediaInspector;
use crate::verify::OutputVerifier;

/// Remainders shorter than this are not worth a separate segment.
const MIN_REMAINDER_SECS: f64 = 0.05;

/// Produces the composited output for a job.
#[derive(Debug, Clone)]
pub struct CompositingPipeline {
    ffmpeg: ToolPath,
    inspector: MediaInspector,
    verifier: OutputVerifier,
    config: PipelineConfig,
}

/// What the pipeline measured and decided for one job.
#[derive(Debug, Clone, Copy)]
pub struct CompositePlan {
    pub overlay_duration: f64,
    pub input: MediaProbe,
    pub geometry: OverlayGeometry,
}

impl CompositingPipeline {
    pub fn new(tools: &Toolchain, config: PipelineConfig) -> Self {
        Self {
            ffmpeg: tools.ffmpeg.clone(),
            inspector: MediaInspector::with_timeout(tools.ffprobe.clone(), config.probe_timeout),
            verifier: OutputVerifier::new(
                tools.ffmpeg.clone(),
                config.verify_timeout,
                config.min_output_bytes,
            ),
            config,
        }
    }

    /// Composite the job's overlay onto its input and write `job.output_path`.
    ///
    /// On failure no output file is left behind.
    pub async fn compose(&self, job: &CompositingJob) -> MediaResult<PathBuf> {
        check_readable(&job.overlay_path, "overlay asset").await?;
        check_readable(&job.input_path, "input video").await?;

        let plan = self.plan(job).await;
        info!(
            job_id = %job.job_id,
            strategy = %self.config.strategy,
            overlay_duration = plan.overlay_duration,
            width = plan.input.width,
            height = plan.input.height,
            bar_height = plan.geometry.bar_height,
            overlay_y = plan.geometry.overlay_y,
            "Compositing overlay"
        );

        let started = Instant::now();
        let result = match self.config.strategy {
            CompositeStrategy::SinglePass => self.compose_single_pass(job, &plan).await,
            CompositeStrategy::SegmentConcat => self.compose_segment_concat(job, &plan).await,
        };

        let result = match result {
            Ok(()) => {
                let window = (plan.overlay_duration + 2.0).max(MIN_VERIFY_WINDOW_SECS);
                self.verifier.verify(&job.output_path, window).await
            }
            Err(e) => Err(e),
        };

        if let Err(e) = result {
            remove_partial_output(&job.output_path).await;
            return Err(e);
        }

        info!(
            job_id = %job.job_id,
            output = %job.output_path.display(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Overlay composited"
        );
        Ok(job.output_path.clone())
    }

    /// Probe both inputs and derive the bar placement.
    pub async fn plan(&self, job: &CompositingJob) -> CompositePlan {
        let overlay_duration = self.inspector.probe_duration(&job.overlay_path).await;
        let input = self.inspector.probe(&job.input_path).await;
        let geometry = compute_geometry(input.height, self.config.bar_policy);

        CompositePlan {
            overlay_duration,
            input,
            geometry,
        }
    }

    async fn compose_single_pass(&self, job: &CompositingJob, plan: &CompositePlan) -> MediaResult<()> {
        let cmd = self
            .overlay_command(job, plan, &job.output_path)
            .shortest();

        self.run_compose(&cmd).await?;
        Ok(())
    }

    async fn compose_segment_concat(
        &self,
        job: &CompositingJob,
        plan: &CompositePlan,
    ) -> MediaResult<()> {
        let head = job.scratch_file("part1.mp4");
        let cmd = self
            .overlay_command(job, plan, &head)
            .duration(plan.overlay_duration);
        info!(job_id = %job.job_id, "Encoding overlay segment");
        self.run_compose(&cmd).await?;

        if !self.has_remainder(job, plan.overlay_duration).await {
            info!(job_id = %job.job_id, "Input fits inside the overlay window, skipping concat");
            return tokio::fs::rename(&head, &job.output_path)
                .await
                .map_err(|e| MediaError::workspace(&job.output_path, e));
        }

        let tail = job.scratch_file("part2.mp4");
        let cmd = FfmpegCommand::new(&tail)
            .input(&job.input_path)
            .output_args(["-ss".to_string(), format!("{:.3}", plan.overlay_duration)])
            .map("0:v:0")
            .map("0:a?")
            .codec_copy()
            .faststart();
        info!(job_id = %job.job_id, "Copying remainder segment");
        self.run_compose(&cmd).await?;

        let list = job.scratch_file("list.txt");
        tokio::fs::write(&list, build_concat_list([&head, &tail]))
            .await
            .map_err(|e| MediaError::workspace(&list, e))?;

        let cmd = FfmpegCommand::new(&job.output_path)
            .input_with(["-f", "concat", "-safe", "0"], &list)
            .codec_copy()
            .faststart();
        info!(job_id = %job.job_id, "Concatenating segments");
        self.run_compose(&cmd).await?;
        Ok(())
    }

    /// Encoder command shared by both strategies.
    fn overlay_command(&self, job: &CompositingJob, plan: &CompositePlan, output: &Path) -> FfmpegCommand {
        let filter = build_overlay_filter(plan.input.width, plan.geometry, plan.overlay_duration);

        FfmpegCommand::new(output)
            .input(&job.input_path)
            .input(&job.overlay_path)
            .filter_complex(filter)
            .map(format!("[{COMPOSITED_LABEL}]"))
            .map("0:a?")
            .encoding(&self.config.encoding)
    }

    /// Whether anything of the input lies beyond the overlay window.
    ///
    /// An unknown input duration is assumed to have a remainder.
    async fn has_remainder(&self, job: &CompositingJob, overlay_duration: f64) -> bool {
        match self.inspector.query_duration(&job.input_path).await {
            Ok(duration) => duration - overlay_duration > MIN_REMAINDER_SECS,
            Err(e) => {
                warn!(job_id = %job.job_id, error = %e, "Input duration unknown, assuming remainder");
                true
            }
        }
    }

    /// Run one encoder invocation under the compose timeout.
    async fn run_compose(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        let stage = CompositeStage::Compose;
        let output = ToolRunner::new(self.config.compose_timeout)
            .run_ffmpeg(&self.ffmpeg, cmd)
            .await
            .map_err(|e| e.at_stage(stage))?;

        metrics::histogram!("bclip_stage_duration_seconds", "stage" => stage.as_str())
            .record(output.elapsed.as_secs_f64());

        if !output.success() {
            let tail = output.stderr_tail();
            error!(stage = %stage, status = %output.status, stderr = %tail, "FFmpeg failed");
            return Err(MediaError::compositing(
                stage,
                format!("ffmpeg exited with {}", output.status),
                Some(tail),
            ));
        }
        Ok(())
    }
}

async fn check_readable(path: &Path, what: &str) -> MediaResult<()> {
    match tokio::fs::metadata(path).await {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(MediaError::compose_failed(
            format!("{what} not found: {}", path.display()),
            None,
        )),
    }
}

async fn remove_partial_output(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => warn!(path = %path.display(), "Removed unusable output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove unusable output"),
    }
}
