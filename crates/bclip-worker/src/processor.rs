//! Job orchestration.
//!
//! One request flows through:
//! 1. Admission (one in-flight job per requester)
//! 2. Overlay and input checks
//! 3. Workspace acquisition
//! 4. Compositing and verification
//! 5. Workspace release
//!
//! The admission permit and the workspace are both scoped, so every exit
//! path releases the requester and purges scratch files.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Instrument};

use bclip_media::locator::LOCATE_TIMEOUT;
use bclip_media::{CompositingPipeline, Toolchain, WorkspaceManager};
use bclip_models::{CompositingJob, JobId, RequesterId};

use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::guard::JobGuard;
use crate::logging::JobLogger;
use crate::metrics;

/// What a caller asks the worker to do.
#[derive(Debug, Clone)]
pub struct OverlayRequest {
    pub requester: RequesterId,
    /// Video supplied by the requester; never modified or deleted here
    pub input_path: PathBuf,
    /// Name the requester wants the result to carry
    pub desired_name: Option<String>,
}

impl OverlayRequest {
    pub fn new(requester: RequesterId, input_path: impl Into<PathBuf>) -> Self {
        Self {
            requester,
            input_path: input_path.into(),
            desired_name: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.desired_name = Some(name.into());
        self
    }

    fn output_name(&self) -> String {
        self.desired_name.clone().unwrap_or_else(|| {
            self.input_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        })
    }
}

/// Snapshot of worker health for operators.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub overlay_path: PathBuf,
    pub overlay_present: bool,
    pub ffmpeg_path: String,
    pub ffmpeg_version: Option<String>,
    pub active_jobs: usize,
    pub max_input_bytes: u64,
    pub pending_outputs: usize,
    pub checked_at: DateTime<Utc>,
}

/// Runs overlay jobs end to end.
pub struct OverlayProcessor {
    config: WorkerConfig,
    tools: Toolchain,
    pipeline: CompositingPipeline,
    workspaces: WorkspaceManager,
    guard: JobGuard,
}

impl OverlayProcessor {
    /// Resolve the tools, prepare the work directory and sweep orphans.
    pub async fn new(config: WorkerConfig) -> WorkerResult<Self> {
        let tools = Toolchain::resolve(config.ffmpeg_path.clone(), config.ffprobe_path.clone()).await;
        Self::with_toolchain(config, tools).await
    }

    /// Like [`OverlayProcessor::new`] with an already resolved toolchain.
    pub async fn with_toolchain(config: WorkerConfig, tools: Toolchain) -> WorkerResult<Self> {
        config.validate()?;

        let workspaces = WorkspaceManager::new(&config.work_dir).await?;
        workspaces.purge_orphans().await?;

        if !is_regular_file(&config.overlay_path).await {
            warn!(
                path = %config.overlay_path.display(),
                "Overlay asset missing, every job will fail until it is provisioned"
            );
        }

        info!(
            ffmpeg = %tools.ffmpeg,
            ffprobe = %tools.ffprobe,
            work_dir = %config.work_dir.display(),
            strategy = %config.strategy,
            "Overlay processor ready"
        );

        Ok(Self {
            pipeline: CompositingPipeline::new(&tools, config.pipeline_config()),
            config,
            tools,
            workspaces,
            guard: JobGuard::new(),
        })
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn guard(&self) -> &JobGuard {
        &self.guard
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    /// Process one request, returning the finished output.
    ///
    /// Ownership of the returned file passes to the caller, who should
    /// [`discard`](Self::discard) it once delivered.
    pub async fn process(&self, request: OverlayRequest) -> WorkerResult<PathBuf> {
        let Some(permit) = self.guard.admit(&request.requester) else {
            let err = WorkerError::ConcurrencyRejected(request.requester.to_string());
            metrics::record_job_rejected(err.kind());
            info!(requester = %request.requester, "Rejected: job already in progress");
            return Err(err);
        };
        metrics::record_job_admitted();
        metrics::set_active_jobs(self.guard.active_count());

        let job_id = JobId::new();
        let logger = JobLogger::new(&job_id, &request.requester);
        let started = Instant::now();

        let result = self
            .run_job(&job_id, &request, &logger)
            .instrument(logger.create_span())
            .await;

        let elapsed = started.elapsed();
        match &result {
            Ok(output) => {
                metrics::record_job_completed(elapsed.as_secs_f64());
                logger.log_completion(&output.display().to_string(), elapsed.as_millis() as u64);
            }
            Err(e) => {
                metrics::record_job_failed(e.kind(), elapsed.as_secs_f64());
                logger.log_error(e.kind(), &e.to_string());
            }
        }

        drop(permit);
        metrics::set_active_jobs(self.guard.active_count());
        result
    }

    async fn run_job(
        &self,
        job_id: &JobId,
        request: &OverlayRequest,
        logger: &JobLogger,
    ) -> WorkerResult<PathBuf> {
        logger.log_start(&request.input_path.display().to_string());

        self.check_overlay().await?;
        let input_bytes = self.validate_input(&request.input_path).await?;
        logger.log_progress(&format!("input accepted ({input_bytes} bytes)"));

        let workspace = self.workspaces.acquire(job_id).await?;
        let job = CompositingJob::new(
            job_id.clone(),
            request.requester.clone(),
            &request.input_path,
            &self.config.overlay_path,
            workspace.dir(),
            self.workspaces.output_path(job_id, &request.output_name()),
        );

        let result = self.pipeline.compose(&job).await;

        if let Err(e) = workspace.release().await {
            logger.log_warning(&format!("workspace release failed: {e}"));
        }

        Ok(result?)
    }

    async fn check_overlay(&self) -> WorkerResult<()> {
        if is_regular_file(&self.config.overlay_path).await {
            Ok(())
        } else {
            Err(WorkerError::OverlayUnavailable(
                self.config.overlay_path.display().to_string(),
            ))
        }
    }

    /// Check that `path` is an acceptable input, returning its size.
    pub async fn validate_input(&self, path: &Path) -> WorkerResult<u64> {
        let metadata = match tokio::fs::metadata(path).await {
            Ok(m) if m.is_file() => m,
            Ok(_) => return Err(WorkerError::input_rejected("not a regular file")),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(WorkerError::input_rejected("file not found"));
            }
            Err(e) => return Err(e.into()),
        };

        let extension = path
            .extension()
            .map(|e| e.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        if !self.config.allowed_extensions.iter().any(|a| *a == extension) {
            return Err(WorkerError::input_rejected(format!(
                "only {} files are accepted",
                self.config.allowed_extensions.join(", ")
            )));
        }

        let size = metadata.len();
        if size == 0 {
            return Err(WorkerError::input_rejected("file is empty"));
        }
        if size > self.config.max_input_bytes {
            return Err(WorkerError::input_rejected(format!(
                "file is {} MB, the limit is {} MB",
                size / 1_000_000,
                self.config.max_input_bytes / 1_000_000
            )));
        }
        Ok(size)
    }

    /// Current health snapshot.
    pub async fn status(&self) -> StatusReport {
        let pending_outputs = match self.workspaces.pending_outputs().await {
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "Failed to count pending outputs");
                0
            }
        };

        StatusReport {
            overlay_path: self.config.overlay_path.clone(),
            overlay_present: is_regular_file(&self.config.overlay_path).await,
            ffmpeg_path: self.tools.ffmpeg.to_string(),
            ffmpeg_version: self.tools.ffmpeg.version_line(LOCATE_TIMEOUT).await,
            active_jobs: self.guard.active_count(),
            max_input_bytes: self.config.max_input_bytes,
            pending_outputs,
            checked_at: Utc::now(),
        }
    }

    /// Delete a delivered file. Missing files are not an error.
    pub async fn discard(&self, path: &Path) -> WorkerResult<()> {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                info!(path = %path.display(), "Discarded delivered file");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

async fn is_regular_file(path: &Path) -> bool {
    tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false)
}
