//! A hung encoder must be killed within its budget and leave nothing behind.
//!
//! Kept as the only test in this binary: it writes and executes a script,
//! which must not race with other tests forking.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use bclip_media::{CompositeStage, CompositingPipeline, PipelineConfig, ToolPath, Toolchain, WorkspaceManager};
use bclip_models::{CompositingJob, JobId, RequesterId};
use tempfile::TempDir;

#[tokio::test]
async fn test_hung_encoder_times_out_and_workspace_is_cleaned() {
    let root = TempDir::new().unwrap();
    let tools_dir = TempDir::new().unwrap();

    let fake_ffmpeg = tools_dir.path().join("ffmpeg");
    std::fs::write(&fake_ffmpeg, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&fake_ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

    let input = root.path().join("input.mp4");
    let overlay = root.path().join("overlay.mp4");
    std::fs::write(&input, b"video").unwrap();
    std::fs::write(&overlay, b"overlay").unwrap();

    let manager = WorkspaceManager::new(root.path().join("work")).await.unwrap();
    let job_id = JobId::from_string("hung");
    let workspace = manager.acquire(&job_id).await.unwrap();
    std::fs::write(workspace.scratch_file("part1.mp4"), b"partial").unwrap();

    let job = CompositingJob::new(
        job_id.clone(),
        RequesterId::from("tester"),
        &input,
        &overlay,
        workspace.dir(),
        manager.output_path(&job_id, "input.mp4"),
    );

    let tools = Toolchain {
        ffmpeg: ToolPath::new(&fake_ffmpeg),
        ffprobe: ToolPath::new("false"),
    };
    // Only the compose budget is short; encoder runs must be held to it.
    let config = PipelineConfig {
        compose_timeout: Duration::from_secs(1),
        verify_timeout: Duration::from_secs(120),
        ..PipelineConfig::default().with_uniform_timeout(Duration::from_secs(1))
    };
    let pipeline = CompositingPipeline::new(&tools, config);

    let started = Instant::now();
    let err = pipeline.compose(&job).await.unwrap_err();
    let elapsed = started.elapsed();

    assert_eq!(err.stage(), Some(CompositeStage::Timeout));
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    assert!(!job.output_path.exists());

    workspace.release().await.unwrap();
    assert!(!workspace.dir().exists());
    assert_eq!(manager.pending_outputs().await.unwrap(), 0);
}
