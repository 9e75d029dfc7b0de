//! A job whose encoder hangs is killed, reported as a timeout, and leaves
//! no scratch files or held admission behind.
//!
//! Kept as the only test in this binary since it executes a script it just
//! wrote.

#![cfg(unix)]

use std::os::unix::fs::PermissionsExt;
use std::time::{Duration, Instant};

use bclip_media::{CompositeStage, MediaError, ToolPath, Toolchain};
use bclip_models::RequesterId;
use bclip_worker::{OverlayProcessor, OverlayRequest, WorkerConfig, WorkerError};
use tempfile::TempDir;

#[tokio::test]
async fn test_hung_job_times_out_and_cleans_up() {
    let root = TempDir::new().unwrap();
    let fake_ffmpeg = root.path().join("ffmpeg");
    std::fs::write(&fake_ffmpeg, "#!/bin/sh\nsleep 30\n").unwrap();
    std::fs::set_permissions(&fake_ffmpeg, std::fs::Permissions::from_mode(0o755)).unwrap();

    let overlay = root.path().join("overlay.mp4");
    let input = root.path().join("clip.mp4");
    std::fs::write(&overlay, b"overlay").unwrap();
    std::fs::write(&input, b"video").unwrap();

    let config = WorkerConfig {
        work_dir: root.path().join("work"),
        overlay_path: overlay,
        compose_timeout: Duration::from_secs(1),
        probe_timeout: Duration::from_secs(1),
        verify_timeout: Duration::from_secs(1),
        ..WorkerConfig::default()
    };
    let tools = Toolchain {
        ffmpeg: ToolPath::new(&fake_ffmpeg),
        ffprobe: ToolPath::new("false"),
    };
    let processor = OverlayProcessor::with_toolchain(config, tools).await.unwrap();
    let user = RequesterId::from("sleeper");

    let started = Instant::now();
    let err = processor
        .process(OverlayRequest::new(user.clone(), &input))
        .await
        .unwrap_err();
    let elapsed = started.elapsed();

    match &err {
        WorkerError::Media(e @ MediaError::Compositing { .. }) => {
            assert_eq!(e.stage(), Some(CompositeStage::Timeout))
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(elapsed < Duration::from_secs(10), "took {elapsed:?}");
    assert!(err.user_message().contains("took too long"));

    let scratch = root.path().join("work").join("scratch");
    assert_eq!(std::fs::read_dir(&scratch).unwrap().count(), 0);
    assert_eq!(processor.workspaces().pending_outputs().await.unwrap(), 0);
    assert!(!processor.guard().is_active(&user));
    assert!(input.exists());
}
