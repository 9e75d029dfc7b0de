//! End-to-end compositing against a real ffmpeg install.
//!
//! A white overlay on a black input makes the bar measurable by luma.
//!
//! Run with `cargo test -p bclip-media -- --ignored`.

use std::path::Path;
use std::time::Duration;

use bclip_media::{
    CompositingPipeline, FfmpegCommand, MediaInspector, PipelineConfig, ToolRunner, Toolchain,
    WorkspaceManager,
};
use bclip_models::{CompositeStrategy, CompositingJob, JobId, RequesterId};
use tempfile::TempDir;

async fn synth(tools: &Toolchain, output: &Path, video: &str, audio: Option<&str>, secs: f64) {
    let mut cmd = FfmpegCommand::new(output).input_with(["-f", "lavfi"], video);
    if let Some(audio) = audio {
        cmd = cmd.input_with(["-f", "lavfi"], audio);
    }
    let cmd = cmd
        .duration(secs)
        .output_args(["-c:v", "libx264", "-pix_fmt", "yuv420p", "-g", "25"]);

    let output = ToolRunner::new(Duration::from_secs(60))
        .run_ffmpeg(&tools.ffmpeg, &cmd)
        .await
        .unwrap();
    assert!(output.success(), "{}", output.stderr_tail());
}

/// Mean luma of a `height`-row band starting at `y`, sampled at `at_secs`.
async fn band_luma(tools: &Toolchain, video: &Path, at_secs: f64, y: u32, height: u32) -> f64 {
    let frame = video.with_extension(format!("band_{y}_{at_secs}.gray"));
    let cmd = FfmpegCommand::new(&frame)
        .input_with(["-ss".to_string(), format!("{at_secs:.3}")], video)
        .output_args(["-frames:v", "1", "-f", "rawvideo", "-pix_fmt", "gray"])
        .output_arg("-vf")
        .output_arg(format!("crop=1280:{height}:0:{y}"));

    let output = ToolRunner::new(Duration::from_secs(60))
        .run_ffmpeg(&tools.ffmpeg, &cmd)
        .await
        .unwrap();
    assert!(output.success(), "{}", output.stderr_tail());

    let pixels = std::fs::read(&frame).unwrap();
    assert_eq!(pixels.len(), 1280 * height as usize);
    pixels.iter().map(|&p| p as f64).sum::<f64>() / pixels.len() as f64
}

async fn run_job(strategy: CompositeStrategy, with_audio: bool) {
    let root = TempDir::new().unwrap();
    let tools = Toolchain::resolve(None, None).await;

    let input = root.path().join("input.mp4");
    let overlay = root.path().join("overlay.mp4");
    synth(
        &tools,
        &input,
        "color=c=black:size=1280x720:rate=25",
        with_audio.then_some("sine=frequency=440"),
        8.0,
    )
    .await;
    synth(&tools, &overlay, "color=c=white:size=640x120:rate=25", None, 3.0).await;

    let manager = WorkspaceManager::new(root.path().join("work")).await.unwrap();
    let job_id = JobId::new();
    let workspace = manager.acquire(&job_id).await.unwrap();
    let job = CompositingJob::new(
        job_id.clone(),
        RequesterId::from("e2e"),
        &input,
        &overlay,
        workspace.dir(),
        manager.output_path(&job_id, "input.mp4"),
    );

    let config = PipelineConfig::default().with_strategy(strategy);
    let pipeline = CompositingPipeline::new(&tools, config);

    let plan = pipeline.plan(&job).await;
    assert_eq!(plan.geometry.bar_height, 45);
    assert_eq!(plan.geometry.overlay_y, 675);
    assert!((plan.overlay_duration - 3.0).abs() < 0.1);

    let output = pipeline.compose(&job).await.unwrap();
    workspace.release().await.unwrap();

    let inspector = MediaInspector::new(tools.ffprobe.clone());
    let probe = inspector.probe(&output).await;
    assert_eq!((probe.width, probe.height), (1280, 720));
    assert!((probe.duration_secs - 8.0).abs() < 0.1, "duration {}", probe.duration_secs);
    assert!(!workspace.dir().exists());

    // White bar across the bottom while the overlay runs, gone afterwards.
    let bar = band_luma(&tools, &output, 1.0, 675, 45).await;
    assert!(bar > 200.0, "bar luma at 1s: {bar}");
    let above = band_luma(&tools, &output, 1.0, 0, 675).await;
    assert!(above < 50.0, "picture above the bar at 1s: {above}");
    let after = band_luma(&tools, &output, 5.0, 675, 45).await;
    assert!(after < 50.0, "bar luma at 5s: {after}");
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_single_pass_preserves_duration() {
    run_job(CompositeStrategy::SinglePass, true).await;
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_single_pass_without_audio() {
    run_job(CompositeStrategy::SinglePass, false).await;
}

#[tokio::test]
#[ignore = "requires ffmpeg"]
async fn test_segment_concat_preserves_duration() {
    run_job(CompositeStrategy::SegmentConcat, true).await;
}
