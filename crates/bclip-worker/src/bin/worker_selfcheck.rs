use std::path::Path;

use bclip_media::locator::LOCATE_TIMEOUT;
use bclip_media::{ToolPath, Toolchain};
use bclip_worker::WorkerConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = WorkerConfig::from_env()?;

    println!(
        "worker-selfcheck: starting with work_dir={}",
        config.work_dir.display()
    );
    ensure_workdir(&config.work_dir).await?;

    let tools = Toolchain::resolve(config.ffmpeg_path.clone(), config.ffprobe_path.clone()).await;
    ensure_tool(&tools.ffmpeg).await?;
    ensure_tool(&tools.ffprobe).await?;
    ensure_overlay(&config.overlay_path).await?;

    println!("worker-selfcheck: ok");
    Ok(())
}

async fn ensure_workdir(path: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(path).await?;
    let probe = path.join(".selfcheck");
    tokio::fs::write(&probe, b"ok")
        .await
        .map_err(|e| anyhow::anyhow!("work dir {} not writable: {}", path.display(), e))?;
    tokio::fs::remove_file(&probe).await?;
    Ok(())
}

async fn ensure_tool(tool: &ToolPath) -> anyhow::Result<()> {
    match tool.version_line(LOCATE_TIMEOUT).await {
        Some(version) => {
            println!("worker-selfcheck: {} -> {}", tool, version);
            Ok(())
        }
        None => Err(anyhow::anyhow!("{} -version failed", tool)),
    }
}

async fn ensure_overlay(path: &Path) -> anyhow::Result<()> {
    let present = tokio::fs::metadata(path).await.map(|m| m.is_file()).unwrap_or(false);
    if !present {
        return Err(anyhow::anyhow!("overlay asset missing at {}", path.display()));
    }
    Ok(())
}
