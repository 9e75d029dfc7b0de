//! Overlay compositing worker binary.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use bclip_models::RequesterId;
use bclip_worker::{OverlayProcessor, OverlayRequest, WorkerConfig};

#[derive(Parser)]
#[command(name = "bclip-worker")]
#[command(about = "Adds the overlay banner to the start of a video", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Composite the overlay onto one video
    Process {
        /// Input video path
        #[arg(short, long)]
        input: PathBuf,

        /// Identity the job is accounted to
        #[arg(short, long, default_value = "cli")]
        requester: String,

        /// Output file name (defaults to the input's name)
        #[arg(short, long)]
        name: Option<String>,
    },

    /// Print the worker status report as JSON
    Status,
}

fn init_tracing() -> anyhow::Result<()> {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::from_default_env().add_directive("bclip=info".parse()?);

    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json())
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_ansi(true)
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .with(env_filter)
            .init();
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing()?;

    let cli = Cli::parse();

    let config = WorkerConfig::from_env()?;
    info!("Worker config: {:?}", config);

    let processor = OverlayProcessor::new(config).await?;

    match cli.command {
        Commands::Process {
            input,
            requester,
            name,
        } => {
            let mut request = OverlayRequest::new(RequesterId::new(requester), input);
            if let Some(name) = name {
                request = request.with_name(name);
            }

            match processor.process(request).await {
                Ok(output) => println!("{}", output.display()),
                Err(e) => {
                    error!(kind = e.kind(), "Processing failed: {}", e);
                    eprintln!("{}", e.user_message());
                    std::process::exit(1);
                }
            }
        }
        Commands::Status => {
            let status = processor.status().await;
            println!("{}", serde_json::to_string_pretty(&status)?);
        }
    }

    Ok(())
}
