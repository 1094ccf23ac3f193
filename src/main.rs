//! EWIM - Early Warning Indicator Matrix
//!
//! Classifies drilling indicators against dynamically calibrated boundaries.
//!
//! # Usage
//!
//! ```bash
//! # Drive the engine with JSON frames on stdin, one per line
//! ./simulator | ewim run
//!
//! # Start a 60-tick baseline capture as soon as the engine is up
//! ./simulator | ewim run --capture-ticks 60
//!
//! # Inspect or reset persisted state
//! ewim show
//! ewim history
//! ewim reset
//! ```
//!
//! # Environment Variables
//!
//! - `EWIM_CONFIG`: Path to the TOML config file (default: ./ewim_config.toml)
//! - `RUST_LOG`: Logging level (default: info)

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::info;

use ewim::baseline::CaptureLimit;
use ewim::frames::{handle_frame, FrameEvent, FrameReader};
use ewim::storage::{BaselineHistory, BoundaryStore};
use ewim::{EngineConfig, Monitor};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "ewim")]
#[command(about = "EWIM dynamic threshold calibration and risk classification engine")]
#[command(version)]
struct CliArgs {
    /// Path to the TOML config file (overrides EWIM_CONFIG and ./ewim_config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the storage data directory
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: SubCommand,
}

#[derive(clap::Subcommand, Debug)]
enum SubCommand {
    /// Read JSON frames from stdin and write one JSON response per frame to stdout
    Run {
        /// Start a capture of this many ticks before the first frame
        #[arg(long, conflicts_with = "capture_secs")]
        capture_ticks: Option<usize>,

        /// Start a capture of this many seconds before the first frame
        #[arg(long)]
        capture_secs: Option<i64>,
    },

    /// Print the active boundaries
    Show,

    /// Print the stored baseline history
    History,

    /// Back up the boundary file and restore the configured defaults
    Reset,

    /// Print the effective configuration as TOML
    Config,
}

// ============================================================================
// Setup
// ============================================================================

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    // stdout carries responses, logs go to stderr
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn load_config(args: &CliArgs) -> Result<EngineConfig> {
    let mut config = match &args.config {
        Some(path) => EngineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path.display()))?,
        None => EngineConfig::load(),
    };
    if let Some(dir) = &args.data_dir {
        config.storage.data_dir.clone_from(dir);
    }
    Ok(config)
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

// ============================================================================
// Run Loop
// ============================================================================

async fn run(mut monitor: Monitor, cancel_token: CancellationToken) -> Result<()> {
    let mut reader = FrameReader::new(tokio::io::BufReader::new(tokio::io::stdin()));
    let mut stdout = tokio::io::stdout();
    let mut frames = 0u64;

    loop {
        let event = tokio::select! {
            _ = cancel_token.cancelled() => {
                info!(frames, "Shutdown requested");
                break;
            }
            event = reader.next_frame() => event.context("Failed to read from stdin")?,
        };

        let frame = match event {
            FrameEvent::Frame(frame) => frame,
            FrameEvent::Eof => {
                info!(frames, "Input closed");
                break;
            }
        };
        frames += 1;

        let response = handle_frame(&mut monitor, frame);
        let mut line = serde_json::to_string(&response).context("Failed to serialize response")?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await.context("Failed to write to stdout")?;
        stdout.flush().await.context("Failed to flush stdout")?;
    }

    Ok(())
}

// ============================================================================
// Main Entry Point
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.log_json);

    let config = load_config(&args)?;
    let data_dir = &config.storage.data_dir;

    match args.command {
        SubCommand::Run { capture_ticks, capture_secs } => {
            let mut monitor = Monitor::from_config(&config);

            let limit = match (capture_ticks, capture_secs) {
                (Some(n), _) => Some(CaptureLimit::Ticks(n)),
                (None, Some(secs)) => Some(CaptureLimit::seconds(secs).context("Invalid --capture-secs")?),
                (None, None) => None,
            };
            if let Some(limit) = limit {
                monitor.start_capture_with(limit).context("Failed to start baseline capture")?;
            }

            // Graceful shutdown via Ctrl+C
            let cancel_token = CancellationToken::new();
            let shutdown_token = cancel_token.clone();
            tokio::spawn(async move {
                tokio::signal::ctrl_c().await.ok();
                info!("Received Ctrl+C, shutting down");
                shutdown_token.cancel();
            });

            run(monitor, cancel_token).await?;
        }
        SubCommand::Show => {
            let store = BoundaryStore::new(data_dir, config.default_boundaries());
            print_json(&store.load())?;
        }
        SubCommand::History => {
            let history = BaselineHistory::new(data_dir, config.storage.history_capacity);
            print_json(&history.history())?;
        }
        SubCommand::Reset => {
            let store = BoundaryStore::new(data_dir, config.default_boundaries());
            let defaults = store.reset_to_defaults().context("Failed to reset boundaries")?;
            print_json(&defaults)?;
        }
        SubCommand::Config => {
            print!("{}", config.to_toml().context("Failed to render config")?);
        }
    }

    Ok(())
}
