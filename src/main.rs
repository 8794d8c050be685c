//! canvas-sync CLI - headless shared-canvas client.
//!
//! This is the main binary entry point. See the `canvas_sync` library
//! for the core functionality.

use anyhow::{Context, Result};
use canvas_sync::{commands, Config, FramingMode};
use mimalloc::MiMalloc;
use std::path::PathBuf;

/// Global allocator configured per M-MIMALLOC-APPS guideline.
#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;
use clap::{Parser, Subcommand};

// CLI
#[derive(Parser)]
#[command(name = "canvas-sync")]
#[command(version)]
#[command(about = "Shared layered canvas client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a headless session, reading GUI commands as JSON from stdin
    Start {
        /// Do not connect to the relay
        #[arg(long)]
        offline: bool,
        /// Relay host (overrides config)
        #[arg(long)]
        host: Option<String>,
        /// Relay port (overrides config)
        #[arg(long)]
        port: Option<u16>,
        /// Framing mode for inbound traffic: legacy or string-aware
        #[arg(long)]
        framing: Option<FramingMode>,
    },
    /// Rebuild a picture from a recorded command stream and summarise it
    Replay {
        /// Path to the recording
        file: PathBuf,
    },
    /// Print the effective configuration
    Config,
}

fn main() -> Result<()> {
    // Log to a file so stdout stays clean for session output.
    // Use CANVAS_LOG_FILE or fall back to the temp dir
    let log_path = std::env::var("CANVAS_LOG_FILE")
        .map(PathBuf::from)
        .unwrap_or_else(|_| std::env::temp_dir().join("canvas-sync.log"));
    let log_file = std::fs::File::create(&log_path)
        .with_context(|| format!("Failed to create log file at {}", log_path.display()))?;
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .target(env_logger::Target::Pipe(Box::new(log_file)))
        .format_timestamp_secs()
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start {
            offline,
            host,
            port,
            framing,
        } => {
            let mut config = Config::load()?;
            if let Some(host) = host {
                config.host = host;
            }
            if let Some(port) = port {
                config.port = port;
            }
            if let Some(framing) = framing {
                config.framing = framing;
            }
            log::info!("canvas-sync v{} starting", env!("CARGO_PKG_VERSION"));

            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("Failed to build tokio runtime")?;
            runtime.block_on(commands::start::run(config, offline))?;
        }
        Commands::Replay { file } => {
            let config = Config::load()?;
            commands::replay::run(&file, &config)?;
        }
        Commands::Config => {
            let config = Config::load()?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}
