//! Command-line driver for the Easel offline worker.
//!
//! ## Usage
//!
//! ```bash
//! # Install against the origin and check which assets are served from cache
//! easel warm /index.html /assets/script.js
//!
//! # Draw a demo stroke and save it, deferring the write as if offline
//! easel save --output canvas_image.png --offline
//!
//! # Show the effective configuration
//! easel --config worker.json config
//! ```

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use easel_common::{init_logging, LogConfig, LogFormat};
use easel_core::WorkerConfig;

mod commands;

#[derive(Parser)]
#[command(name = "easel")]
#[command(about = "Offline cache and deferred-save worker for the Easel paint app")]
struct Cli {
    /// Worker configuration file (JSON)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Log output format: pretty, compact or json
    #[arg(long, default_value = "pretty", global = true)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Install and activate the worker, then fetch paths through it
    Warm {
        /// Paths to fetch (defaults to the asset manifest)
        paths: Vec<String>,
    },

    /// Draw a demo stroke and save the canvas as PNG
    Save {
        /// Output PNG path
        #[arg(short, long, default_value = easel_canvas::DEFAULT_FILE_NAME)]
        output: PathBuf,
        /// Start offline; the save is deferred until connectivity returns
        #[arg(long)]
        offline: bool,
        /// Canvas width in pixels
        #[arg(long, default_value = "640")]
        width: u32,
        /// Canvas height in pixels
        #[arg(long, default_value = "480")]
        height: u32,
    },

    /// Print the effective configuration as JSON
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(LogConfig::for_verbosity(cli.verbose).with_format(cli.log_format))?;

    let path = cli.config.unwrap_or_else(WorkerConfig::default_path);
    let config = WorkerConfig::load(&path)?;

    match cli.command {
        Commands::Warm { paths } => commands::warm(config, paths).await?,
        Commands::Save {
            output,
            offline,
            width,
            height,
        } => commands::save(config, output, offline, width, height).await?,
        Commands::Config => println!("{}", serde_json::to_string_pretty(&config)?),
    }

    Ok(())
}
