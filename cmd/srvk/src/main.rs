//! srvk - image super-resolution over ncnn-vulkan.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ConfigCommand, DevicesCommand, UpscaleCommand, WorkerCommand};

/// srvk - image super-resolution over ncnn-vulkan.
///
/// Upscales images with the DF2K model family on a Vulkan device. Engine
/// settings can be stored as named profiles in ~/.srvk/config.yaml; command
/// line flags override the selected profile.
///
/// Logs go to stderr. Use -v for debug logs or RUST_LOG for finer control.
#[derive(Parser)]
#[command(name = "srvk")]
#[command(about = "Image super-resolution over ncnn-vulkan")]
#[command(version)]
pub struct Cli {
    /// Config file (default is ~/.srvk/config.yaml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Profile name to use
    #[arg(short = 'p', long, global = true)]
    pub profile: Option<String>,

    /// Output file for reports (default: stdout)
    #[arg(short = 'o', long = "output", id = "report_output", global = true)]
    pub output: Option<PathBuf>,

    /// Output as JSON (for piping)
    #[arg(long, global = true)]
    pub json: bool,

    /// Verbose output
    #[arg(short = 'v', long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Upscale an image or a directory of images
    Upscale(UpscaleCommand),
    /// List devices with their heap budget and tile size
    Devices(DevicesCommand),
    /// Manage engine profiles
    Config(ConfigCommand),
    /// Serve one isolated request on stdin/stdout
    #[command(hide = true)]
    Worker(WorkerCommand),
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Stdout carries the worker protocol and reports, so logs go to stderr.
    let default_level = if cli.verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    let result = match &cli.command {
        Commands::Upscale(cmd) => cmd.run(&cli).await,
        Commands::Devices(cmd) => cmd.run(&cli).await,
        Commands::Config(cmd) => cmd.run(&cli).await,
        Commands::Worker(cmd) => cmd.run(&cli).await,
    };

    // Every engine has been dropped by now.
    #[cfg(feature = "vulkan")]
    srvk_sr::release_gpu_instance();

    result
}
