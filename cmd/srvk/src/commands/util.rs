//! Utility functions for CLI commands.

use std::path::PathBuf;

use clap::Args;
use srvk_cli::{load_config, Config, Output, OutputFormat, Profile};
use srvk_sr::BackendKind;

use crate::Cli;

/// Loads the configuration.
pub fn get_config(cli: &Cli) -> anyhow::Result<Config> {
    load_config(cli.config.as_deref())
}

/// Gets the profile to use: `--profile`, then the current profile, then defaults.
pub fn get_profile(cli: &Cli) -> anyhow::Result<Profile> {
    let cfg = get_config(cli)?;
    cfg.resolve_profile(cli.profile.as_deref()).map_err(|e| {
        anyhow::anyhow!("{e}. Use 'srvk config list-profiles' to see available profiles")
    })
}

/// Writes a report as YAML, or JSON with `--json`.
pub fn output_result<T: serde::Serialize>(cli: &Cli, result: &T) -> anyhow::Result<()> {
    let format = if cli.json {
        OutputFormat::Json
    } else {
        OutputFormat::Yaml
    };
    Output::new(format, cli.output.clone()).write(result)
}

/// Prints success message.
pub fn print_success(msg: &str) {
    eprintln!("\x1b[32m✓\x1b[0m {}", msg);
}

/// Engine settings shared by `upscale` and `config add-profile`.
#[derive(Args, Debug, Clone, Default)]
pub struct EngineArgs {
    /// GPU device index
    #[arg(short = 'g', long = "gpu")]
    pub gpuid: Option<i32>,

    /// Model name or model directory (models-DF2K, models-DF2K_JPEG)
    #[arg(short = 'm', long)]
    pub model: Option<String>,

    /// Upscale factor
    #[arg(short = 's', long)]
    pub scale: Option<u32>,

    /// Tile size (0 = pick from the device heap budget)
    #[arg(short = 't', long = "tile")]
    pub tilesize: Option<u32>,

    /// Enable test-time augmentation
    #[arg(short = 'x', long)]
    pub tta: bool,

    /// Explicit .param file (needs --bin)
    #[arg(long = "param", requires = "bin_path")]
    pub param_path: Option<PathBuf>,

    /// Explicit .bin file (needs --param)
    #[arg(long = "bin", requires = "param_path")]
    pub bin_path: Option<PathBuf>,

    /// Engine backend (vulkan, reference)
    #[arg(long)]
    pub backend: Option<BackendKind>,

    /// Extra directory to search for named models (repeatable)
    #[arg(long = "models-dir")]
    pub search_roots: Vec<PathBuf>,

    /// Run every image in a worker process
    #[arg(long)]
    pub isolated: bool,

    /// Per-image timeout in isolated mode, in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Worker processes in isolated mode
    #[arg(long)]
    pub workers: Option<usize>,
}

impl EngineArgs {
    /// Overrides `profile` with the flags that were given.
    pub fn apply(&self, profile: &mut Profile) {
        let engine = &mut profile.engine;
        if let Some(gpuid) = self.gpuid {
            engine.gpuid = gpuid;
        }
        if let Some(model) = &self.model {
            engine.model = model.clone();
        }
        if let Some(scale) = self.scale {
            engine.scale = scale;
        }
        if let Some(tilesize) = self.tilesize {
            engine.tilesize = tilesize;
        }
        if self.tta {
            engine.tta_mode = true;
        }
        if let (Some(param), Some(bin)) = (&self.param_path, &self.bin_path) {
            engine.param_path = Some(param.clone());
            engine.bin_path = Some(bin.clone());
        }
        if let Some(backend) = self.backend {
            engine.backend = backend;
        }
        engine.search_roots.extend(self.search_roots.iter().cloned());

        if self.isolated {
            profile.isolated = true;
        }
        if let Some(timeout) = self.timeout {
            profile.timeout_secs = timeout;
        }
        if let Some(workers) = self.workers {
            profile.workers = workers;
        }
    }
}
