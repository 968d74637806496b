//! Device listing command.

use clap::Args;
use serde::Serialize;
use srvk_sr::{BackendKind, ModelFamily};

use super::{get_profile, output_result};
use crate::Cli;

/// List devices with their heap budget and the tile size it selects.
#[derive(Args)]
pub struct DevicesCommand {
    /// Engine backend (default: from the profile)
    #[arg(long)]
    backend: Option<BackendKind>,

    /// Model whose tiling policy to report (default: from the profile)
    #[arg(short = 'm', long)]
    model: Option<String>,
}

#[derive(Debug, Serialize)]
struct DeviceList {
    backend: String,
    model: String,
    gpu_count: i32,
    devices: Vec<Device>,
}

#[derive(Debug, Serialize)]
struct Device {
    gpuid: i32,
    heap_budget_mb: u32,
    tilesize: u32,
    prepadding: u32,
}

impl DevicesCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        let profile = get_profile(cli)?;
        let kind = self.backend.unwrap_or(profile.engine.backend);
        let model = self.model.clone().unwrap_or(profile.engine.model);
        let family = ModelFamily::from_model(&model)?;

        let backend = kind.backend()?;
        let gpu_count = backend.gpu_count()?;
        let mut devices = Vec::new();
        for gpuid in 0..gpu_count {
            let heap_budget_mb = backend.heap_budget(gpuid)?;
            devices.push(Device {
                gpuid,
                heap_budget_mb,
                tilesize: family.tile_size_for_budget(heap_budget_mb),
                prepadding: family.prepadding(),
            });
        }

        output_result(
            cli,
            &DeviceList {
                backend: kind.to_string(),
                model: family.to_string(),
                gpu_count,
                devices,
            },
        )
    }
}
