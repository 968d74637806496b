//! Hidden worker entry point for isolated mode.

use clap::Args;

use crate::Cli;

/// Serve one request on stdin/stdout and exit.
///
/// Spawned by the worker pool; not meant to be run by hand.
#[derive(Args)]
pub struct WorkerCommand {}

impl WorkerCommand {
    pub async fn run(&self, _cli: &Cli) -> anyhow::Result<()> {
        srvk_sr::worker::serve_stdio().await?;
        Ok(())
    }
}
