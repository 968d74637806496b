//! CLI commands module.

mod config;
mod devices;
mod upscale;
mod util;
mod worker;

pub use config::ConfigCommand;
pub use devices::DevicesCommand;
pub use upscale::UpscaleCommand;
pub use worker::WorkerCommand;

pub(crate) use util::*;
