//! CLI support for srvk.
//!
//! Named engine profiles stored in `~/.srvk/config.yaml` and YAML/JSON
//! result output.

pub mod config;
pub mod output;
pub mod paths;

pub use config::{load_config, save_config, Config, Profile};
pub use output::{Output, OutputFormat};
pub use paths::Paths;
