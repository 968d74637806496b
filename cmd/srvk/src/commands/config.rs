//! Profile management commands.

use clap::{Args, Subcommand};
use srvk_cli::Profile;

use super::{get_config, output_result, print_success, EngineArgs};
use crate::Cli;

/// Manage engine profiles.
///
/// A profile stores engine settings (device, model, scale, tile size, TTA,
/// backend) and isolated-mode settings under a name.
///
/// Configuration is stored in ~/.srvk/config.yaml
#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    command: ConfigSubcommand,
}

#[derive(Subcommand)]
enum ConfigSubcommand {
    /// Add or replace a profile
    #[command(name = "add-profile")]
    AddProfile {
        /// Profile name
        name: String,
        #[command(flatten)]
        engine: EngineArgs,
    },
    /// Delete a profile
    #[command(name = "delete-profile")]
    DeleteProfile {
        /// Profile name
        name: String,
    },
    /// Set the current profile
    #[command(name = "use-profile")]
    UseProfile {
        /// Profile name
        name: String,
    },
    /// Display the current profile
    #[command(name = "get-profile")]
    GetProfile,
    /// List all profiles
    #[command(name = "list-profiles", alias = "get-profiles")]
    ListProfiles,
    /// View the current configuration
    View,
}

impl ConfigCommand {
    pub async fn run(&self, cli: &Cli) -> anyhow::Result<()> {
        match &self.command {
            ConfigSubcommand::AddProfile { name, engine } => {
                let mut cfg = get_config(cli)?;
                let mut profile = Profile::default();
                engine.apply(&mut profile);
                cfg.add_profile(name, profile)?;
                print_success(&format!("Profile \"{}\" added successfully", name));
                Ok(())
            }

            ConfigSubcommand::DeleteProfile { name } => {
                let mut cfg = get_config(cli)?;
                cfg.delete_profile(name)?;
                print_success(&format!("Profile \"{}\" deleted", name));
                Ok(())
            }

            ConfigSubcommand::UseProfile { name } => {
                let mut cfg = get_config(cli)?;
                cfg.use_profile(name)?;
                print_success(&format!("Switched to profile \"{}\"", name));
                Ok(())
            }

            ConfigSubcommand::GetProfile => {
                let cfg = get_config(cli)?;
                if cfg.current_profile.is_empty() {
                    println!("No current profile set");
                } else {
                    println!("{}", cfg.current_profile);
                }
                Ok(())
            }

            ConfigSubcommand::ListProfiles => {
                let cfg = get_config(cli)?;

                if cfg.profiles.is_empty() {
                    println!("No profiles configured");
                    return Ok(());
                }

                println!(
                    "{:<8} {:<16} {:<20} {:<6} {:<6} {:<10} {}",
                    "CURRENT", "NAME", "MODEL", "SCALE", "GPU", "BACKEND", "ISOLATED"
                );
                for name in cfg.list_profiles() {
                    let Some(profile) = cfg.get_profile(name) else {
                        continue;
                    };
                    let current = if name == cfg.current_profile { "*" } else { "" };
                    println!(
                        "{:<8} {:<16} {:<20} {:<6} {:<6} {:<10} {}",
                        current,
                        name,
                        profile.engine.model,
                        profile.engine.scale,
                        profile.engine.gpuid,
                        profile.engine.backend.as_str(),
                        profile.isolated
                    );
                }
                Ok(())
            }

            ConfigSubcommand::View => {
                let cfg = get_config(cli)?;
                eprintln!("Config file: {}", cfg.path().display());
                output_result(cli, &cfg)
            }
        }
    }
}
