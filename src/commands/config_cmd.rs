use clap::{Args, Subcommand};
use std::path::PathBuf;

use super::OutputFormat;
use crate::config::{masked, normalize_user, save_user, Config};

#[derive(Args)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub command: ConfigSubcommand,
}

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show current configuration values
    Show {
        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },

    /// Set the user name recorded in remote commits
    SetUser {
        /// Full name; capitalization is normalized
        name: String,
    },
}

impl ConfigCommand {
    pub fn run(
        &self,
        config: &Config,
        cli_config_path: Option<PathBuf>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            ConfigSubcommand::Show { format } => {
                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(config)?);
                    }
                    OutputFormat::Text => print_config(config),
                }
                Ok(())
            }

            ConfigSubcommand::SetUser { name } => {
                let user = normalize_user(name);
                if user.is_empty() {
                    return Err("User name cannot be empty".into());
                }

                let path = cli_config_path
                    .or_else(|| config.config_file.clone())
                    .unwrap_or_else(Config::default_config_path);
                save_user(&path, &user)?;

                println!("User set to '{}' in {}", user, path.display());
                Ok(())
            }
        }
    }
}

fn print_config(config: &Config) {
    println!("Configuration");
    println!("=============\n");

    if let Some(path) = &config.config_file {
        println!("Config file: {}", path.display());
    } else {
        println!(
            "Config file: {} (not found)",
            Config::default_config_path().display()
        );
    }
    println!();

    println!("data_dir: {}", config.data_dir.value.display());
    println!("  source: {}", config.data_dir.source);
    println!();

    println!(
        "user: {}",
        config.user.value.as_deref().unwrap_or("(not set)")
    );
    println!("  source: {}", config.user.source);
    println!();

    let settings = config.sync_settings();
    println!("sync:");
    println!(
        "  repo:      {}",
        config.sync.repo.as_deref().unwrap_or("(not set)")
    );
    println!(
        "  token:     {}",
        config
            .sync
            .token
            .as_deref()
            .map(masked)
            .unwrap_or_else(|| "(not set)".to_string())
    );
    println!("  branch:    {}", settings.branch);
    println!("  file_path: {}", settings.file_path);
    println!("  api_base:  {}", settings.api_base);
    println!(
        "  auto_sync: {}",
        if config.sync.auto_sync {
            "enabled"
        } else {
            "disabled"
        }
    );
}
