use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;
mod config;
mod sync;

use commands::{ConfigCommand, LotCommand, LotSubcommand, SyncCommand};
use config::Config;
use sync::try_auto_sync;

#[derive(Parser)]
#[command(name = "lotes")]
#[command(version)]
#[command(about = "Track cultivation lots and sync the shared ledger", long_about = None)]
struct Cli {
    /// Path to config file
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    /// Log sync activity to stderr
    #[arg(long, short, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create, inspect and edit lots
    Lot(LotCommand),

    /// Sync the ledger with the remote repository
    Sync(SyncCommand),

    /// Manage configuration
    Config(ConfigCommand),
}

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cli_config_path = cli.config.clone();
    let config = Config::load(cli.config)?;

    let result = execute_command(&cli.command, &config, cli_config_path);

    // Auto-sync AFTER write commands (only if command succeeded)
    if result.is_ok() && is_write_command(&cli.command) {
        try_auto_sync(&config);
    }

    result
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "lotes=info,lotes_core=info"
    } else {
        "lotes=warn,lotes_core=warn"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

fn execute_command(
    command: &Option<Commands>,
    config: &Config,
    cli_config_path: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Some(Commands::Lot(cmd)) => {
            cmd.run(config)?;
        }
        Some(Commands::Sync(cmd)) => {
            cmd.run(config)?;
        }
        Some(Commands::Config(cmd)) => {
            cmd.run(config, cli_config_path)?;
        }
        None => {
            println!("Use --help to see available commands");
        }
    }

    Ok(())
}

/// Returns true if the command changes the ledger and should be pushed after.
fn is_write_command(cmd: &Option<Commands>) -> bool {
    matches!(
        cmd,
        Some(Commands::Lot(l)) if matches!(l.command,
            LotSubcommand::Create { .. }
            | LotSubcommand::Edit { .. }
            | LotSubcommand::AddVariety { .. }
            | LotSubcommand::RemoveVariety { .. }
            | LotSubcommand::AdvanceWeeks)
    )
}
