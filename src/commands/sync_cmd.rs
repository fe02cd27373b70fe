//! Sync CLI commands for exchanging the ledger with the remote repository.

use clap::{Args, Subcommand};
use std::path::PathBuf;

use lotes_core::{ContentClient, RemoteError, SyncEngine, SyncError, SyncReport, SyncStatus};

use crate::config::{masked, Config};
use crate::sync::build_engine;

/// Sync with the remote repository
#[derive(Debug, Args)]
pub struct SyncCommand {
    #[command(subcommand)]
    command: SyncSubcommand,
}

#[derive(Debug, Subcommand)]
enum SyncSubcommand {
    /// Bring the local ledger up to date from the remote
    Pull,

    /// Upload the local ledger
    Push {
        /// Upload even if the remote changed, the ledger is empty or the
        /// remote file doesn't exist yet
        #[arg(long)]
        force: bool,
    },

    /// Pull, or restore the newest local backup when offline
    Startup,

    /// Show sync configuration and local sync state
    Status,

    /// Replace the local ledger with the newest local backup
    RestoreBackup,

    /// Upload a backup file as the new remote content
    PublishBackup {
        /// Backup file to publish
        file: PathBuf,

        /// Create the remote file if it doesn't exist
        #[arg(long)]
        allow_create: bool,
    },

    /// Disconnect local data from sync and block uploads
    ClearLocal {
        /// Confirm; uploads stay blocked until the sentinel file is removed by hand
        #[arg(long)]
        yes: bool,
    },
}

impl SyncCommand {
    pub fn run(&self, config: &Config) -> Result<(), SyncCommandError> {
        let rt = tokio::runtime::Runtime::new()
            .map_err(|e| SyncCommandError::RuntimeError(e.to_string()))?;
        let mut engine = build_engine(config)?;

        let report = match &self.command {
            SyncSubcommand::Pull => rt.block_on(engine.pull()),
            SyncSubcommand::Push { force } => rt.block_on(engine.push(*force)),
            SyncSubcommand::Startup => rt.block_on(engine.startup_restore()),
            SyncSubcommand::RestoreBackup => engine.restore_latest_backup(),
            SyncSubcommand::PublishBackup { file, allow_create } => {
                rt.block_on(engine.publish_backup(file, *allow_create))
            }
            SyncSubcommand::ClearLocal { yes } => {
                if !*yes {
                    return Err(SyncCommandError::ConfirmationRequired);
                }
                engine.clear_local_data()
            }
            SyncSubcommand::Status => {
                let status = engine.status()?;
                print_status(config, &engine, &status);
                return Ok(());
            }
        };

        finish(report)
    }
}

/// Prints a successful report, or turns a failed one into an error.
fn finish(report: SyncReport) -> Result<(), SyncCommandError> {
    if report.is_success() {
        println!("✓ {}", report.message);
        for backup in &report.backups {
            println!("  backup: {}", backup.display());
        }
        return Ok(());
    }

    if !report.backups.is_empty() {
        println!("Backups saved for review:");
        for backup in &report.backups {
            println!("  {}", backup.display());
        }
    }
    Err(SyncCommandError::Failed(report))
}

fn print_status(config: &Config, engine: &SyncEngine<ContentClient>, status: &SyncStatus) {
    println!("Sync Configuration");
    println!("==================");
    println!();

    let settings = engine.settings();
    if !config.sync.is_configured() {
        println!("Status: Not configured");
        println!();
        println!("To enable sync, add to your config file:");
        println!();
        println!("  sync:");
        println!("    repo: \"owner/name\"");
        println!("    token: \"your-token\"");
        println!();
        println!("Or set environment variables:");
        println!("  LOTES_REPO");
        println!("  LOTES_TOKEN");
    } else {
        println!("Repository: {}", settings.repo().unwrap_or("(invalid)"));
        println!("File:       {}", settings.file_path);
        println!("Branch:     {}", status.branch);
        println!(
            "Token:      {}",
            settings.token().map(masked).unwrap_or_default()
        );
        println!("User:       {}", settings.user().unwrap_or("(not set)"));
        println!(
            "Auto-sync:  {}",
            if config.sync.auto_sync {
                "enabled"
            } else {
                "disabled"
            }
        );
    }
    println!();

    println!("Local State");
    println!("===========");
    println!();
    println!("Data dir:      {}", engine.store().data_dir().display());

    let local = if status.local_hash.is_empty() {
        "missing"
    } else if status.local_changed() {
        "changed since last sync"
    } else {
        "in sync with last agreed state"
    };
    println!("Local ledger:  {}", local);
    println!(
        "Last agreed:   {}",
        status.meta.remote().map(short_hash).unwrap_or("(never)")
    );
    println!(
        "Latest backup: {}",
        status
            .latest_backup
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "(none)".to_string())
    );

    match &status.kill_switch {
        Some(record) => {
            let since = record
                .engaged_at
                .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                .unwrap_or_else(|| "unknown time".to_string());
            println!("Uploads:       ✗ blocked since {}", since);
            println!(
                "               remove {} manually to re-enable",
                record.sentinel.display()
            );
        }
        None => println!("Uploads:       enabled"),
    }
}

fn short_hash(hash: &str) -> &str {
    &hash[..hash.len().min(12)]
}

/// Errors from sync commands
#[derive(Debug)]
pub enum SyncCommandError {
    RuntimeError(String),
    Remote(RemoteError),
    Sync(SyncError),
    /// The operation ran and did not succeed.
    Failed(SyncReport),
    ConfirmationRequired,
}

impl std::fmt::Display for SyncCommandError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncCommandError::RuntimeError(e) => write!(f, "Failed to start runtime: {}", e),
            SyncCommandError::Remote(e) => write!(f, "{}", e),
            SyncCommandError::Sync(e) => write!(f, "{}", e),
            SyncCommandError::Failed(report) => {
                if report.requires_decision() {
                    write!(f, "{} [{}; manual decision required]", report.message, report.state)
                } else {
                    write!(f, "{} [{}]", report.message, report.state)
                }
            }
            SyncCommandError::ConfirmationRequired => write!(
                f,
                "Clearing local data blocks uploads until the sentinel file is removed by hand; pass --yes to confirm"
            ),
        }
    }
}

impl std::error::Error for SyncCommandError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SyncCommandError::Remote(e) => Some(e),
            SyncCommandError::Sync(e) => Some(e),
            _ => None,
        }
    }
}

impl From<RemoteError> for SyncCommandError {
    fn from(e: RemoteError) -> Self {
        SyncCommandError::Remote(e)
    }
}

impl From<SyncError> for SyncCommandError {
    fn from(e: SyncError) -> Self {
        SyncCommandError::Sync(e)
    }
}
