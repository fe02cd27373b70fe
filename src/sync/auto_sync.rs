//! Auto-sync after write commands.
//!
//! When `sync.auto_sync` is enabled, every successful ledger write is followed
//! by a push. Failures are reported as warnings and never fail the write.

use crate::config::Config;

use super::build_engine;

/// Pushes the local ledger if auto-sync is enabled and sync is configured.
pub fn try_auto_sync(config: &Config) {
    if !config.sync.auto_sync || !config.sync.is_configured() {
        return;
    }

    let rt = match tokio::runtime::Runtime::new() {
        Ok(rt) => rt,
        Err(_) => return,
    };

    let mut engine = match build_engine(config) {
        Ok(engine) => engine,
        Err(e) => {
            eprintln!("Auto-sync: {}", e);
            return;
        }
    };

    let report = rt.block_on(engine.push(false));
    if report.is_success() {
        tracing::info!("Auto-sync: {}", report.message);
    } else {
        eprintln!("Auto-sync: {}", report.message);
        for backup in &report.backups {
            eprintln!("  backup: {}", backup.display());
        }
    }
}
