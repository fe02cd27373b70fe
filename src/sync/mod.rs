//! Glue between the CLI configuration and the sync engine.

pub mod auto_sync;

pub use auto_sync::try_auto_sync;

use lotes_core::{ContentClient, RemoteError, SyncEngine};

use crate::config::Config;

/// Builds an engine over the configured data directory and remote.
pub fn build_engine(config: &Config) -> Result<SyncEngine<ContentClient>, RemoteError> {
    let settings = config.sync_settings();
    let client = settings.client()?;
    Ok(SyncEngine::new(config.store(), settings, client))
}
