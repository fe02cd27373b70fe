//! Sync orchestrator.
//!
//! Decides for each interaction with the remote whether to apply, no-op,
//! reject or stop with a conflict. Change detection relies only on content
//! hashes and the last agreed pair stored in [`crate::meta::SyncMeta`].
//!
//! ## Operations
//!
//! - **pull**: bring the local ledger up to date, never dropping local edits
//!   without a snapshot
//! - **push**: publish the local ledger guarded by the remote version token
//! - **startup restore**: pull, or fall back to the newest local backup when
//!   offline
//! - **publish backup**: upload a chosen backup as the new remote content
//! - **clear local data**: disconnect the working copy and block uploads

mod engine;
mod error;
mod report;
mod settings;

pub use engine::SyncEngine;
pub use error::{ErrorKind, SyncError};
pub use report::{SyncOutcome, SyncReport, SyncState, SyncStatus};
pub use settings::SyncSettings;
