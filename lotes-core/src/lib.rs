//! Lotes Core Library
//!
//! Lot ledger model, local persistence and the content sync engine shared by
//! Lotes front ends.

pub mod backup;
pub mod hash;
pub mod kill_switch;
pub mod ledger;
pub mod meta;
pub mod models;
pub mod remote;
pub mod storage;
pub mod sync;

pub use backup::BackupManager;
pub use hash::content_hash;
pub use kill_switch::{KillSwitch, KillSwitchRecord};
pub use ledger::{Ledger, LedgerError, LotChange, LotNumber, WeekAdvance};
pub use meta::{MetaStore, SyncMeta};
pub use models::{Branch, Location, LotRecord, Stage, Variety, MAX_VARIETIES};
pub use remote::{
    ContentClient, NotFound, PutOutcome, PutRequest, RemoteBlob, RemoteError, RemoteStore,
};
pub use storage::{LocalStore, StorageError};
pub use sync::{
    ErrorKind, SyncEngine, SyncError, SyncOutcome, SyncReport, SyncSettings, SyncState, SyncStatus,
};

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
