use std::path::PathBuf;

use chrono::{DateTime, FixedOffset};

use crate::ledger::LedgerError;
use crate::remote::RemoteError;
use crate::storage::StorageError;

/// Error classes callers act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Auth,
    NotFound,
    Conflict,
    Network,
    Validation,
    Io,
    Blocked,
}

impl ErrorKind {
    /// Conflicts and blocks need a human; everything else can be retried.
    pub fn requires_decision(self) -> bool {
        matches!(self, ErrorKind::Conflict | ErrorKind::Blocked)
    }
}

/// Errors that can occur during sync operations.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("No token configured")]
    MissingToken,

    #[error("No repository configured (expected owner/name)")]
    MissingRepo,

    #[error("No user configured to attribute changes to")]
    MissingUser,

    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// Local and remote both changed since the last agreed point.
    #[error("Conflict: local and remote both changed since the last sync, backups saved for review")]
    Conflict {
        local_backup: Option<PathBuf>,
        remote_backup: Option<PathBuf>,
    },

    #[error("Uploads blocked after local data was cleared; remove {} manually to re-enable", .sentinel.display())]
    Blocked {
        since: Option<DateTime<FixedOffset>>,
        sentinel: PathBuf,
    },

    #[error("Ledger has no data rows; refusing to upload without force")]
    EmptyLedger,

    #[error("Remote file not found; creating it requires explicit confirmation")]
    RemoteMissing,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

impl SyncError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            SyncError::MissingToken | SyncError::MissingRepo | SyncError::MissingUser => {
                ErrorKind::Auth
            }
            SyncError::Remote(e) => match e {
                RemoteError::Auth => ErrorKind::Auth,
                RemoteError::NotFound(_) => ErrorKind::NotFound,
                RemoteError::PreconditionFailed => ErrorKind::Conflict,
                RemoteError::Timeout
                | RemoteError::Network(_)
                | RemoteError::Http(_)
                | RemoteError::Decode(_) => ErrorKind::Network,
            },
            SyncError::Conflict { .. } => ErrorKind::Conflict,
            SyncError::Blocked { .. } => ErrorKind::Blocked,
            SyncError::EmptyLedger | SyncError::Ledger(_) => ErrorKind::Validation,
            SyncError::RemoteMissing => ErrorKind::NotFound,
            SyncError::Storage(e) => match e {
                StorageError::Ledger(..) => ErrorKind::Validation,
                StorageError::NoBackups(_) => ErrorKind::NotFound,
                StorageError::IoError(..) | StorageError::Meta(..) => ErrorKind::Io,
            },
        }
    }

    pub fn requires_decision(&self) -> bool {
        self.kind().requires_decision()
    }

    /// Backup files written while producing this error.
    pub fn backups(&self) -> Vec<PathBuf> {
        match self {
            SyncError::Conflict {
                local_backup,
                remote_backup,
            } => local_backup
                .iter()
                .chain(remote_backup.iter())
                .cloned()
                .collect(),
            _ => Vec::new(),
        }
    }
}
