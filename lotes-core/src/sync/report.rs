use std::fmt;
use std::path::{Path, PathBuf};

use super::error::{ErrorKind, SyncError};
use crate::kill_switch::KillSwitchRecord;
use crate::meta::SyncMeta;
use crate::remote::PutOutcome;

/// Where an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    /// Content moved between local and remote.
    Applied,
    /// Both sides already agreed.
    NoOp,
    Conflict,
    /// Refused before touching the remote (empty ledger, missing remote file).
    Rejected,
    Blocked,
    Failed,
    /// Offline fallback: the newest local backup was restored.
    Restored,
}

impl fmt::Display for SyncState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncState::Applied => "applied",
            SyncState::NoOp => "no-op",
            SyncState::Conflict => "conflict",
            SyncState::Rejected => "rejected",
            SyncState::Blocked => "blocked",
            SyncState::Failed => "failed",
            SyncState::Restored => "restored",
        };
        write!(f, "{}", s)
    }
}

/// Successful result of an engine operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// Remote content was written to the local ledger.
    Pulled {
        hash: String,
        branch: String,
        local_backup: Option<PathBuf>,
    },
    /// Local and remote were already identical.
    UpToDate { hash: String },
    Pushed {
        hash: String,
        branch: String,
        outcome: PutOutcome,
        remote_backup: Option<PathBuf>,
    },
    Published {
        hash: String,
        source: PathBuf,
        outcome: PutOutcome,
        remote_backup: Option<PathBuf>,
    },
    /// A local backup replaced the ledger. `cause` is set when this was an
    /// offline fallback.
    Restored {
        backup: PathBuf,
        cause: Option<String>,
    },
    Cleared { deleted_backup: Option<PathBuf> },
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

impl SyncOutcome {
    pub fn state(&self) -> SyncState {
        match self {
            SyncOutcome::UpToDate { .. } => SyncState::NoOp,
            SyncOutcome::Restored { .. } => SyncState::Restored,
            _ => SyncState::Applied,
        }
    }

    pub fn backups(&self) -> Vec<PathBuf> {
        let backup = match self {
            SyncOutcome::Pulled { local_backup, .. } => local_backup.clone(),
            SyncOutcome::Pushed { remote_backup, .. }
            | SyncOutcome::Published { remote_backup, .. } => remote_backup.clone(),
            SyncOutcome::Cleared { deleted_backup } => deleted_backup.clone(),
            SyncOutcome::UpToDate { .. } | SyncOutcome::Restored { .. } => None,
        };
        backup.into_iter().collect()
    }
}

impl fmt::Display for SyncOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncOutcome::Pulled { branch, .. } => {
                write!(f, "Local ledger updated from remote ({})", branch)
            }
            SyncOutcome::UpToDate { .. } => write!(f, "Already up to date"),
            SyncOutcome::Pushed {
                branch, outcome, ..
            } => match outcome {
                PutOutcome::Created => write!(f, "Remote file created on {}", branch),
                PutOutcome::Updated => write!(f, "Synchronized to {}", branch),
            },
            SyncOutcome::Published { source, .. } => {
                write!(f, "Remote restored from {}", file_name(source))
            }
            SyncOutcome::Restored { backup, cause } => match cause {
                Some(cause) => write!(f, "Offline ({}): restored backup {}", cause, file_name(backup)),
                None => write!(f, "Restored backup {}", file_name(backup)),
            },
            SyncOutcome::Cleared { .. } => write!(
                f,
                "Local data cleared; uploads are blocked until the sentinel is removed manually"
            ),
        }
    }
}

/// Flat result handed to front ends: a state plus a human-readable message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub state: SyncState,
    pub message: String,
    pub error_kind: Option<ErrorKind>,
    pub backups: Vec<PathBuf>,
}

impl SyncReport {
    pub fn from_result(result: Result<SyncOutcome, SyncError>) -> Self {
        match result {
            Ok(outcome) => Self {
                state: outcome.state(),
                message: outcome.to_string(),
                error_kind: None,
                backups: outcome.backups(),
            },
            Err(err) => {
                let kind = err.kind();
                let state = match &err {
                    SyncError::EmptyLedger | SyncError::RemoteMissing => SyncState::Rejected,
                    _ => match kind {
                        ErrorKind::Conflict => SyncState::Conflict,
                        ErrorKind::Blocked => SyncState::Blocked,
                        _ => SyncState::Failed,
                    },
                };
                Self {
                    state,
                    message: err.to_string(),
                    error_kind: Some(kind),
                    backups: err.backups(),
                }
            }
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(
            self.state,
            SyncState::Applied | SyncState::NoOp | SyncState::Restored
        )
    }

    pub fn requires_decision(&self) -> bool {
        self.error_kind.is_some_and(ErrorKind::requires_decision)
    }
}

impl fmt::Display for SyncReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// Local view of the sync state; needs no network.
#[derive(Debug, Clone)]
pub struct SyncStatus {
    /// `""` when there is no local ledger.
    pub local_hash: String,
    pub meta: SyncMeta,
    pub branch: String,
    pub kill_switch: Option<KillSwitchRecord>,
    pub latest_backup: Option<PathBuf>,
}

impl SyncStatus {
    /// Whether the local ledger differs from the last agreed content.
    pub fn local_changed(&self) -> bool {
        match self.meta.local() {
            Some(agreed) => agreed != self.local_hash,
            None => !self.local_hash.is_empty(),
        }
    }
}
