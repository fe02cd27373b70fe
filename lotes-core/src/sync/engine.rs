//! The sync state machine.

use std::fs;
use std::path::Path;
use std::time::Duration;

use chrono::Local;

use super::error::SyncError;
use super::report::{SyncOutcome, SyncReport, SyncStatus};
use super::settings::SyncSettings;
use crate::backup::BackupManager;
use crate::hash::{content_hash, optional_hash};
use crate::kill_switch::KillSwitch;
use crate::ledger::codec;
use crate::meta::{MetaStore, SyncMeta};
use crate::remote::{branch_candidates, PutRequest, RemoteBlob, RemoteError, RemoteStore};
use crate::storage::{LocalStore, StorageError};

/// Per-branch timeout while probing for the remote file.
const PROBE_TIMEOUT: Duration = Duration::from_secs(6);
/// Timeout for the quick remote read that precedes a push.
const PRECHECK_TIMEOUT: Duration = Duration::from_secs(5);
const PUSH_TIMEOUT: Duration = Duration::from_secs(10);
/// Publishing a backup uploads a whole file chosen by the user.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(15);

/// Remote state seen before an upload.
enum Precheck {
    Present(RemoteBlob),
    Missing,
}

/// Composes local storage, backups, meta and the remote into pull/push.
///
/// Operations take `&mut self`: only one can be in flight per engine.
pub struct SyncEngine<R> {
    store: LocalStore,
    settings: SyncSettings,
    remote: R,
    meta: MetaStore,
    backups: BackupManager,
    kill_switch: KillSwitch,
    /// Branch the file was last found on.
    effective_branch: Option<String>,
}

impl<R: RemoteStore> SyncEngine<R> {
    pub fn new(store: LocalStore, settings: SyncSettings, remote: R) -> Self {
        Self {
            meta: MetaStore::new(&store),
            backups: BackupManager::new(&store),
            kill_switch: KillSwitch::new(&store),
            store,
            settings,
            remote,
            effective_branch: None,
        }
    }

    pub fn store(&self) -> &LocalStore {
        &self.store
    }

    pub fn settings(&self) -> &SyncSettings {
        &self.settings
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    pub fn kill_switch(&self) -> &KillSwitch {
        &self.kill_switch
    }

    /// Branch used for uploads: where the file was last found, else the
    /// configured one.
    pub fn branch(&self) -> &str {
        self.effective_branch
            .as_deref()
            .unwrap_or(&self.settings.branch)
    }

    pub fn effective_branch(&self) -> Option<&str> {
        self.effective_branch.as_deref()
    }

    fn ensure_not_blocked(&self) -> Result<(), SyncError> {
        match self.kill_switch.status()? {
            Some(record) => Err(SyncError::Blocked {
                since: record.engaged_at,
                sentinel: record.sentinel,
            }),
            None => Ok(()),
        }
    }

    /// Probes the branch candidates and remembers where the file was found.
    async fn fetch_remote(&mut self) -> Result<RemoteBlob, RemoteError> {
        let candidates = branch_candidates(self.branch());
        let blob = self.remote.fetch(&candidates, PROBE_TIMEOUT).await?;

        if blob.branch != self.settings.branch {
            tracing::info!(
                "Using branch {} (configured: {})",
                blob.branch,
                self.settings.branch
            );
        }
        self.effective_branch = Some(blob.branch.clone());
        Ok(blob)
    }

    /// Reads the remote before an upload, probing the same branch candidates
    /// as a pull. The file is missing only when no candidate has it.
    async fn precheck(&mut self, timeout: Duration) -> Result<Precheck, RemoteError> {
        let candidates = branch_candidates(self.branch());
        match self.remote.fetch(&candidates, timeout).await {
            Ok(blob) => {
                self.effective_branch = Some(blob.branch.clone());
                Ok(Precheck::Present(blob))
            }
            Err(e) if e.is_not_found() => Ok(Precheck::Missing),
            Err(e) => Err(e),
        }
    }

    /// Turns a rejected version token into a conflict, keeping the remote
    /// content that won.
    async fn precondition_conflict(&self) -> SyncError {
        let branch = vec![self.branch().to_string()];
        let remote_backup = match self.remote.fetch(&branch, PRECHECK_TIMEOUT).await {
            Ok(blob) => match self.backups.snapshot_remote(&blob.content) {
                Ok(path) => Some(path),
                Err(e) => {
                    tracing::warn!("Could not save remote snapshot: {}", e);
                    None
                }
            },
            Err(e) => {
                tracing::warn!("Could not re-read remote after rejected update: {}", e);
                None
            }
        };

        SyncError::Conflict {
            local_backup: None,
            remote_backup,
        }
    }

    fn commit_message(action: &str, user: &str) -> String {
        format!("{} {} {}", action, Local::now().format("%Y-%m-%d %H:%M"), user)
    }

    // ---- pull ----

    pub async fn pull(&mut self) -> SyncReport {
        SyncReport::from_result(self.try_pull().await)
    }

    /// Brings the local ledger up to date with the remote.
    pub async fn try_pull(&mut self) -> Result<SyncOutcome, SyncError> {
        self.settings.require_remote()?;

        let remote = self.fetch_remote().await?;
        let remote_hash = content_hash(&remote.content);

        let local = self.store.read_ledger_text()?;
        let local_hash = optional_hash(local.as_deref());
        let meta = self.meta.load();

        if local_hash == remote_hash {
            self.meta.save(&SyncMeta::agreed(&remote_hash))?;
            tracing::debug!("Pull: local already matches remote");
            return Ok(SyncOutcome::UpToDate { hash: remote_hash });
        }

        if !local_hash.is_empty() && pull_conflicts(&meta, &local_hash, &remote_hash) {
            let local_backup = self.backups.snapshot_local()?;
            let remote_backup = self.backups.snapshot_remote(&remote.content)?;
            tracing::warn!("Pull conflict: local and remote both changed since last sync");
            return Err(SyncError::Conflict {
                local_backup,
                remote_backup: Some(remote_backup),
            });
        }

        let local_backup = match local {
            Some(_) => self.backups.snapshot_local()?,
            None => None,
        };
        self.store.write_ledger_text(&remote.content)?;
        self.meta.save(&SyncMeta::agreed(&remote_hash))?;

        tracing::info!("Pulled remote ledger from {}", remote.branch);
        Ok(SyncOutcome::Pulled {
            hash: remote_hash,
            branch: remote.branch,
            local_backup,
        })
    }

    // ---- push ----

    pub async fn push(&mut self, force: bool) -> SyncReport {
        SyncReport::from_result(self.try_push(force).await)
    }

    /// Uploads the local ledger, refusing to overwrite concurrent remote
    /// changes unless `force` is set.
    pub async fn try_push(&mut self, force: bool) -> Result<SyncOutcome, SyncError> {
        let user = self.settings.require_upload()?.to_string();
        self.ensure_not_blocked()?;

        let content = self.store.read_ledger_text()?.unwrap_or_default();
        let has_rows = codec::count_data_rows(&content) > 0;
        if !has_rows && !force {
            return Err(SyncError::EmptyLedger);
        }
        let local_hash = content_hash(&content);
        let meta = self.meta.load();

        let remote = match self.precheck(PRECHECK_TIMEOUT).await {
            Ok(state) => Some(state),
            Err(e) => {
                tracing::warn!("Remote pre-check failed, uploading without version token: {}", e);
                None
            }
        };

        let mut remote_backup = None;
        let sha = match remote {
            Some(Precheck::Present(blob)) => {
                let remote_hash = content_hash(&blob.content);
                if remote_hash == local_hash {
                    self.meta.save(&SyncMeta::agreed(&local_hash))?;
                    return Ok(SyncOutcome::UpToDate { hash: local_hash });
                }
                if !force && push_conflicts(&meta, &local_hash, &remote_hash) {
                    let remote_backup = self.backups.snapshot_remote(&blob.content)?;
                    tracing::warn!("Push conflict: remote changed since last sync");
                    return Err(SyncError::Conflict {
                        local_backup: None,
                        remote_backup: Some(remote_backup),
                    });
                }
                remote_backup = Some(self.backups.snapshot_remote(&blob.content)?);
                Some(blob.sha)
            }
            Some(Precheck::Missing) => {
                if !force {
                    return Err(SyncError::RemoteMissing);
                }
                if !has_rows {
                    return Err(SyncError::EmptyLedger);
                }
                None
            }
            None => None,
        };

        let request = PutRequest {
            content,
            message: Self::commit_message("Update", &user),
            branch: self.branch().to_string(),
            sha,
            timeout: PUSH_TIMEOUT,
        };
        let branch = request.branch.clone();

        let outcome = match self.remote.put(request).await {
            Ok(outcome) => outcome,
            Err(RemoteError::PreconditionFailed) => {
                tracing::warn!("Push rejected: remote version token is stale");
                return Err(self.precondition_conflict().await);
            }
            Err(e) => return Err(e.into()),
        };

        if let Err(e) = self.backups.snapshot_local() {
            tracing::warn!("Pushed, but could not snapshot local ledger: {}", e);
        }
        self.meta.save(&SyncMeta::agreed(&local_hash))?;

        tracing::info!("Pushed local ledger to {}", branch);
        Ok(SyncOutcome::Pushed {
            hash: local_hash,
            branch,
            outcome,
            remote_backup,
        })
    }

    // ---- startup ----

    pub async fn startup_restore(&mut self) -> SyncReport {
        SyncReport::from_result(self.try_startup_restore().await)
    }

    /// Pulls at startup, falling back to the newest local backup when the
    /// remote can't be used. Conflicts are surfaced, never resolved.
    pub async fn try_startup_restore(&mut self) -> Result<SyncOutcome, SyncError> {
        self.ensure_not_blocked()?;

        let err = match self.try_pull().await {
            Ok(outcome) => return Ok(outcome),
            Err(e @ SyncError::Conflict { .. }) => return Err(e),
            Err(e) => e,
        };

        tracing::warn!("Startup pull failed: {}", err);
        match self.backups.restore_latest() {
            Ok(backup) => Ok(SyncOutcome::Restored {
                backup,
                cause: Some(err.to_string()),
            }),
            Err(StorageError::NoBackups(_)) => Err(err),
            Err(restore_err) => {
                tracing::warn!("Fallback restore failed: {}", restore_err);
                Err(err)
            }
        }
    }

    // ---- backups ----

    pub fn restore_latest_backup(&mut self) -> SyncReport {
        SyncReport::from_result(self.try_restore_latest_backup())
    }

    pub fn try_restore_latest_backup(&mut self) -> Result<SyncOutcome, SyncError> {
        let backup = self.backups.restore_latest()?;
        Ok(SyncOutcome::Restored {
            backup,
            cause: None,
        })
    }

    pub async fn publish_backup(&mut self, path: &Path, allow_create: bool) -> SyncReport {
        SyncReport::from_result(self.try_publish_backup(path, allow_create).await)
    }

    /// Uploads a backup file as the new remote content.
    ///
    /// The local ledger is left as is; meta records the published content,
    /// so the next pull brings it down.
    pub async fn try_publish_backup(
        &mut self,
        path: &Path,
        allow_create: bool,
    ) -> Result<SyncOutcome, SyncError> {
        let user = self.settings.require_upload()?.to_string();
        self.ensure_not_blocked()?;

        let content = fs::read_to_string(path)
            .map_err(|e| StorageError::IoError(path.to_path_buf(), e))?;
        if codec::count_data_rows(&content) == 0 {
            return Err(SyncError::EmptyLedger);
        }

        let (sha, remote_backup) = match self.precheck(PROBE_TIMEOUT).await? {
            Precheck::Present(blob) => {
                let backup = self.backups.snapshot_remote(&blob.content)?;
                (Some(blob.sha), Some(backup))
            }
            Precheck::Missing if allow_create => (None, None),
            Precheck::Missing => return Err(SyncError::RemoteMissing),
        };

        let hash = content_hash(&content);
        let request = PutRequest {
            content,
            message: Self::commit_message("Restore", &user),
            branch: self.branch().to_string(),
            sha,
            timeout: PUBLISH_TIMEOUT,
        };

        let outcome = match self.remote.put(request).await {
            Ok(outcome) => outcome,
            Err(RemoteError::PreconditionFailed) => {
                return Err(self.precondition_conflict().await);
            }
            Err(e) => return Err(e.into()),
        };

        self.meta.save(&SyncMeta::agreed(&hash))?;
        tracing::info!("Published {} to remote", path.display());
        Ok(SyncOutcome::Published {
            hash,
            source: path.to_path_buf(),
            outcome,
            remote_backup,
        })
    }

    // ---- local ----

    pub fn clear_local_data(&mut self) -> SyncReport {
        SyncReport::from_result(self.try_clear_local_data())
    }

    /// Disconnects local data from sync.
    ///
    /// The canonical file is kept; a copy goes to the backup directory, the
    /// working copy is removed and uploads stay blocked until the sentinel is
    /// removed by hand.
    pub fn try_clear_local_data(&mut self) -> Result<SyncOutcome, SyncError> {
        let deleted_backup = self.backups.snapshot_deleted()?;
        self.store.remove_working_copy()?;
        self.kill_switch.engage("local data cleared")?;
        self.meta.clear()?;

        Ok(SyncOutcome::Cleared { deleted_backup })
    }

    pub fn status(&self) -> Result<SyncStatus, SyncError> {
        let local = self.store.read_ledger_text()?;
        Ok(SyncStatus {
            local_hash: optional_hash(local.as_deref()),
            meta: self.meta.load(),
            branch: self.branch().to_string(),
            kill_switch: self.kill_switch.status()?,
            latest_backup: self.backups.latest()?,
        })
    }
}

/// Both sides drifted from the last agreed point: the agreed local hash no
/// longer matches the remote, and the local content no longer matches the
/// agreed remote.
fn pull_conflicts(meta: &SyncMeta, local_hash: &str, remote_hash: &str) -> bool {
    match meta.local() {
        Some(agreed_local) => agreed_local != remote_hash && meta.remote() != Some(local_hash),
        None => false,
    }
}

/// The remote moved away from the agreed remote hash while the local moved
/// away from the agreed local hash. Unknown hashes never conflict.
fn push_conflicts(meta: &SyncMeta, local_hash: &str, remote_hash: &str) -> bool {
    let remote_changed = meta.remote().is_some_and(|agreed| agreed != remote_hash);
    let local_changed = meta.local().is_some_and(|agreed| agreed != local_hash);
    remote_changed && local_changed
}
