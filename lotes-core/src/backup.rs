//! Timestamped, append-only snapshots of ledger content.
//!
//! Snapshots live in the backup directory as
//! - `lotes_template_{ts}.csv`: the local ledger before an overwrite or after a push
//! - `remote_lotes_{ts}.csv`: remote content that was not applied locally
//! - `lotes_template_deleted_{ts}.csv`: the local ledger when local data is cleared
//!
//! `{ts}` is `%Y%m%d_%H%M%S`; a `_N` suffix separates snapshots taken within
//! the same second. Existing snapshots are never overwritten or removed.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::storage::{read_optional, write_atomic, LocalStore, StorageError};

const LOCAL_PREFIX: &str = "lotes_template_";
const REMOTE_PREFIX: &str = "remote_lotes_";
const DELETED_PREFIX: &str = "lotes_template_deleted_";
const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone)]
pub struct BackupManager {
    dir: PathBuf,
    ledger_path: PathBuf,
}

impl BackupManager {
    pub fn new(store: &LocalStore) -> Self {
        Self {
            dir: store.backup_dir(),
            ledger_path: store.ledger_path(),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Copies the local ledger into the backup directory.
    ///
    /// Returns `Ok(None)` when there is no local ledger to copy.
    pub fn snapshot_local(&self) -> Result<Option<PathBuf>, StorageError> {
        self.snapshot_ledger(LOCAL_PREFIX)
    }

    /// Keeps remote content that was not applied, for manual reconciliation.
    pub fn snapshot_remote(&self, content: &str) -> Result<PathBuf, StorageError> {
        self.write_new(REMOTE_PREFIX, content)
    }

    /// Copies the local ledger aside before local data is cleared.
    pub fn snapshot_deleted(&self) -> Result<Option<PathBuf>, StorageError> {
        self.snapshot_ledger(DELETED_PREFIX)
    }

    fn snapshot_ledger(&self, prefix: &str) -> Result<Option<PathBuf>, StorageError> {
        match read_optional(&self.ledger_path)? {
            Some(content) => self.write_new(prefix, &content).map(Some),
            None => Ok(None),
        }
    }

    /// Writes `content` under a fresh name, never replacing an existing file.
    fn write_new(&self, prefix: &str, content: &str) -> Result<PathBuf, StorageError> {
        fs::create_dir_all(&self.dir).map_err(|e| StorageError::IoError(self.dir.clone(), e))?;

        let stamp = Local::now().format(TIMESTAMP_FORMAT).to_string();
        let mut n = 0u32;
        loop {
            let name = if n == 0 {
                format!("{}{}.csv", prefix, stamp)
            } else {
                format!("{}{}_{}.csv", prefix, stamp, n)
            };
            let path = self.dir.join(name);

            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(mut file) => {
                    file.write_all(content.as_bytes())
                        .and_then(|_| file.sync_all())
                        .map_err(|e| StorageError::IoError(path.clone(), e))?;
                    tracing::debug!("Snapshot written: {}", path.display());
                    return Ok(path);
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => n += 1,
                Err(e) => return Err(StorageError::IoError(path, e)),
            }
        }
    }

    /// Local snapshots eligible for restore, oldest first.
    ///
    /// Deleted-data and remote snapshots are excluded.
    pub fn local_snapshots(&self) -> Result<Vec<PathBuf>, StorageError> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(StorageError::IoError(self.dir.clone(), e)),
        };

        let mut snapshots: Vec<(SnapshotKey, PathBuf)> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().into_owned();
                parse_local_snapshot(&name).map(|key| (key, entry.path()))
            })
            .collect();

        snapshots.sort();
        Ok(snapshots.into_iter().map(|(_, path)| path).collect())
    }

    pub fn latest(&self) -> Result<Option<PathBuf>, StorageError> {
        Ok(self.local_snapshots()?.pop())
    }

    /// Copies the newest local snapshot over the local ledger.
    pub fn restore_latest(&self) -> Result<PathBuf, StorageError> {
        let latest = self
            .latest()?
            .ok_or_else(|| StorageError::NoBackups(self.dir.clone()))?;

        let content = fs::read(&latest).map_err(|e| StorageError::IoError(latest.clone(), e))?;
        write_atomic(&self.ledger_path, &content)?;

        tracing::info!("Restored {} from backup", latest.display());
        Ok(latest)
    }
}

/// (date, time, same-second sequence)
type SnapshotKey = (u32, u32, u32);

fn parse_local_snapshot(name: &str) -> Option<SnapshotKey> {
    let stem = name.strip_prefix(LOCAL_PREFIX)?.strip_suffix(".csv")?;
    let mut parts = stem.split('_');

    let date = parts.next().filter(|p| is_digits(p, 8))?.parse().ok()?;
    let time = parts.next().filter(|p| is_digits(p, 6))?.parse().ok()?;
    let seq = match parts.next() {
        Some(n) => n.parse().ok()?,
        None => 0,
    };
    if parts.next().is_some() {
        return None;
    }
    Some((date, time, seq))
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (LocalStore, BackupManager, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().to_path_buf());
        let backups = BackupManager::new(&store);
        (store, backups, temp_dir)
    }

    fn file_name(path: &Path) -> String {
        path.file_name().unwrap().to_string_lossy().into_owned()
    }

    #[test]
    fn test_snapshot_local_without_ledger_is_noop() {
        let (_store, backups, _temp) = setup();
        assert!(backups.snapshot_local().unwrap().is_none());
        assert!(!backups.dir().exists());
    }

    #[test]
    fn test_snapshot_local_copies_ledger() {
        let (store, backups, _temp) = setup();
        store.write_ledger_text("ID\nL1-FSM\n").unwrap();

        let path = backups.snapshot_local().unwrap().unwrap();
        assert!(file_name(&path).starts_with("lotes_template_"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "ID\nL1-FSM\n");
    }

    #[test]
    fn test_snapshots_in_same_second_do_not_overwrite() {
        let (store, backups, _temp) = setup();
        store.write_ledger_text("one").unwrap();
        let first = backups.snapshot_local().unwrap().unwrap();
        store.write_ledger_text("two").unwrap();
        let second = backups.snapshot_local().unwrap().unwrap();

        assert_ne!(first, second);
        assert_eq!(fs::read_to_string(&first).unwrap(), "one");
        assert_eq!(fs::read_to_string(&second).unwrap(), "two");
        assert_eq!(backups.latest().unwrap(), Some(second));
    }

    #[test]
    fn test_snapshot_remote_naming() {
        let (_store, backups, _temp) = setup();
        let path = backups.snapshot_remote("remote body").unwrap();
        assert!(file_name(&path).starts_with("remote_lotes_"));
        assert_eq!(fs::read_to_string(&path).unwrap(), "remote body");
    }

    #[test]
    fn test_restore_latest_without_backups_fails() {
        let (_store, backups, _temp) = setup();
        assert!(matches!(
            backups.restore_latest(),
            Err(StorageError::NoBackups(_))
        ));
    }

    #[test]
    fn test_restore_latest_picks_newest_timestamp() {
        let (store, backups, _temp) = setup();
        fs::create_dir_all(backups.dir()).unwrap();
        for (name, body) in [
            ("lotes_template_20250301_090000.csv", "march"),
            ("lotes_template_20250415_120000.csv", "april"),
            ("lotes_template_20250415_120000_1.csv", "april later"),
            ("lotes_template_20250110_235959.csv", "january"),
            ("lotes_template_deleted_20251231_000000.csv", "deleted"),
            ("remote_lotes_20251231_000000.csv", "remote"),
        ] {
            fs::write(backups.dir().join(name), body).unwrap();
        }

        let restored = backups.restore_latest().unwrap();
        assert_eq!(file_name(&restored), "lotes_template_20250415_120000_1.csv");
        assert_eq!(store.read_ledger_text().unwrap().unwrap(), "april later");
    }

    #[test]
    fn test_same_second_sequence_orders_numerically() {
        assert!(
            parse_local_snapshot("lotes_template_20250101_000000_2.csv")
                < parse_local_snapshot("lotes_template_20250101_000000_10.csv")
        );
        assert!(parse_local_snapshot("lotes_template_deleted_20250101_000000.csv").is_none());
        assert!(parse_local_snapshot("lotes_template_2025_000000.csv").is_none());
    }
}
