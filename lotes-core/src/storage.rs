//! Local file layout and whole-file persistence.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use crate::ledger::{codec, Ledger, LedgerError};

pub const LEDGER_FILE: &str = "lotes_template.csv";
pub const WORKING_FILE: &str = "lotes_local.csv";
pub const META_FILE: &str = "lotes_local_meta.json";
pub const SENTINEL_FILE: &str = ".no_auto_restore";
pub const AUDIT_LOG_FILE: &str = "sync_audit.log";
pub const BACKUP_DIR: &str = "registros";

/// Paths of every file the engine touches, rooted at one data directory.
#[derive(Debug, Clone)]
pub struct LocalStore {
    data_dir: PathBuf,
}

impl LocalStore {
    pub fn new(data_dir: PathBuf) -> Self {
        Self { data_dir }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    /// Canonical local mirror of the remote file.
    pub fn ledger_path(&self) -> PathBuf {
        self.data_dir.join(LEDGER_FILE)
    }

    /// Working copy used once local data has been cleared.
    pub fn working_path(&self) -> PathBuf {
        self.data_dir.join(WORKING_FILE)
    }

    pub fn meta_path(&self) -> PathBuf {
        self.data_dir.join(META_FILE)
    }

    pub fn sentinel_path(&self) -> PathBuf {
        self.data_dir.join(SENTINEL_FILE)
    }

    pub fn audit_log_path(&self) -> PathBuf {
        self.data_dir.join(AUDIT_LOG_FILE)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.data_dir.join(BACKUP_DIR)
    }

    /// File that ledger edits go to: the working copy while uploads are
    /// blocked, the canonical file otherwise.
    pub fn active_path(&self) -> PathBuf {
        if self.sentinel_path().exists() {
            self.working_path()
        } else {
            self.ledger_path()
        }
    }

    /// Reads the canonical ledger text. `Ok(None)` if the file doesn't exist.
    pub fn read_ledger_text(&self) -> Result<Option<String>, StorageError> {
        read_optional(&self.ledger_path())
    }

    pub fn write_ledger_text(&self, content: &str) -> Result<(), StorageError> {
        write_atomic(&self.ledger_path(), content.as_bytes())
    }

    /// Loads the active ledger; a missing file is an empty ledger.
    pub fn load_ledger(&self) -> Result<Ledger, StorageError> {
        let path = self.active_path();
        match read_optional(&path)? {
            Some(text) => codec::decode(&text).map_err(|e| StorageError::Ledger(path, e)),
            None => Ok(Ledger::new()),
        }
    }

    /// Rewrites the active ledger file in full.
    pub fn save_ledger(&self, ledger: &Ledger) -> Result<PathBuf, StorageError> {
        let path = self.active_path();
        let text = codec::encode(ledger).map_err(|e| StorageError::Ledger(path.clone(), e))?;
        write_atomic(&path, text.as_bytes())?;
        Ok(path)
    }

    pub fn remove_working_copy(&self) -> Result<(), StorageError> {
        let path = self.working_path();
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StorageError::IoError(path, e)),
        }
    }
}

/// Reads a UTF-8 file, mapping "not found" to `None`.
pub fn read_optional(path: &Path) -> Result<Option<String>, StorageError> {
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(StorageError::IoError(path.to_path_buf(), e)),
    }
}

/// Replaces `path` by writing a sibling temp file and renaming it over.
///
/// Creates the parent directory if needed. A crash leaves either the old or
/// the new content, never a torn file.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StorageError> {
    let io_err = |e| StorageError::IoError(path.to_path_buf(), e);

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    {
        let mut file = fs::File::create(&tmp).map_err(io_err)?;
        file.write_all(bytes).map_err(io_err)?;
        file.sync_all().map_err(io_err)?;
    }

    fs::rename(&tmp, path).map_err(io_err)?;
    Ok(())
}

/// Errors that can occur during local storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("I/O error for {}: {1}", .0.display())]
    IoError(PathBuf, #[source] io::Error),

    #[error("Invalid ledger {}: {1}", .0.display())]
    Ledger(PathBuf, #[source] LedgerError),

    #[error("Invalid sync meta {}: {1}", .0.display())]
    Meta(PathBuf, #[source] serde_json::Error),

    #[error("No backups available in {}", .0.display())]
    NoBackups(PathBuf),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Branch, LotRecord};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn test_store() -> (LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().to_path_buf());
        (store, temp_dir)
    }

    fn one_lot() -> Ledger {
        Ledger::from_lots(vec![LotRecord::new(
            Branch::Fsm,
            1,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
        )])
    }

    #[test]
    fn test_read_missing_ledger_returns_none() {
        let (store, _temp) = test_store();
        assert!(store.read_ledger_text().unwrap().is_none());
        assert!(store.load_ledger().unwrap().is_empty());
    }

    #[test]
    fn test_write_atomic_creates_directory_and_leaves_no_temp() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("file.csv");

        write_atomic(&path, b"first").unwrap();
        write_atomic(&path, b"second").unwrap();

        assert_eq!(fs::read_to_string(&path).unwrap(), "second");
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_save_and_load_ledger_roundtrip() {
        let (store, _temp) = test_store();
        let ledger = one_lot();

        let path = store.save_ledger(&ledger).unwrap();
        assert_eq!(path, store.ledger_path());
        assert_eq!(store.load_ledger().unwrap(), ledger);
    }

    #[test]
    fn test_active_path_switches_to_working_copy_when_blocked() {
        let (store, _temp) = test_store();
        store.save_ledger(&one_lot()).unwrap();

        fs::write(store.sentinel_path(), "2025-01-01T00:00:00Z").unwrap();
        assert_eq!(store.active_path(), store.working_path());
        assert!(store.load_ledger().unwrap().is_empty());

        // Canonical file untouched
        assert!(store.read_ledger_text().unwrap().is_some());
    }

    #[test]
    fn test_load_ledger_reports_invalid_content() {
        let (store, _temp) = test_store();
        store
            .write_ledger_text("ID,Branch,LoteNum\nL1-XX,XX,1\n")
            .unwrap();

        let err = store.load_ledger().unwrap_err();
        assert!(matches!(err, StorageError::Ledger(..)));
        assert!(err.to_string().contains("Invalid ledger"));
    }

    #[test]
    fn test_remove_working_copy_when_missing_is_ok() {
        let (store, _temp) = test_store();
        store.remove_working_copy().unwrap();
    }
}
