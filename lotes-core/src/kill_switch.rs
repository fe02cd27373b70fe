//! Persistent switch that blocks uploads and automatic restores.
//!
//! Engaged when local data is deliberately cleared, so that neither a push nor
//! a startup restore can bring the cleared data back. There is no programmatic
//! way to disengage it; removing the sentinel file is a manual operator action.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::PathBuf;

use chrono::{DateTime, FixedOffset, Local};

use crate::storage::{read_optional, write_atomic, LocalStore, StorageError};

#[derive(Debug, Clone)]
pub struct KillSwitch {
    sentinel: PathBuf,
    audit_log: PathBuf,
}

/// State read back from an engaged switch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KillSwitchRecord {
    /// `None` if the sentinel exists but its timestamp can't be parsed.
    pub engaged_at: Option<DateTime<FixedOffset>>,
    pub sentinel: PathBuf,
}

impl KillSwitch {
    pub fn new(store: &LocalStore) -> Self {
        Self {
            sentinel: store.sentinel_path(),
            audit_log: store.audit_log_path(),
        }
    }

    pub fn is_engaged(&self) -> bool {
        self.sentinel.exists()
    }

    /// Reads the sentinel. `Ok(None)` when the switch is not engaged.
    pub fn status(&self) -> Result<Option<KillSwitchRecord>, StorageError> {
        let Some(text) = read_optional(&self.sentinel)? else {
            return Ok(None);
        };

        Ok(Some(KillSwitchRecord {
            engaged_at: DateTime::parse_from_rfc3339(text.trim()).ok(),
            sentinel: self.sentinel.clone(),
        }))
    }

    /// Writes the sentinel and appends an audit entry.
    ///
    /// Engaging an already engaged switch refreshes the timestamp.
    pub fn engage(&self, reason: &str) -> Result<KillSwitchRecord, StorageError> {
        let now = Local::now().fixed_offset();
        write_atomic(&self.sentinel, now.to_rfc3339().as_bytes())?;
        self.audit(&format!("kill switch engaged: {}", reason))?;

        tracing::warn!("Uploads blocked: {}", reason);
        Ok(KillSwitchRecord {
            engaged_at: Some(now),
            sentinel: self.sentinel.clone(),
        })
    }

    /// Appends one timestamped line to the audit log.
    pub fn audit(&self, message: &str) -> Result<(), StorageError> {
        let io_err = |e| StorageError::IoError(self.audit_log.clone(), e);

        if let Some(parent) = self.audit_log.parent() {
            fs::create_dir_all(parent).map_err(io_err)?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.audit_log)
            .map_err(io_err)?;
        writeln!(file, "{} {}", Local::now().to_rfc3339(), message).map_err(io_err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_switch() -> (KillSwitch, LocalStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().to_path_buf());
        (KillSwitch::new(&store), store, temp_dir)
    }

    #[test]
    fn test_not_engaged_by_default() {
        let (switch, _store, _temp) = test_switch();
        assert!(!switch.is_engaged());
        assert!(switch.status().unwrap().is_none());
    }

    #[test]
    fn test_engage_writes_sentinel_and_audit() {
        let (switch, store, _temp) = test_switch();
        let record = switch.engage("local data cleared").unwrap();

        assert!(switch.is_engaged());
        let status = switch.status().unwrap().unwrap();
        assert_eq!(status.engaged_at, record.engaged_at);

        let log = fs::read_to_string(store.audit_log_path()).unwrap();
        assert!(log.contains("kill switch engaged: local data cleared"));
    }

    #[test]
    fn test_audit_appends() {
        let (switch, store, _temp) = test_switch();
        switch.audit("first").unwrap();
        switch.audit("second").unwrap();

        let log = fs::read_to_string(store.audit_log_path()).unwrap();
        assert_eq!(log.lines().count(), 2);
    }

    #[test]
    fn test_unparseable_sentinel_still_engaged() {
        let (switch, store, _temp) = test_switch();
        fs::write(store.sentinel_path(), "yes").unwrap();

        let status = switch.status().unwrap().unwrap();
        assert!(status.engaged_at.is_none());
    }
}
