//! Persisted record of the last hashes both sides agreed on.

use serde::{Deserialize, Serialize};

use crate::storage::{read_optional, write_atomic, LocalStore, StorageError};
use std::path::PathBuf;

/// Hashes recorded after the last successful pull or push.
///
/// An empty string and an absent key both mean "unknown".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncMeta {
    pub local_hash: Option<String>,
    pub remote_hash: Option<String>,
}

impl SyncMeta {
    /// Meta for a state where local and remote content are identical.
    pub fn agreed(hash: impl Into<String>) -> Self {
        let hash = hash.into();
        Self {
            local_hash: Some(hash.clone()),
            remote_hash: Some(hash),
        }
    }

    pub fn local(&self) -> Option<&str> {
        self.local_hash.as_deref().filter(|h| !h.is_empty())
    }

    pub fn remote(&self) -> Option<&str> {
        self.remote_hash.as_deref().filter(|h| !h.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.local().is_none() && self.remote().is_none()
    }
}

#[derive(Debug, Clone)]
pub struct MetaStore {
    path: PathBuf,
}

impl MetaStore {
    pub fn new(store: &LocalStore) -> Self {
        Self {
            path: store.meta_path(),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    /// Loads the meta record.
    ///
    /// A missing, unreadable or malformed file yields an empty record; every
    /// hash is then treated as unknown.
    pub fn load(&self) -> SyncMeta {
        let text = match read_optional(&self.path) {
            Ok(Some(text)) => text,
            Ok(None) => return SyncMeta::default(),
            Err(e) => {
                tracing::warn!("Ignoring sync meta: {}", e);
                return SyncMeta::default();
            }
        };

        match serde_json::from_str(&text) {
            Ok(meta) => meta,
            Err(e) => {
                tracing::warn!("Ignoring malformed sync meta {}: {}", self.path.display(), e);
                SyncMeta::default()
            }
        }
    }

    pub fn save(&self, meta: &SyncMeta) -> Result<(), StorageError> {
        let json = serde_json::to_vec_pretty(meta)
            .map_err(|e| StorageError::Meta(self.path.clone(), e))?;
        write_atomic(&self.path, &json)
    }

    pub fn clear(&self) -> Result<(), StorageError> {
        self.save(&SyncMeta::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn test_meta_store() -> (MetaStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let store = LocalStore::new(temp_dir.path().to_path_buf());
        (MetaStore::new(&store), temp_dir)
    }

    #[test]
    fn test_missing_meta_is_empty() {
        let (meta_store, _temp) = test_meta_store();
        assert!(meta_store.load().is_empty());
    }

    #[test]
    fn test_save_and_load() {
        let (meta_store, _temp) = test_meta_store();
        let meta = SyncMeta {
            local_hash: Some("aaa".to_string()),
            remote_hash: Some("bbb".to_string()),
        };
        meta_store.save(&meta).unwrap();
        assert_eq!(meta_store.load(), meta);
    }

    #[test]
    fn test_empty_strings_are_unknown() {
        let meta: SyncMeta =
            serde_json::from_str(r#"{"local_hash": "", "remote_hash": "abc"}"#).unwrap();
        assert_eq!(meta.local(), None);
        assert_eq!(meta.remote(), Some("abc"));
    }

    #[test]
    fn test_malformed_meta_is_empty() {
        let (meta_store, _temp) = test_meta_store();
        std::fs::write(meta_store.path(), "{not json").unwrap();
        assert!(meta_store.load().is_empty());
    }

    #[test]
    fn test_clear() {
        let (meta_store, _temp) = test_meta_store();
        meta_store.save(&SyncMeta::agreed("abc")).unwrap();
        meta_store.clear().unwrap();
        assert!(meta_store.load().is_empty());
    }
}
