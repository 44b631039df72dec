//! JSON-file cursor store.
//!
//! The whole map is held in memory and rewritten on each mutation. Writes go
//! to a sibling temp file first and are renamed into place, so a crash leaves
//! either the old or the new map on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::{CursorStore, CursorValue};
use crate::error::SyncError;

pub struct JsonFileCursorStore {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, CursorValue>>,
}

impl JsonFileCursorStore {
    /// Open (or lazily create) the store at `path`.
    ///
    /// A missing file is an empty store. An unreadable or corrupt file is an
    /// error rather than silently discarding everyone's progress.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SyncError> {
        let path = path.as_ref().to_path_buf();
        let entries = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .map_err(|e| SyncError::Cursor(format!("read {}: {}", path.display(), e)))?;
            serde_json::from_str(&content)
                .map_err(|e| SyncError::Cursor(format!("parse {}: {}", path.display(), e)))?
        } else {
            BTreeMap::new()
        };
        debug!(path = %path.display(), entries = entries.len(), "Opened cursor store");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self, entries: &BTreeMap<String, CursorValue>) -> Result<(), SyncError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| SyncError::Cursor(format!("create {}: {}", parent.display(), e)))?;
            }
        }
        let content = serde_json::to_string_pretty(entries)
            .map_err(|e| SyncError::Cursor(format!("encode: {}", e)))?;
        let tmp = self.path.with_extension("tmp");
        std::fs::write(&tmp, content)
            .map_err(|e| SyncError::Cursor(format!("write {}: {}", tmp.display(), e)))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| {
            warn!(path = %self.path.display(), error = %e, "Cursor store rename failed");
            SyncError::Cursor(format!("rename {}: {}", self.path.display(), e))
        })
    }
}

impl CursorStore for JsonFileCursorStore {
    fn set(&self, key: &str, value: CursorValue) -> Result<(), SyncError> {
        let mut entries = self.entries.lock();
        let previous = entries.insert(key.to_string(), value);
        if let Err(e) = self.persist(&entries) {
            // Keep memory consistent with disk.
            match previous {
                Some(prev) => entries.insert(key.to_string(), prev),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        let mut entries = self.entries.lock();
        let Some(previous) = entries.remove(key) else {
            return Ok(());
        };
        if let Err(e) = self.persist(&entries) {
            entries.insert(key.to_string(), previous);
            return Err(e);
        }
        Ok(())
    }

    fn get(&self, key: &str) -> Option<CursorValue> {
        self.entries.lock().get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_is_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileCursorStore::open(dir.path().join("cursors.json")).unwrap();
        assert!(store.get("anything").is_none());
    }

    #[test]
    fn test_values_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("cursors.json");

        {
            let store = JsonFileCursorStore::open(&path).unwrap();
            store.set("HeartRate-Anchor", CursorValue::Bytes(vec![1, 2, 3])).unwrap();
            store.set("HeartRate-Last-Execution-Date", CursorValue::Timestamp(42)).unwrap();
            store.set("Steps-Anchor", CursorValue::Bytes(vec![9])).unwrap();
            store.remove("Steps-Anchor").unwrap();
        }

        let reopened = JsonFileCursorStore::open(&path).unwrap();
        assert_eq!(reopened.get_bytes("HeartRate-Anchor"), Some(vec![1, 2, 3]));
        assert_eq!(reopened.get("HeartRate-Last-Execution-Date"), Some(CursorValue::Timestamp(42)));
        assert!(reopened.get("Steps-Anchor").is_none());
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursors.json");
        std::fs::write(&path, b"{not json").unwrap();

        let result = JsonFileCursorStore::open(&path);
        assert!(matches!(result, Err(SyncError::Cursor(_))));
    }

    #[test]
    fn test_remove_missing_key_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cursors.json");
        let store = JsonFileCursorStore::open(&path).unwrap();

        store.remove("nope").unwrap();
        assert!(!path.exists());
    }
}
