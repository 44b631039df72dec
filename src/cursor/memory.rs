use dashmap::DashMap;

use super::{CursorStore, CursorValue};
use crate::error::SyncError;

/// Ephemeral cursor store. Progress does not survive a restart.
pub struct MemoryCursorStore {
    data: DashMap<String, CursorValue>,
}

impl MemoryCursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current entry count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }
}

impl Default for MemoryCursorStore {
    fn default() -> Self {
        Self::new()
    }
}

impl CursorStore for MemoryCursorStore {
    fn set(&self, key: &str, value: CursorValue) -> Result<(), SyncError> {
        self.data.insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), SyncError> {
        self.data.remove(key);
        Ok(())
    }

    fn get(&self, key: &str) -> Option<CursorValue> {
        self.data.get(key).map(|r| r.value().clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_store_is_empty() {
        let store = MemoryCursorStore::new();
        assert!(store.is_empty());
        assert_eq!(store.len(), 0);
    }

    #[test]
    fn test_set_overwrites() {
        let store = MemoryCursorStore::new();
        store.set("k", CursorValue::Timestamp(1)).unwrap();
        store.set("k", CursorValue::Timestamp(2)).unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get("k"), Some(CursorValue::Timestamp(2)));
    }

    #[test]
    fn test_remove_nonexistent_is_ok() {
        let store = MemoryCursorStore::new();
        assert!(store.remove("nonexistent").is_ok());
    }

    #[test]
    fn test_get_bytes_filters_timestamps() {
        let store = MemoryCursorStore::new();
        store.set("bytes", CursorValue::Bytes(vec![1, 2])).unwrap();
        store.set("ts", CursorValue::Timestamp(9)).unwrap();

        assert_eq!(store.get_bytes("bytes"), Some(vec![1, 2]));
        assert_eq!(store.get_bytes("ts"), None);
        assert_eq!(store.get_bytes("missing"), None);
    }
}
