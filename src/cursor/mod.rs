// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-type cursor persistence.
//!
//! A [`Cursor`] is three independent entries in a plain key-value
//! [`CursorStore`], keyed off the tracked type's identifier:
//!
//! ```text
//! {typeId}-Anchor               bytes      opaque change-stream checkpoint
//! {typeId}-Predicate            bytes      opaque query filter
//! {typeId}-Last-Execution-Date  timestamp  epoch millis of the last committed page
//! ```
//!
//! Absence of the anchor means "query from the beginning".

mod file;
mod memory;

pub use file::JsonFileCursorStore;
pub use memory::MemoryCursorStore;

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::SyncError;
use crate::types::{Anchor, Predicate};

const ANCHOR_SUFFIX: &str = "-Anchor";
const PREDICATE_SUFFIX: &str = "-Predicate";
const LAST_SUCCESS_SUFFIX: &str = "-Last-Execution-Date";

/// A value held by a [`CursorStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum CursorValue {
    Bytes(Vec<u8>),
    /// Epoch millis
    Timestamp(i64),
}

/// Generic settings store the cursors persist into.
pub trait CursorStore: Send + Sync {
    fn set(&self, key: &str, value: CursorValue) -> Result<(), SyncError>;
    fn remove(&self, key: &str) -> Result<(), SyncError>;
    fn get(&self, key: &str) -> Option<CursorValue>;

    /// Like [`get`](Self::get), but only yields byte values.
    fn get_bytes(&self, key: &str) -> Option<Vec<u8>> {
        match self.get(key)? {
            CursorValue::Bytes(bytes) => Some(bytes),
            CursorValue::Timestamp(_) => None,
        }
    }
}

/// The deterministic keys for one tracked type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CursorKeys {
    pub anchor: String,
    pub predicate: String,
    pub last_success: String,
}

impl CursorKeys {
    #[must_use]
    pub fn for_type(type_id: &str) -> Self {
        Self {
            anchor: format!("{type_id}{ANCHOR_SUFFIX}"),
            predicate: format!("{type_id}{PREDICATE_SUFFIX}"),
            last_success: format!("{type_id}{LAST_SUCCESS_SUFFIX}"),
        }
    }

    /// All three keys, in the order they are cleared.
    #[must_use]
    pub fn all(&self) -> [&str; 3] {
        [&self.anchor, &self.last_success, &self.predicate]
    }
}

/// Snapshot of one type's persisted state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cursor {
    pub anchor: Option<Anchor>,
    pub predicate: Option<Predicate>,
    pub last_success_at: Option<i64>,
}

/// A tracked type's view onto the shared [`CursorStore`].
#[derive(Clone)]
pub struct CursorHandle {
    keys: CursorKeys,
    store: Arc<dyn CursorStore>,
}

impl CursorHandle {
    pub fn new(type_id: &str, store: Arc<dyn CursorStore>) -> Self {
        Self {
            keys: CursorKeys::for_type(type_id),
            store,
        }
    }

    #[must_use]
    pub fn keys(&self) -> &CursorKeys {
        &self.keys
    }

    #[must_use]
    pub fn load(&self) -> Cursor {
        Cursor {
            anchor: self.anchor(),
            predicate: self.predicate(),
            last_success_at: self.last_success_at(),
        }
    }

    #[must_use]
    pub fn anchor(&self) -> Option<Anchor> {
        self.store.get_bytes(&self.keys.anchor).map(Anchor)
    }

    #[must_use]
    pub fn predicate(&self) -> Option<Predicate> {
        self.store.get_bytes(&self.keys.predicate).map(Predicate)
    }

    #[must_use]
    pub fn last_success_at(&self) -> Option<i64> {
        match self.store.get(&self.keys.last_success)? {
            CursorValue::Timestamp(ms) => Some(ms),
            CursorValue::Bytes(_) => {
                warn!(key = %self.keys.last_success, "Last-success entry holds bytes, ignoring");
                None
            }
        }
    }

    /// Persist the anchor; an absent anchor removes the entry.
    pub fn save_anchor(&self, anchor: Option<&Anchor>) -> Result<(), SyncError> {
        match anchor {
            Some(anchor) => self.store.set(&self.keys.anchor, CursorValue::Bytes(anchor.0.clone())),
            None => self.store.remove(&self.keys.anchor),
        }
    }

    pub fn save_last_success(&self, at_millis: i64) -> Result<(), SyncError> {
        self.store.set(&self.keys.last_success, CursorValue::Timestamp(at_millis))
    }

    /// Persist the predicate; `None` removes the entry.
    pub fn save_predicate(&self, predicate: Option<&Predicate>) -> Result<(), SyncError> {
        match predicate {
            Some(predicate) => self.store.set(&self.keys.predicate, CursorValue::Bytes(predicate.0.clone())),
            None => self.store.remove(&self.keys.predicate),
        }
    }

    /// Remove every entry. Attempts all three removals and reports the first failure.
    pub fn clear(&self) -> Result<(), SyncError> {
        let mut first_error = None;
        for key in self.keys.all() {
            if let Err(e) = self.store.remove(key) {
                warn!(key, error = %e, "Failed to remove cursor entry");
                first_error.get_or_insert(e);
            }
        }
        first_error.map_or(Ok(()), Err)
    }
}

/// Current wall-clock time in epoch millis.
#[must_use]
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keys_for_type() {
        let keys = CursorKeys::for_type("HeartRate");
        assert_eq!(keys.anchor, "HeartRate-Anchor");
        assert_eq!(keys.predicate, "HeartRate-Predicate");
        assert_eq!(keys.last_success, "HeartRate-Last-Execution-Date");
    }

    #[test]
    fn test_absent_cursor_loads_empty() {
        let handle = CursorHandle::new("HeartRate", Arc::new(MemoryCursorStore::new()));
        assert_eq!(handle.load(), Cursor::default());
    }

    #[test]
    fn test_save_and_load() {
        let store = Arc::new(MemoryCursorStore::new());
        let handle = CursorHandle::new("HeartRate", store.clone());

        handle.save_anchor(Some(&Anchor(vec![1, 2, 3]))).unwrap();
        handle.save_predicate(Some(&Predicate(vec![9]))).unwrap();
        handle.save_last_success(1_735_776_000_000).unwrap();

        let cursor = handle.load();
        assert_eq!(cursor.anchor, Some(Anchor(vec![1, 2, 3])));
        assert_eq!(cursor.predicate, Some(Predicate(vec![9])));
        assert_eq!(cursor.last_success_at, Some(1_735_776_000_000));
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_saving_absent_anchor_removes_entry() {
        let store = Arc::new(MemoryCursorStore::new());
        let handle = CursorHandle::new("Steps", store.clone());

        handle.save_anchor(Some(&Anchor(vec![7]))).unwrap();
        handle.save_anchor(None).unwrap();

        assert!(handle.anchor().is_none());
        assert!(store.is_empty());
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = Arc::new(MemoryCursorStore::new());
        let handle = CursorHandle::new("Steps", store.clone());
        handle.save_anchor(Some(&Anchor(vec![7]))).unwrap();
        handle.save_predicate(Some(&Predicate(vec![1]))).unwrap();
        handle.save_last_success(5).unwrap();

        handle.clear().unwrap();

        assert!(store.is_empty());
        assert_eq!(handle.load(), Cursor::default());
    }

    #[test]
    fn test_mistyped_entries_are_ignored() {
        let store = Arc::new(MemoryCursorStore::new());
        let handle = CursorHandle::new("Steps", store.clone());
        store.set("Steps-Anchor", CursorValue::Timestamp(3)).unwrap();
        store.set("Steps-Last-Execution-Date", CursorValue::Bytes(vec![1])).unwrap();

        assert!(handle.anchor().is_none());
        assert!(handle.last_success_at().is_none());
    }
}
