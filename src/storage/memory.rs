use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use super::traits::ExternalStore;
use crate::error::SyncError;
use crate::types::ExternalRecord;

/// In-process [`ExternalStore`] keyed by record id.
pub struct MemoryExternalStore {
    data: DashMap<Uuid, ExternalRecord>,
}

impl MemoryExternalStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Get current record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn get(&self, id: &Uuid) -> Option<ExternalRecord> {
        self.data.get(id).map(|r| r.value().clone())
    }

    /// Seed a record without going through the trait.
    pub fn insert(&self, record: ExternalRecord) {
        self.data.insert(record.id, record);
    }

    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for MemoryExternalStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExternalStore for MemoryExternalStore {
    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<ExternalRecord>, SyncError> {
        Ok(ids
            .iter()
            .filter_map(|id| self.data.get(id).map(|r| r.value().clone()))
            .collect())
    }

    async fn add(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError> {
        for record in records {
            self.data.insert(record.id, record);
        }
        Ok(())
    }

    async fn update(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError> {
        for record in records {
            self.data.insert(record.id, record);
        }
        Ok(())
    }

    async fn delete(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError> {
        for record in records {
            self.data.remove(&record.id);
        }
        Ok(())
    }
}
