// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The default [`Synchronizer`]: deletions, then adds, then updates.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

use super::mapper::{Converter, MapContext, RecordMapper};
use super::plan::ReconciliationPlan;
use super::Synchronizer;
use crate::error::SyncError;
use crate::source::SourceProxy;
use crate::storage::ExternalStore;
use crate::types::{DeletionMarker, SourceObject, TrackedType, UnitMetadata};

/// Extension points around a reconcile pass. Both default to no-ops.
#[async_trait]
pub trait SyncHooks: Send + Sync {
    /// Runs before any external store request.
    async fn will_synchronize(&self, _upserts: &[SourceObject], _deletions: &[DeletionMarker]) {}

    /// Runs after the upsert stage, whether it succeeded or not.
    async fn will_finish_synchronizing(&self) {}
}

/// [`SyncHooks`] that do nothing.
pub struct NoHooks;

impl SyncHooks for NoHooks {}

/// Diffs pages of source changes against an [`ExternalStore`].
///
/// Stage order is fixed:
///
/// ```text
/// will_synchronize → delete → fetch existing → resolve units → add → update → will_finish_synchronizing
/// ```
///
/// A deletion failure aborts before any upsert is attempted, and the
/// post-hook is skipped. An add failure aborts before updates.
pub struct Reconciler {
    mapper: Arc<dyn RecordMapper>,
    source: Arc<dyn SourceProxy>,
    store: Arc<dyn ExternalStore>,
    hooks: Arc<dyn SyncHooks>,
    converter: RwLock<Option<Arc<dyn Converter>>>,
    /// Last successfully resolved units, reused if a later resolution fails
    unit_metadata: RwLock<Option<UnitMetadata>>,
}

impl Reconciler {
    pub fn new(
        mapper: Arc<dyn RecordMapper>,
        source: Arc<dyn SourceProxy>,
        store: Arc<dyn ExternalStore>,
    ) -> Self {
        Self {
            mapper,
            source,
            store,
            hooks: Arc::new(NoHooks),
            converter: RwLock::new(None),
            unit_metadata: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_hooks(mut self, hooks: Arc<dyn SyncHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Units resolved by the most recent upsert stage, if any.
    #[must_use]
    pub fn unit_metadata(&self) -> Option<UnitMetadata> {
        self.unit_metadata.read().clone()
    }

    fn type_id(&self) -> &str {
        self.mapper.tracked_type().id()
    }

    async fn delete(&self, deletions: &[DeletionMarker]) -> Result<(), SyncError> {
        if deletions.is_empty() {
            return Ok(());
        }

        let ids = unique_ids(deletions.iter().map(|d| d.uuid));
        let existing = self.store.fetch(&ids).await?;
        if existing.is_empty() {
            debug!(type_id = self.type_id(), requested = ids.len(), "No external records to delete");
            return Ok(());
        }

        let count = existing.len();
        self.store.delete(existing).await?;
        crate::metrics::record_records(self.type_id(), "deleted", count);
        debug!(type_id = self.type_id(), count, "Deleted external records");
        Ok(())
    }

    async fn create_or_update(&self, upserts: &[SourceObject]) -> Result<(), SyncError> {
        if upserts.is_empty() {
            return Ok(());
        }

        let ids = unique_ids(upserts.iter().map(|o| o.uuid));
        let existing = self.store.fetch(&ids).await?;

        let tracked = self.mapper.tracked_type();
        if tracked.unit_bearing {
            match self.source.resolve_unit_metadata(&tracked.authorization_units).await {
                Ok(units) => *self.unit_metadata.write() = Some(units),
                Err(e) => {
                    warn!(type_id = self.type_id(), error = %e, "Failed to resolve unit metadata, continuing without");
                }
            }
        }

        let converter = self.converter.read().clone();
        let units = if tracked.unit_bearing { self.unit_metadata.read().clone() } else { None };
        let ctx = MapContext {
            converter: converter.as_deref(),
            units: units.as_ref(),
        };
        let plan = ReconciliationPlan::build(upserts, existing, self.mapper.as_ref(), &ctx)?;
        self.apply(plan).await
    }

    async fn apply(&self, plan: ReconciliationPlan) -> Result<(), SyncError> {
        let ReconciliationPlan { to_add, to_update } = plan;

        if !to_add.is_empty() {
            let count = to_add.len();
            self.store.add(to_add).await?;
            crate::metrics::record_records(self.type_id(), "added", count);
        }

        if !to_update.is_empty() {
            let count = to_update.len();
            self.store.update(to_update).await?;
            crate::metrics::record_records(self.type_id(), "updated", count);
        }

        Ok(())
    }
}

#[async_trait]
impl Synchronizer for Reconciler {
    fn tracked_type(&self) -> &TrackedType {
        self.mapper.tracked_type()
    }

    fn converter(&self) -> Option<Arc<dyn Converter>> {
        self.converter.read().clone()
    }

    fn set_converter(&self, converter: Option<Arc<dyn Converter>>) {
        *self.converter.write() = converter;
    }

    #[tracing::instrument(skip_all, fields(type_id = %self.type_id(), upserts = upserts.len(), deletions = deletions.len()))]
    async fn synchronize(&self, upserts: &[SourceObject], deletions: &[DeletionMarker]) -> Result<(), SyncError> {
        let started = Instant::now();
        self.hooks.will_synchronize(upserts, deletions).await;

        if let Err(e) = self.delete(deletions).await {
            warn!(error = %e, "Deletion stage failed, skipping upserts");
            crate::metrics::record_error(self.type_id(), "delete", e.kind());
            return Err(e);
        }

        let result = self.create_or_update(upserts).await;
        self.hooks.will_finish_synchronizing().await;

        if let Err(ref e) = result {
            warn!(error = %e, "Upsert stage failed");
            crate::metrics::record_error(self.type_id(), "upsert", e.kind());
        }
        crate::metrics::record_latency(self.type_id(), "synchronize", started.elapsed());
        result
    }
}

/// Dedup ids, keeping first-seen order.
fn unique_ids(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    let mut seen: HashSet<Uuid> = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}
