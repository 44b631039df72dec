//! Add-vs-update classification of one page of upserts.

use std::collections::{HashMap, HashSet};

use uuid::Uuid;

use super::mapper::{MapContext, RecordMapper};
use crate::error::SyncError;
use crate::types::{ExternalRecord, SourceObject};

/// What a page of upserts turns into against the external store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReconciliationPlan {
    pub to_add: Vec<ExternalRecord>,
    pub to_update: Vec<ExternalRecord>,
}

impl ReconciliationPlan {
    /// Classify `upserts` against the records just fetched for their ids.
    ///
    /// An upsert is an update iff a fetched record carries its id; the fetched
    /// record is merged in place. Repeated ids within one page fold into the
    /// same add or update rather than producing duplicates.
    pub fn build(
        upserts: &[SourceObject],
        existing: Vec<ExternalRecord>,
        mapper: &dyn RecordMapper,
        ctx: &MapContext<'_>,
    ) -> Result<Self, SyncError> {
        let mut existing: HashMap<Uuid, ExternalRecord> =
            existing.into_iter().map(|record| (record.id, record)).collect();
        let mut update_order: Vec<Uuid> = Vec::new();
        let mut updated: HashSet<Uuid> = HashSet::new();
        let mut pending_adds: HashMap<Uuid, usize> = HashMap::new();
        let mut plan = Self::default();

        for object in upserts {
            if let Some(record) = existing.get_mut(&object.uuid) {
                mapper.merge(&mut record.payload, object, ctx)?;
                if updated.insert(object.uuid) {
                    update_order.push(object.uuid);
                }
            } else if let Some(&index) = pending_adds.get(&object.uuid) {
                mapper.merge(&mut plan.to_add[index].payload, object, ctx)?;
            } else if let Some(payload) = mapper.to_payload(object, ctx)? {
                pending_adds.insert(object.uuid, plan.to_add.len());
                plan.to_add.push(ExternalRecord::new(object.uuid, payload));
            }
        }

        plan.to_update = update_order
            .into_iter()
            .filter_map(|id| existing.remove(&id))
            .collect();
        Ok(plan)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.to_add.is_empty() && self.to_update.is_empty()
    }
}
