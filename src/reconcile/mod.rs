//! Reconciliation of source changes into the external store.
//!
//! The observer only ever talks to a [`Synchronizer`]. [`Reconciler`] is the
//! stock implementation; callers with unusual stores can bring their own.

mod mapper;
mod plan;
mod reconciler;

pub use mapper::{Converter, JsonRecordMapper, MapContext, RecordMapper};
pub use plan::ReconciliationPlan;
pub use reconciler::{NoHooks, Reconciler, SyncHooks};

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{DeletionMarker, SourceObject, TrackedType};

#[async_trait]
pub trait Synchronizer: Send + Sync {
    fn tracked_type(&self) -> &TrackedType;

    fn converter(&self) -> Option<Arc<dyn Converter>>;

    fn set_converter(&self, converter: Option<Arc<dyn Converter>>);

    /// Apply one page of changes. Empty inputs succeed without touching the store.
    ///
    /// Side effects land only in the external store; cursor state is the
    /// caller's business.
    async fn synchronize(&self, upserts: &[SourceObject], deletions: &[DeletionMarker]) -> Result<(), SyncError>;
}
