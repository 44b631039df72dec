use async_trait::async_trait;
use uuid::Uuid;

use crate::error::SyncError;
use crate::types::ExternalRecord;

/// The consumer side of a synchronization: wherever records end up.
///
/// Every method completes exactly once. Implementations report their own
/// failures as [`SyncError::Store`].
#[async_trait]
pub trait ExternalStore: Send + Sync {
    /// Fetch the records that already exist for `ids`.
    ///
    /// Anything returned is assumed to exist and will be updated, never created.
    /// Ids with no record are simply absent from the result.
    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<ExternalRecord>, SyncError>;

    async fn add(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError>;

    async fn update(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError>;

    async fn delete(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError>;
}
