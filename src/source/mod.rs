// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The health-record source seam.
//!
//! [`SourceProxy`] is a thin call-through to the platform store: it runs
//! change queries, installs live queries, toggles push notifications per
//! authorization unit and reports authorization state. It holds no
//! invariants of its own.

mod query;

pub use query::{Ack, ChangeQuery, LiveQuery, TriggerHandler};

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;

use crate::error::SyncError;
use crate::types::{AuthorizationState, AuthorizationUnit, ChangeBatch, SourceType, UnitMetadata, UpdateFrequency};

#[async_trait]
pub trait SourceProxy: Send + Sync {
    /// Whether the source exists on this host at all.
    fn is_available(&self) -> bool;

    fn authorization_state(&self, unit: &AuthorizationUnit) -> AuthorizationState;

    /// Ask the user for read access to `units`. Resolves to whether the
    /// request itself completed (not whether access was granted).
    async fn request_authorization(&self, units: &[AuthorizationUnit]) -> Result<bool, SyncError>;

    /// Fetch one page of changes after `query.anchor`.
    async fn fetch_changes(&self, query: &ChangeQuery) -> Result<ChangeBatch, SyncError>;

    /// Install a live query. The source delivers triggers through
    /// [`LiveQuery::notify`], starting with one initial delivery.
    fn execute_live(&self, query: Arc<LiveQuery>);

    /// Remove a previously installed live query.
    fn stop_live(&self, query: &LiveQuery);

    async fn enable_notifications(
        &self,
        unit: &AuthorizationUnit,
        frequency: UpdateFrequency,
    ) -> Result<(), SyncError>;

    async fn disable_notifications(&self, unit: &AuthorizationUnit) -> Result<(), SyncError>;

    async fn disable_all_notifications(&self) -> Result<(), SyncError> {
        Err(SyncError::Unsupported)
    }

    /// Preferred display unit for each unit-bearing authorization unit.
    async fn resolve_unit_metadata(&self, units: &[AuthorizationUnit]) -> Result<UnitMetadata, SyncError>;

    /// Names of the apps/devices that have written objects of `source_type`.
    async fn sources(&self, _source_type: &SourceType) -> Result<HashSet<String>, SyncError> {
        Err(SyncError::Unsupported)
    }
}
