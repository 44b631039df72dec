//! # Health Sync
//!
//! Change-capture synchronization from a health-record source into an
//! arbitrary external store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        SyncManager                          │
//! │  • One TypeObserver per tracked type                       │
//! │  • Broadcasts delegate / converter, bulk start & stop      │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                       TypeObserver                          │
//! │  • Enables notifications per authorization unit            │
//! │  • Serializes triggers: one catch-up pass at a time        │
//! │  • Paginates change queries, commits anchor per page       │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                  (upserts + deletions per page)
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Reconciler                           │
//! │  • Deletes, then adds, then updates                        │
//! │  • Correlates on the source object's UUID                  │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//!                    ExternalStore (caller's)
//! ```
//!
//! Progress lives in a [`CursorStore`]: the anchor only advances after a page
//! has been fully reconciled, so a crash or failure replays the page rather
//! than losing it.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use health_sync::{
//!     AuthorizationUnit, JsonRecordMapper, MemoryExternalStore, RecordMapper, SourceProxy,
//!     SourceType, SyncConfig, SyncManager, TrackedType,
//! };
//!
//! # async fn run(source: Arc<dyn SourceProxy>) -> Result<(), health_sync::SyncError> {
//! let config = SyncConfig {
//!     cursor_path: Some("./cursors.json".into()),
//!     ..Default::default()
//! };
//! let manager = SyncManager::from_config(source, config)?;
//!
//! let heart_rate = TrackedType::new(
//!     SourceType::new("HeartRate"),
//!     vec![AuthorizationUnit::new("HeartRate")],
//! ).with_units();
//! let mappers: Vec<Arc<dyn RecordMapper>> = vec![Arc::new(JsonRecordMapper::new(heart_rate))];
//! manager.add_tracked_types(mappers, Arc::new(MemoryExternalStore::new()));
//!
//! manager.request_permissions_for_all().await?;
//! for (type_id, error) in manager.start_observing().await {
//!     eprintln!("{type_id} failed to start: {error}");
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`coordinator`]: The [`SyncManager`] composition root
//! - [`observer`]: Per-type lifecycle and catch-up loop
//! - [`reconcile`]: Diffing change pages into the external store
//! - [`source`]: The health-record source seam
//! - [`storage`]: The external store seam and an in-memory store
//! - [`cursor`]: Anchor/predicate/timestamp persistence

pub mod config;
pub mod coordinator;
pub mod cursor;
pub mod error;
pub mod metrics;
pub mod observer;
pub mod reconcile;
pub mod source;
pub mod storage;
pub mod types;

pub use config::SyncConfig;
pub use coordinator::SyncManager;
pub use cursor::{CursorHandle, CursorStore, CursorValue, JsonFileCursorStore, MemoryCursorStore};
pub use error::SyncError;
pub use observer::{ObserverDelegate, ObserverState, TypeObserver};
pub use reconcile::{
    Converter, JsonRecordMapper, MapContext, NoHooks, Reconciler, ReconciliationPlan, RecordMapper,
    SyncHooks, Synchronizer,
};
pub use source::{Ack, ChangeQuery, LiveQuery, SourceProxy, TriggerHandler};
pub use storage::{ExternalStore, MemoryExternalStore};
pub use types::{
    Anchor, AuthorizationState, AuthorizationUnit, ChangeBatch, DeletionMarker, ExternalRecord,
    Predicate, SourceObject, SourceType, TrackedType, UnitMetadata, UpdateFrequency,
};
