// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sync coordinator.
//!
//! The [`SyncManager`] is the composition root: it owns one
//! [`TypeObserver`] per tracked type and broadcasts shared settings
//! (delegate, converter) to all of them.
//!
//! # Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use health_sync::{
//!     JsonRecordMapper, MemoryCursorStore, MemoryExternalStore, RecordMapper, SourceProxy,
//!     SyncConfig, SyncManager, TrackedType, SourceType, AuthorizationUnit,
//! };
//!
//! # async fn run(source: Arc<dyn SourceProxy>) {
//! let manager = SyncManager::new(source, Arc::new(MemoryCursorStore::new()), SyncConfig::default());
//!
//! let steps = TrackedType::new(SourceType::new("steps"), vec![AuthorizationUnit::new("steps")]);
//! let mapper: Arc<dyn RecordMapper> = Arc::new(JsonRecordMapper::new(steps));
//! manager.add_tracked_types(vec![mapper], Arc::new(MemoryExternalStore::new()));
//!
//! let failures = manager.start_observing().await;
//! assert!(failures.is_empty());
//! # }
//! ```

mod api;
mod lifecycle;

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info};

use crate::config::SyncConfig;
use crate::cursor::{CursorStore, JsonFileCursorStore, MemoryCursorStore};
use crate::error::SyncError;
use crate::observer::{ObserverDelegate, TypeObserver};
use crate::reconcile::{Converter, RecordMapper, Reconciler, Synchronizer};
use crate::source::SourceProxy;
use crate::storage::ExternalStore;

#[derive(Default)]
struct Registry {
    observers: Vec<TypeObserver>,
    delegate: Option<Arc<dyn ObserverDelegate>>,
    converter: Option<Arc<dyn Converter>>,
}

/// Owns the observers for every tracked type.
///
/// # Thread Safety
///
/// `Send + Sync`. The registry lock is never held across an `.await`;
/// async operations work on a cloned snapshot of the observer list.
pub struct SyncManager {
    source: Arc<dyn SourceProxy>,
    cursor_store: Arc<dyn CursorStore>,
    config: SyncConfig,
    registry: RwLock<Registry>,
}

impl SyncManager {
    pub fn new(source: Arc<dyn SourceProxy>, cursor_store: Arc<dyn CursorStore>, config: SyncConfig) -> Self {
        Self {
            source,
            cursor_store,
            config,
            registry: RwLock::new(Registry::default()),
        }
    }

    /// Build with the cursor store named by `config.cursor_path`, falling back
    /// to an in-memory store when no path is configured.
    pub fn from_config(source: Arc<dyn SourceProxy>, config: SyncConfig) -> Result<Self, SyncError> {
        let cursor_store: Arc<dyn CursorStore> = match &config.cursor_path {
            Some(path) => Arc::new(JsonFileCursorStore::open(path)?),
            None => {
                debug!("No cursor path configured, cursors will not survive a restart");
                Arc::new(MemoryCursorStore::new())
            }
        };
        Ok(Self::new(source, cursor_store, config))
    }

    #[must_use]
    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Snapshot of the registered observers, in registration order.
    #[must_use]
    pub fn observers(&self) -> Vec<TypeObserver> {
        self.registry.read().observers.clone()
    }

    #[must_use]
    pub fn observer(&self, type_id: &str) -> Option<TypeObserver> {
        self.registry
            .read()
            .observers
            .iter()
            .find(|o| o.type_id() == type_id)
            .cloned()
    }

    /// Build a [`Reconciler`] and observer for each mapper. Types already
    /// registered are skipped. Returns the newly created observers.
    pub fn add_tracked_types(
        &self,
        mappers: Vec<Arc<dyn RecordMapper>>,
        external_store: Arc<dyn ExternalStore>,
    ) -> Vec<TypeObserver> {
        let synchronizers = mappers
            .into_iter()
            .map(|mapper| {
                let reconciler = Reconciler::new(mapper, self.source.clone(), external_store.clone());
                Arc::new(reconciler) as Arc<dyn Synchronizer>
            })
            .collect();
        self.add_synchronizers(synchronizers)
    }

    /// Register caller-built synchronizers. Types already registered are skipped.
    pub fn add_synchronizers(&self, synchronizers: Vec<Arc<dyn Synchronizer>>) -> Vec<TypeObserver> {
        let mut registry = self.registry.write();
        let mut added = Vec::new();

        for synchronizer in synchronizers {
            let tracked = synchronizer.tracked_type();
            if registry.observers.iter().any(|o| o.tracked_type().same_as(tracked)) {
                debug!(type_id = %tracked.id(), "Type already tracked, skipping");
                continue;
            }

            let observer = TypeObserver::new(
                self.source.clone(),
                self.cursor_store.clone(),
                synchronizer,
                self.config.clone(),
            );
            observer.set_delegate(registry.delegate.clone());
            if registry.converter.is_some() {
                observer.set_converter(registry.converter.clone());
            }
            info!(type_id = %observer.type_id(), "Tracking type");
            registry.observers.push(observer.clone());
            added.push(observer);
        }

        added
    }

    #[must_use]
    pub fn delegate(&self) -> Option<Arc<dyn ObserverDelegate>> {
        self.registry.read().delegate.clone()
    }

    /// Store the delegate and hand it to every observer.
    pub fn set_delegate(&self, delegate: Option<Arc<dyn ObserverDelegate>>) {
        let mut registry = self.registry.write();
        for observer in &registry.observers {
            observer.set_delegate(delegate.clone());
        }
        registry.delegate = delegate;
    }

    #[must_use]
    pub fn converter(&self) -> Option<Arc<dyn Converter>> {
        self.registry.read().converter.clone()
    }

    /// Store the converter and hand it to every observer's synchronizer.
    pub fn set_converter(&self, converter: Option<Arc<dyn Converter>>) {
        let mut registry = self.registry.write();
        for observer in &registry.observers {
            observer.set_converter(converter.clone());
        }
        registry.converter = converter;
    }
}
