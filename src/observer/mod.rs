// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Per-type change observer.
//!
//! A [`TypeObserver`] owns one tracked type's lifecycle:
//!
//! ```text
//!            start() [available, all units determined]
//!   Idle ───────────────────────────────────────────▶ Enabling
//!    ▲  ◀──────────── any unit failed to enable ───────  │
//!    │                                                   │ all units enabled
//!    │                stop()                             ▼
//!    └──────────────────────────────────────────────── Observing
//! ```
//!
//! While observing, the source pushes triggers through the installed
//! [`LiveQuery`]. Triggers and manual [`execute`](TypeObserver::execute)
//! calls share one FIFO so at most one catch-up pass runs at a time.
//!
//! # Locking
//!
//! Three short synchronous locks, none held across an `.await`:
//! - `state`: the Idle/Enabling/Observing transition
//! - `triggers`: the trigger FIFO
//! - `generation`: bumped by stop(); a pass may only commit an anchor under
//!   the generation it started with, and a notification queued under an
//!   older generation is acknowledged without a pass

mod catch_up;
mod delegate;
mod notifications;
mod triggers;

pub use delegate::ObserverDelegate;

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::cursor::{CursorHandle, CursorStore};
use crate::error::SyncError;
use crate::reconcile::{Converter, Synchronizer};
use crate::source::{Ack, LiveQuery, SourceProxy, TriggerHandler};
use crate::types::{Predicate, TrackedType};

use notifications::NotificationAction;
use triggers::{Trigger, TriggerKind, TriggerQueue};

/// Observing state of a [`TypeObserver`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObserverState {
    Idle,
    /// Waiting on every authorization unit to enable notifications
    Enabling,
    Observing,
}

impl fmt::Display for ObserverState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "Idle"),
            Self::Enabling => write!(f, "Enabling"),
            Self::Observing => write!(f, "Observing"),
        }
    }
}

#[derive(Default)]
struct LiveQuerySlot {
    /// Built lazily with the predicate current at build time
    cached: Option<Arc<LiveQuery>>,
    /// What the source is currently delivering triggers for
    installed: Option<Arc<LiveQuery>>,
}

pub(crate) struct ObserverInner {
    me: Weak<ObserverInner>,
    tracked: TrackedType,
    source: Arc<dyn SourceProxy>,
    synchronizer: Arc<dyn Synchronizer>,
    cursor: CursorHandle,
    config: SyncConfig,
    runtime: Option<Handle>,
    delegate: RwLock<Option<Arc<dyn ObserverDelegate>>>,
    state: Mutex<ObserverState>,
    live_query: Mutex<LiveQuerySlot>,
    triggers: TriggerQueue,
    generation: Mutex<u64>,
}

/// Synchronizes one tracked type from the source into its external store.
///
/// Cheap to clone; clones share state.
#[derive(Clone)]
pub struct TypeObserver {
    inner: Arc<ObserverInner>,
}

impl TypeObserver {
    /// Build an idle observer.
    ///
    /// Queued passes are spawned on the tokio runtime current at construction,
    /// or on the runtime current when a trigger arrives.
    pub fn new(
        source: Arc<dyn SourceProxy>,
        cursor_store: Arc<dyn CursorStore>,
        synchronizer: Arc<dyn Synchronizer>,
        config: SyncConfig,
    ) -> Self {
        let tracked = synchronizer.tracked_type().clone();
        let cursor = CursorHandle::new(tracked.id(), cursor_store);
        let inner = Arc::new_cyclic(|me| ObserverInner {
            me: me.clone(),
            tracked,
            source,
            synchronizer,
            cursor,
            config,
            runtime: Handle::try_current().ok(),
            delegate: RwLock::new(None),
            state: Mutex::new(ObserverState::Idle),
            live_query: Mutex::new(LiveQuerySlot::default()),
            triggers: TriggerQueue::default(),
            generation: Mutex::new(0),
        });
        Self { inner }
    }

    #[must_use]
    pub fn tracked_type(&self) -> &TrackedType {
        &self.inner.tracked
    }

    #[must_use]
    pub fn type_id(&self) -> &str {
        self.inner.tracked.id()
    }

    #[must_use]
    pub fn synchronizer(&self) -> &Arc<dyn Synchronizer> {
        &self.inner.synchronizer
    }

    #[must_use]
    pub fn state(&self) -> ObserverState {
        *self.inner.state.lock()
    }

    #[must_use]
    pub fn is_observing(&self) -> bool {
        self.state() == ObserverState::Observing
    }

    /// True once every authorization unit has a determined state.
    /// A type with no units can never start.
    #[must_use]
    pub fn can_start(&self) -> bool {
        let units = &self.inner.tracked.authorization_units;
        !units.is_empty()
            && units
                .iter()
                .all(|unit| self.inner.source.authorization_state(unit).is_determined())
    }

    #[must_use]
    pub fn delegate(&self) -> Option<Arc<dyn ObserverDelegate>> {
        self.inner.delegate()
    }

    pub fn set_delegate(&self, delegate: Option<Arc<dyn ObserverDelegate>>) {
        *self.inner.delegate.write() = delegate;
    }

    #[must_use]
    pub fn converter(&self) -> Option<Arc<dyn Converter>> {
        self.inner.synchronizer.converter()
    }

    pub fn set_converter(&self, converter: Option<Arc<dyn Converter>>) {
        self.inner.synchronizer.set_converter(converter);
    }

    /// Epoch millis of the last committed page.
    #[must_use]
    pub fn last_successful_execution(&self) -> Option<i64> {
        self.inner.cursor.last_success_at()
    }

    #[must_use]
    pub fn filter_predicate(&self) -> Option<Predicate> {
        self.inner.cursor.predicate()
    }

    /// Persist (or clear) the custom filter. The cached live query is dropped
    /// so the next start() rebuilds it with the new filter; change queries
    /// pick it up on their next pass.
    pub fn set_filter_predicate(&self, predicate: Option<Predicate>) -> Result<(), SyncError> {
        self.inner.cursor.save_predicate(predicate.as_ref())?;
        self.inner.live_query.lock().cached = None;
        debug!(type_id = %self.type_id(), has_predicate = predicate.is_some(), "Filter predicate updated");
        Ok(())
    }

    /// Number of triggers queued, including the one being processed.
    #[must_use]
    pub fn pending_triggers(&self) -> usize {
        self.inner.triggers.len()
    }

    /// Enable notifications for every unit and install the live query.
    ///
    /// Silently does nothing when the source is unavailable, a unit is still
    /// undetermined, or the observer is not idle. If any unit fails to enable
    /// the observer returns to idle and the failures come back aggregated.
    #[tracing::instrument(skip(self), fields(type_id = %self.type_id()))]
    pub async fn start(&self) -> Result<(), SyncError> {
        let inner = &self.inner;
        if !inner.source.is_available() || !self.can_start() {
            debug!("Source unavailable or authorization undetermined, not starting");
            return Ok(());
        }

        {
            let mut state = inner.state.lock();
            if *state != ObserverState::Idle {
                return Ok(());
            }
            *state = ObserverState::Enabling;
        }
        crate::metrics::set_observer_state(self.type_id(), ObserverState::Enabling);

        let enabled = notifications::fan_out(
            &inner.source,
            self.type_id(),
            &inner.tracked.authorization_units,
            NotificationAction::Enable(inner.config.update_frequency),
        )
        .await;

        if let Err(e) = enabled {
            *inner.state.lock() = ObserverState::Idle;
            crate::metrics::set_observer_state(self.type_id(), ObserverState::Idle);
            return Err(e);
        }

        *inner.state.lock() = ObserverState::Observing;
        crate::metrics::set_observer_state(self.type_id(), ObserverState::Observing);

        let query = inner.install_live_query();
        info!(query_id = query.id(), source_type = %inner.tracked.source_type, "Starting live query");
        inner.source.execute_live(query);
        Ok(())
    }

    /// Disable notifications, remove the live query and delete all persisted
    /// cursor state.
    ///
    /// No-op unless observing. Notification failures are returned aggregated,
    /// but the observer is idle and its cursor cleared regardless.
    #[tracing::instrument(skip(self), fields(type_id = %self.type_id()))]
    pub async fn stop(&self) -> Result<(), SyncError> {
        let inner = &self.inner;
        if !inner.source.is_available() {
            return Ok(());
        }

        {
            let mut state = inner.state.lock();
            if *state != ObserverState::Observing {
                return Ok(());
            }
            *state = ObserverState::Idle;
        }
        crate::metrics::set_observer_state(self.type_id(), ObserverState::Idle);

        let disabled = notifications::fan_out(
            &inner.source,
            self.type_id(),
            &inner.tracked.authorization_units,
            NotificationAction::Disable,
        )
        .await;

        let installed = {
            let mut slot = inner.live_query.lock();
            slot.cached = None;
            slot.installed.take()
        };
        if let Some(query) = installed {
            info!(query_id = query.id(), source_type = %inner.tracked.source_type, "Stopping live query");
            inner.source.stop_live(&query);
        }

        let cleared = inner.reset_cursor();
        disabled.and(cleared)
    }

    /// Run one catch-up pass now, outside of push notifications.
    ///
    /// Queued behind any pass already in flight. Resolves to
    /// [`SyncError::OperationCancelled`] if the delegate declines.
    pub async fn execute(&self) -> Result<(), SyncError> {
        debug!(type_id = %self.type_id(), "Manual execution requested");
        let (reply, result) = oneshot::channel();
        self.inner.enqueue(Trigger::Manual { reply });
        result.await.unwrap_or(Err(SyncError::OperationCancelled))
    }
}

impl fmt::Debug for TypeObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeObserver")
            .field("type_id", &self.type_id())
            .field("state", &self.state())
            .field("pending_triggers", &self.pending_triggers())
            .finish()
    }
}

impl ObserverInner {
    fn delegate(&self) -> Option<Arc<dyn ObserverDelegate>> {
        self.delegate.read().clone()
    }

    fn install_live_query(&self) -> Arc<LiveQuery> {
        let mut slot = self.live_query.lock();
        let query = match &slot.cached {
            Some(query) => query.clone(),
            None => {
                let handler: Weak<dyn TriggerHandler> = self.me.clone();
                let query = Arc::new(LiveQuery::new(
                    self.tracked.source_type.clone(),
                    self.cursor.predicate(),
                    handler,
                ));
                slot.cached = Some(query.clone());
                query
            }
        };
        slot.installed = Some(query.clone());
        query
    }

    fn current_generation(&self) -> u64 {
        *self.generation.lock()
    }

    /// Invalidate in-flight passes and queued notifications, then delete the cursor.
    fn reset_cursor(&self) -> Result<(), SyncError> {
        let mut generation = self.generation.lock();
        *generation += 1;
        self.cursor.clear()
    }

    fn enqueue(&self, trigger: Trigger) {
        let starts_worker = self.triggers.push(trigger);
        let depth = self.triggers.len();
        crate::metrics::set_trigger_queue_depth(self.tracked.id(), depth);
        if starts_worker {
            self.spawn_worker();
        } else {
            debug!(type_id = %self.tracked.id(), depth, "Observer busy, trigger deferred");
            crate::metrics::record_trigger(self.tracked.id(), "deferred");
        }
    }

    fn spawn_worker(&self) {
        let Some(inner) = self.me.upgrade() else {
            return;
        };
        let Some(runtime) = self.runtime.clone().or_else(|| Handle::try_current().ok()) else {
            error!(type_id = %self.tracked.id(), "No tokio runtime available, failing queued triggers");
            for trigger in self.triggers.drain() {
                trigger.finish(Err(SyncError::Unsupported));
            }
            return;
        };
        runtime.spawn(async move { inner.drain_triggers().await });
    }

    /// Process queued triggers one at a time until the queue is empty.
    async fn drain_triggers(self: Arc<Self>) {
        loop {
            let Some(kind) = self.triggers.head_kind() else {
                return;
            };
            let result = match kind {
                TriggerKind::Notification { generation } if generation != self.current_generation() => {
                    debug!(type_id = %self.tracked.id(), generation, "Notification queued before stop, skipping");
                    crate::metrics::record_trigger(self.tracked.id(), "stale");
                    Err(SyncError::OperationCancelled)
                }
                _ => self.handle_trigger(kind).await,
            };

            let (done, more) = self.triggers.complete();
            crate::metrics::set_trigger_queue_depth(self.tracked.id(), self.triggers.len());
            if let Some(trigger) = done {
                trigger.finish(result);
            }
            if !more {
                return;
            }
        }
    }

    async fn handle_trigger(self: &Arc<Self>, kind: TriggerKind) -> Result<(), SyncError> {
        debug!(type_id = %self.tracked.id(), ?kind, "Handling trigger");
        if let Some(delegate) = self.delegate() {
            let observer = TypeObserver { inner: self.clone() };
            if !delegate.should_run(&observer).await {
                debug!(type_id = %self.tracked.id(), "Delegate declined the pass");
                return Err(SyncError::OperationCancelled);
            }
        }
        self.catch_up().await
    }
}

impl TriggerHandler for ObserverInner {
    fn on_trigger(&self, query_id: u64, ack: Ack) {
        let current = self.live_query.lock().installed.as_ref().map(|q| q.id());
        if current != Some(query_id) {
            debug!(type_id = %self.tracked.id(), query_id, ?current, "Trigger from a retired live query");
            crate::metrics::record_trigger(self.tracked.id(), "stale");
            ack();
            return;
        }
        crate::metrics::record_trigger(self.tracked.id(), "received");
        self.enqueue(Trigger::Notification {
            ack,
            generation: self.current_generation(),
        });
    }
}
