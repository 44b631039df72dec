//! Shared test doubles.
//!
//! - [`MockSource`]: scripted change pages, per-unit enable/disable failures,
//!   an optional gate that parks `fetch_changes`, and a way to fire triggers
//!   through the installed live query
//! - [`RecordingStore`]: in-memory external store that logs every call and
//!   fails on demand
//! - [`RecordingDelegate`] / [`RecordingHooks`]: capture callbacks

#![allow(dead_code)]

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::{oneshot, Semaphore};
use uuid::Uuid;

use health_sync::{
    Anchor, AuthorizationState, AuthorizationUnit, ChangeBatch, ChangeQuery, DeletionMarker,
    ExternalRecord, ExternalStore, LiveQuery, MemoryExternalStore, ObserverDelegate, SourceObject,
    SourceProxy, SourceType, SyncError, SyncHooks, TrackedType, TypeObserver, UnitMetadata,
    UpdateFrequency,
};

// =============================================================================
// Fixtures
// =============================================================================

pub fn tracked(name: &str, units: &[&str]) -> TrackedType {
    TrackedType::new(
        SourceType::new(name),
        units.iter().map(|u| AuthorizationUnit::new(*u)).collect(),
    )
}

pub fn sample(value: i64) -> SourceObject {
    SourceObject::new(Uuid::new_v4(), json!({ "value": value }))
}

pub fn samples(n: usize) -> Vec<SourceObject> {
    (0..n as i64).map(sample).collect()
}

pub fn anchor(tag: u8) -> Anchor {
    Anchor(vec![tag])
}

pub fn page(upserts: Vec<SourceObject>, deletions: Vec<DeletionMarker>, tag: u8) -> ChangeBatch {
    ChangeBatch {
        upserts,
        deletions,
        anchor: Some(anchor(tag)),
    }
}

/// Poll `cond` until it holds, panicking after two seconds.
pub async fn wait_until(mut cond: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

// =============================================================================
// Source
// =============================================================================

pub struct MockSource {
    pub available: AtomicBool,
    pub default_state: Mutex<AuthorizationState>,
    pub states: Mutex<HashMap<AuthorizationUnit, AuthorizationState>>,
    pub enable_failures: Mutex<HashSet<AuthorizationUnit>>,
    pub disable_failures: Mutex<HashSet<AuthorizationUnit>>,
    pub enabled: Mutex<Vec<(AuthorizationUnit, UpdateFrequency)>>,
    pub disabled: Mutex<Vec<AuthorizationUnit>>,
    pub pages: Mutex<VecDeque<Result<ChangeBatch, SyncError>>>,
    pub queries: Mutex<Vec<ChangeQuery>>,
    pub live: Mutex<Vec<Arc<LiveQuery>>>,
    pub stopped: Mutex<Vec<u64>>,
    pub unit_metadata: Mutex<Result<UnitMetadata, SyncError>>,
    pub unit_lookups: AtomicUsize,
    pub authorization_requests: Mutex<Vec<Vec<AuthorizationUnit>>>,
    pub source_names: Mutex<HashMap<SourceType, Result<HashSet<String>, SyncError>>>,
    /// Deliver one trigger as soon as a live query is installed
    pub initial_delivery: AtomicBool,
    pub in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    gate: Mutex<Option<Arc<Semaphore>>>,
}

impl Default for MockSource {
    fn default() -> Self {
        Self {
            available: AtomicBool::new(true),
            default_state: Mutex::new(AuthorizationState::Authorized),
            states: Mutex::new(HashMap::new()),
            enable_failures: Mutex::new(HashSet::new()),
            disable_failures: Mutex::new(HashSet::new()),
            enabled: Mutex::new(Vec::new()),
            disabled: Mutex::new(Vec::new()),
            pages: Mutex::new(VecDeque::new()),
            queries: Mutex::new(Vec::new()),
            live: Mutex::new(Vec::new()),
            stopped: Mutex::new(Vec::new()),
            unit_metadata: Mutex::new(Ok(UnitMetadata::new())),
            unit_lookups: AtomicUsize::new(0),
            authorization_requests: Mutex::new(Vec::new()),
            source_names: Mutex::new(HashMap::new()),
            initial_delivery: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            gate: Mutex::new(None),
        }
    }
}

impl MockSource {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_page(&self, page: ChangeBatch) {
        self.pages.lock().push_back(Ok(page));
    }

    pub fn push_failure(&self, error: SyncError) {
        self.pages.lock().push_back(Err(error));
    }

    pub fn set_state(&self, unit: &str, state: AuthorizationState) {
        self.states.lock().insert(AuthorizationUnit::new(unit), state);
    }

    pub fn fail_enable(&self, unit: &str) {
        self.enable_failures.lock().insert(AuthorizationUnit::new(unit));
    }

    pub fn fail_disable(&self, unit: &str) {
        self.disable_failures.lock().insert(AuthorizationUnit::new(unit));
    }

    /// Park every subsequent `fetch_changes` until [`MockSource::open_gate`].
    pub fn close_gate(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn open_gate(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().len()
    }

    pub fn latest_live_query(&self) -> Option<Arc<LiveQuery>> {
        self.live.lock().last().cloned()
    }

    /// Deliver a trigger through `query`; the receiver resolves once acked.
    pub fn fire(&self, query: &LiveQuery) -> oneshot::Receiver<()> {
        let (tx, rx) = oneshot::channel();
        query.notify(Box::new(move || {
            let _ = tx.send(());
        }));
        rx
    }

    /// Deliver a trigger through the most recently installed live query.
    pub fn fire_latest(&self) -> oneshot::Receiver<()> {
        let query = self.latest_live_query().expect("no live query installed");
        self.fire(&query)
    }
}

#[async_trait]
impl SourceProxy for MockSource {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn authorization_state(&self, unit: &AuthorizationUnit) -> AuthorizationState {
        self.states
            .lock()
            .get(unit)
            .copied()
            .unwrap_or(*self.default_state.lock())
    }

    async fn request_authorization(&self, units: &[AuthorizationUnit]) -> Result<bool, SyncError> {
        self.authorization_requests.lock().push(units.to_vec());
        Ok(true)
    }

    async fn fetch_changes(&self, query: &ChangeQuery) -> Result<ChangeBatch, SyncError> {
        self.queries.lock().push(query.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            let _permit = gate.acquire().await;
        }

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.pages.lock().pop_front().unwrap_or_else(|| {
            Ok(ChangeBatch {
                anchor: query.anchor.clone(),
                ..Default::default()
            })
        })
    }

    fn execute_live(&self, query: Arc<LiveQuery>) {
        self.live.lock().push(query.clone());
        if self.initial_delivery.load(Ordering::SeqCst) {
            query.notify(Box::new(|| {}));
        }
    }

    fn stop_live(&self, query: &LiveQuery) {
        self.stopped.lock().push(query.id());
    }

    async fn enable_notifications(
        &self,
        unit: &AuthorizationUnit,
        frequency: UpdateFrequency,
    ) -> Result<(), SyncError> {
        if self.enable_failures.lock().contains(unit) {
            return Err(SyncError::Source(format!("cannot enable {unit}")));
        }
        self.enabled.lock().push((unit.clone(), frequency));
        Ok(())
    }

    async fn disable_notifications(&self, unit: &AuthorizationUnit) -> Result<(), SyncError> {
        if self.disable_failures.lock().contains(unit) {
            return Err(SyncError::Source(format!("cannot disable {unit}")));
        }
        self.disabled.lock().push(unit.clone());
        Ok(())
    }

    async fn resolve_unit_metadata(&self, _units: &[AuthorizationUnit]) -> Result<UnitMetadata, SyncError> {
        self.unit_lookups.fetch_add(1, Ordering::SeqCst);
        self.unit_metadata.lock().clone()
    }

    async fn sources(&self, source_type: &SourceType) -> Result<HashSet<String>, SyncError> {
        self.source_names
            .lock()
            .get(source_type)
            .cloned()
            .unwrap_or_else(|| Ok(HashSet::new()))
    }
}

// =============================================================================
// External store
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    Fetch(Vec<Uuid>),
    Add(Vec<Uuid>),
    Update(Vec<Uuid>),
    Delete(Vec<Uuid>),
}

#[derive(Default)]
pub struct RecordingStore {
    pub inner: MemoryExternalStore,
    pub calls: Mutex<Vec<StoreCall>>,
    pub fail_fetch: AtomicBool,
    pub fail_add: AtomicBool,
    pub fail_update: AtomicBool,
    pub fail_delete: AtomicBool,
}

impl RecordingStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn calls(&self) -> Vec<StoreCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    pub fn adds(&self) -> Vec<Vec<Uuid>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Add(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn updates(&self) -> Vec<Vec<Uuid>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Update(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    pub fn fetches(&self) -> Vec<Vec<Uuid>> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                StoreCall::Fetch(ids) => Some(ids),
                _ => None,
            })
            .collect()
    }

    fn maybe_fail(flag: &AtomicBool, what: &str) -> Result<(), SyncError> {
        if flag.load(Ordering::SeqCst) {
            Err(SyncError::Store(format!("injected {what} failure")))
        } else {
            Ok(())
        }
    }
}

fn ids(records: &[ExternalRecord]) -> Vec<Uuid> {
    records.iter().map(|r| r.id).collect()
}

#[async_trait]
impl ExternalStore for RecordingStore {
    async fn fetch(&self, ids: &[Uuid]) -> Result<Vec<ExternalRecord>, SyncError> {
        self.calls.lock().push(StoreCall::Fetch(ids.to_vec()));
        Self::maybe_fail(&self.fail_fetch, "fetch")?;
        self.inner.fetch(ids).await
    }

    async fn add(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError> {
        self.calls.lock().push(StoreCall::Add(ids(&records)));
        Self::maybe_fail(&self.fail_add, "add")?;
        self.inner.add(records).await
    }

    async fn update(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError> {
        self.calls.lock().push(StoreCall::Update(ids(&records)));
        Self::maybe_fail(&self.fail_update, "update")?;
        self.inner.update(records).await
    }

    async fn delete(&self, records: Vec<ExternalRecord>) -> Result<(), SyncError> {
        self.calls.lock().push(StoreCall::Delete(ids(&records)));
        Self::maybe_fail(&self.fail_delete, "delete")?;
        self.inner.delete(records).await
    }
}

// =============================================================================
// Delegate & hooks
// =============================================================================

pub struct RecordingDelegate {
    pub page_size: Option<usize>,
    pub allow: AtomicBool,
    pub completions: Mutex<Vec<Option<SyncError>>>,
}

impl RecordingDelegate {
    pub fn new(page_size: Option<usize>) -> Arc<Self> {
        Arc::new(Self {
            page_size,
            allow: AtomicBool::new(true),
            completions: Mutex::new(Vec::new()),
        })
    }

    pub fn completions(&self) -> Vec<Option<SyncError>> {
        self.completions.lock().clone()
    }
}

#[async_trait]
impl ObserverDelegate for RecordingDelegate {
    fn page_size(&self, _observer: &TypeObserver) -> Option<usize> {
        self.page_size
    }

    async fn should_run(&self, _observer: &TypeObserver) -> bool {
        self.allow.load(Ordering::SeqCst)
    }

    fn on_pass_complete(&self, _observer: &TypeObserver, error: Option<&SyncError>) {
        self.completions.lock().push(error.cloned());
    }
}

#[derive(Default)]
pub struct RecordingHooks {
    pub events: Mutex<Vec<&'static str>>,
}

impl RecordingHooks {
    pub fn events(&self) -> Vec<&'static str> {
        self.events.lock().clone()
    }
}

#[async_trait]
impl SyncHooks for RecordingHooks {
    async fn will_synchronize(&self, _upserts: &[SourceObject], _deletions: &[DeletionMarker]) {
        self.events.lock().push("will_synchronize");
    }

    async fn will_finish_synchronizing(&self) {
        self.events.lock().push("will_finish_synchronizing");
    }
}
