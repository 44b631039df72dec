// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic health-sync usage example.
//!
//! Demonstrates:
//! 1. Wiring a SyncManager to an in-process change journal
//! 2. Requesting authorization and starting observation
//! 3. Pushing a trigger and letting the observer catch up in pages
//! 4. Deleting a sample and re-syncing
//! 5. Displaying metrics
//! 6. Stopping (which clears persisted cursors)
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::oneshot;
use uuid::Uuid;

use health_sync::{
    Anchor, AuthorizationState, AuthorizationUnit, ChangeBatch, ChangeQuery, DeletionMarker,
    JsonRecordMapper, LiveQuery, MemoryExternalStore, RecordMapper, SourceObject, SourceProxy,
    SourceType, SyncConfig, SyncError, SyncManager, TrackedType, UnitMetadata, UpdateFrequency,
};

enum Change {
    Upsert(SourceObject),
    Delete(Uuid),
}

/// Append-only change journal standing in for a platform health store.
/// The anchor is the big-endian journal offset.
#[derive(Default)]
struct JournalSource {
    journal: Mutex<Vec<Change>>,
    live: Mutex<Vec<Arc<LiveQuery>>>,
}

impl JournalSource {
    fn record(&self, change: Change) {
        self.journal.lock().push(change);
    }

    /// Push a notification and wait until the observer has handled it.
    async fn notify(&self) {
        let query = self.live.lock().last().cloned();
        if let Some(query) = query {
            let (tx, rx) = oneshot::channel();
            query.notify(Box::new(move || {
                let _ = tx.send(());
            }));
            let _ = rx.await;
        }
    }
}

fn offset(anchor: Option<&Anchor>) -> usize {
    anchor
        .and_then(|a| a.0.as_slice().try_into().ok())
        .map(|bytes: [u8; 8]| u64::from_be_bytes(bytes) as usize)
        .unwrap_or(0)
}

#[async_trait]
impl SourceProxy for JournalSource {
    fn is_available(&self) -> bool {
        true
    }

    fn authorization_state(&self, _unit: &AuthorizationUnit) -> AuthorizationState {
        AuthorizationState::Authorized
    }

    async fn request_authorization(&self, units: &[AuthorizationUnit]) -> Result<bool, SyncError> {
        println!("   🔐 Authorization prompt for {} unit(s)", units.len());
        Ok(true)
    }

    async fn fetch_changes(&self, query: &ChangeQuery) -> Result<ChangeBatch, SyncError> {
        let journal = self.journal.lock();
        let start = offset(query.anchor.as_ref()).min(journal.len());
        let end = (start + query.limit).min(journal.len());

        let mut batch = ChangeBatch::default();
        for change in &journal[start..end] {
            match change {
                Change::Upsert(object) => batch.upserts.push(object.clone()),
                Change::Delete(uuid) => batch.deletions.push(DeletionMarker::new(*uuid)),
            }
        }
        batch.anchor = Some(Anchor((end as u64).to_be_bytes().to_vec()));
        Ok(batch)
    }

    fn execute_live(&self, query: Arc<LiveQuery>) {
        self.live.lock().push(query.clone());
        // Installing a query reports whatever is already pending.
        query.notify(Box::new(|| {}));
    }

    fn stop_live(&self, query: &LiveQuery) {
        self.live.lock().retain(|q| q.id() != query.id());
    }

    async fn enable_notifications(&self, _unit: &AuthorizationUnit, _frequency: UpdateFrequency) -> Result<(), SyncError> {
        Ok(())
    }

    async fn disable_notifications(&self, _unit: &AuthorizationUnit) -> Result<(), SyncError> {
        Ok(())
    }

    async fn resolve_unit_metadata(&self, units: &[AuthorizationUnit]) -> Result<UnitMetadata, SyncError> {
        Ok(units.iter().map(|u| (u.clone(), "count/min".to_string())).collect())
    }

    async fn sources(&self, _source_type: &SourceType) -> Result<HashSet<String>, SyncError> {
        Ok(HashSet::from(["Demo Watch".to_string()]))
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().map_err(|_| "failed to install metrics recorder")?;

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║            health-sync: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Wire up
    // ─────────────────────────────────────────────────────────────────────────
    let source = Arc::new(JournalSource::default());
    let store = Arc::new(MemoryExternalStore::new());
    let config = SyncConfig {
        page_size: 4,
        ..Default::default()
    };
    let manager = SyncManager::from_config(source.clone(), config)?;

    let heart_rate = TrackedType::new(
        SourceType::new("HeartRate"),
        vec![AuthorizationUnit::new("HeartRate")],
    )
    .with_units();
    let mappers: Vec<Arc<dyn RecordMapper>> = vec![Arc::new(JsonRecordMapper::new(heart_rate))];
    manager.add_tracked_types(mappers, store.clone());

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Authorize and start
    // ─────────────────────────────────────────────────────────────────────────
    println!("🚀 Starting observers...");
    manager.request_permissions_for_all().await?;
    for (type_id, error) in manager.start_observing().await {
        println!("   ❌ {type_id}: {error}");
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Record samples and trigger a catch-up
    // ─────────────────────────────────────────────────────────────────────────
    let mut first = None;
    for bpm in [62, 64, 71, 88, 93, 77, 65, 60, 58, 61] {
        let object = SourceObject::new(Uuid::new_v4(), json!({ "bpm": bpm }));
        first.get_or_insert(object.uuid);
        source.record(Change::Upsert(object));
    }
    println!("\n📝 Recorded 10 samples, notifying...");
    source.notify().await;
    println!("   External store holds {} record(s)", store.len());

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Delete one and re-sync manually
    // ─────────────────────────────────────────────────────────────────────────
    if let Some(uuid) = first {
        source.record(Change::Delete(uuid));
    }
    if let Some(observer) = manager.observer("HeartRate") {
        observer.execute().await?;
        println!("\n🗑  After deletion: {} record(s)", store.len());
        println!("   Last success at {:?}", observer.last_successful_execution());
    }

    let (sources, _) = manager.sources(&manager.observers()).await;
    println!("   Data sources: {:?}", sources);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📊 Metrics:");
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 6. Stop
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Stopping observers...");
    let failures = manager.stop_observing().await;
    println!("   Stopped with {} failure(s)\n", failures.len());

    Ok(())
}

/// Dump all captured metrics
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<String> = snapshotter
        .snapshot()
        .into_vec()
        .into_iter()
        .map(|(composite_key, _, _, value)| {
            let (_, key) = composite_key.into_parts();
            let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
            let rendered = match value {
                DebugValue::Counter(v) => v.to_string(),
                DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
                DebugValue::Histogram(samples) => format!("{} sample(s)", samples.len()),
            };
            format!("{}{{{}}} = {}", key.name(), labels.join(","), rendered)
        })
        .collect();
    lines.sort();

    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for line in lines {
        println!("   │  └─ {line}");
    }
}
