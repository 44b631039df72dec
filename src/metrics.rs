// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for health-sync.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for installing a recorder/exporter.
//!
//! # Metric Naming Convention
//! - `health_sync_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `type_id`: source type identifier of the tracked type
//! - `status`: success, error, cancelled
//! - `stage`: catch_up, delete, upsert

use metrics::{counter, gauge, histogram};
use std::time::Duration;

use crate::observer::ObserverState;

// ═══════════════════════════════════════════════════════════════════════════
// TRIGGERS - Live query notifications
// ═══════════════════════════════════════════════════════════════════════════

/// Record a trigger delivered through a live query.
/// `outcome` is one of received, deferred, stale, error.
pub fn record_trigger(type_id: &str, outcome: &str) {
    counter!(
        "health_sync_triggers_total",
        "type_id" => type_id.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

/// Set the number of queued triggers (including the one in flight)
pub fn set_trigger_queue_depth(type_id: &str, depth: usize) {
    gauge!(
        "health_sync_trigger_queue_depth",
        "type_id" => type_id.to_string()
    )
    .set(depth as f64);
}

// ═══════════════════════════════════════════════════════════════════════════
// CATCH-UP PASSES
// ═══════════════════════════════════════════════════════════════════════════

/// Record one fetched change page and its size
pub fn record_page(type_id: &str, changes: usize) {
    counter!(
        "health_sync_pages_total",
        "type_id" => type_id.to_string()
    )
    .increment(1);
    histogram!(
        "health_sync_page_changes",
        "type_id" => type_id.to_string()
    )
    .record(changes as f64);
}

/// Record a finished catch-up pass
pub fn record_pass(type_id: &str, status: &str) {
    counter!(
        "health_sync_passes_total",
        "type_id" => type_id.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record wall time of a catch-up pass
pub fn record_pass_duration(type_id: &str, duration: Duration) {
    histogram!(
        "health_sync_pass_seconds",
        "type_id" => type_id.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record an anchor commit discarded because the observer was stopped mid-pass
pub fn record_stale_commit(type_id: &str) {
    counter!(
        "health_sync_stale_commits_total",
        "type_id" => type_id.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// RECONCILIATION
// ═══════════════════════════════════════════════════════════════════════════

/// Record records written to the external store.
/// `operation` is one of added, updated, deleted.
pub fn record_records(type_id: &str, operation: &str, count: usize) {
    counter!(
        "health_sync_records_total",
        "type_id" => type_id.to_string(),
        "operation" => operation.to_string()
    )
    .increment(count as u64);
}

/// Record operation latency
pub fn record_latency(type_id: &str, operation: &str, duration: Duration) {
    histogram!(
        "health_sync_operation_seconds",
        "type_id" => type_id.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING - Categorized error counters for alerting
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(type_id: &str, stage: &str, error_type: &str) {
    counter!(
        "health_sync_errors_total",
        "type_id" => type_id.to_string(),
        "stage" => stage.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a unit whose notification enable/disable failed
pub fn record_notification_failure(type_id: &str, action: &str) {
    counter!(
        "health_sync_notification_failures_total",
        "type_id" => type_id.to_string(),
        "action" => action.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// OBSERVER STATE
// ═══════════════════════════════════════════════════════════════════════════

/// Set observer state (0 = Idle, 1 = Enabling, 2 = Observing)
pub fn set_observer_state(type_id: &str, state: ObserverState) {
    let level = match state {
        ObserverState::Idle => 0.0,
        ObserverState::Enabling => 1.0,
        ObserverState::Observing => 2.0,
    };
    gauge!(
        "health_sync_observer_state",
        "type_id" => type_id.to_string()
    )
    .set(level);
}
