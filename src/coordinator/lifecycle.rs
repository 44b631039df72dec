//! Starting and stopping every observer at once.

use tracing::{info, warn};

use super::SyncManager;
use crate::error::SyncError;
use crate::observer::TypeObserver;

impl SyncManager {
    /// Start every registered observer.
    ///
    /// Observers are started one after another; a failure does not prevent
    /// the rest from starting. Returns `(type_id, error)` per failed type.
    #[tracing::instrument(skip(self))]
    pub async fn start_observing(&self) -> Vec<(String, SyncError)> {
        let observers = self.observers();
        info!(count = observers.len(), "Starting observers");
        let failures = run_each(&observers, |o| async move { o.start().await }).await;
        if !failures.is_empty() {
            warn!(failed = failures.len(), "Some observers failed to start");
        }
        failures
    }

    /// Stop every registered observer, clearing their cursors.
    #[tracing::instrument(skip(self))]
    pub async fn stop_observing(&self) -> Vec<(String, SyncError)> {
        let observers = self.observers();
        info!(count = observers.len(), "Stopping observers");
        let failures = run_each(&observers, |o| async move { o.stop().await }).await;
        if !failures.is_empty() {
            warn!(failed = failures.len(), "Some observers failed to stop cleanly");
        }
        failures
    }
}

async fn run_each<F, Fut>(observers: &[TypeObserver], op: F) -> Vec<(String, SyncError)>
where
    F: Fn(TypeObserver) -> Fut,
    Fut: std::future::Future<Output = Result<(), SyncError>>,
{
    let mut failures = Vec::new();
    for observer in observers {
        if let Err(e) = op(observer.clone()).await {
            failures.push((observer.type_id().to_string(), e));
        }
    }
    failures
}
