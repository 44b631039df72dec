use async_trait::async_trait;

use super::TypeObserver;
use crate::error::SyncError;

/// Optional per-observer policy hooks. Every method has a permissive default.
#[async_trait]
pub trait ObserverDelegate: Send + Sync {
    /// Maximum changes per page. `None` falls back to the configured page size.
    fn page_size(&self, _observer: &TypeObserver) -> Option<usize> {
        None
    }

    /// Asked before every pass; returning `false` cancels the pass without
    /// touching the cursor.
    async fn should_run(&self, _observer: &TypeObserver) -> bool {
        true
    }

    /// Called once a pass has drained the backlog (`None`) or stopped on an error.
    fn on_pass_complete(&self, _observer: &TypeObserver, _error: Option<&SyncError>) {}
}
