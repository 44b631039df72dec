//! Queries handed to the [`SourceProxy`](super::SourceProxy).
//!
//! A [`ChangeQuery`] is a one-shot paginated fetch. A [`LiveQuery`] is a
//! long-lived registration through which the source pushes change
//! notifications ("triggers") back to the observer that installed it.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Weak;

use tracing::{debug, warn};

use crate::error::SyncError;
use crate::types::{Anchor, Predicate, SourceType};

/// Acknowledges a delivered notification back to the source.
pub type Ack = Box<dyn FnOnce() + Send + 'static>;

static NEXT_LIVE_QUERY_ID: AtomicU64 = AtomicU64::new(1);

/// One page request against the change stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeQuery {
    pub source_type: SourceType,
    pub predicate: Option<Predicate>,
    /// `None` reads from the beginning of the stream
    pub anchor: Option<Anchor>,
    /// Maximum upserts + deletions to return
    pub limit: usize,
}

/// Receives triggers from a [`LiveQuery`].
pub trait TriggerHandler: Send + Sync {
    fn on_trigger(&self, query_id: u64, ack: Ack);
}

/// Long-lived notification registration for one source type.
pub struct LiveQuery {
    id: u64,
    source_type: SourceType,
    predicate: Option<Predicate>,
    handler: Weak<dyn TriggerHandler>,
}

impl LiveQuery {
    pub fn new(
        source_type: SourceType,
        predicate: Option<Predicate>,
        handler: Weak<dyn TriggerHandler>,
    ) -> Self {
        Self {
            id: NEXT_LIVE_QUERY_ID.fetch_add(1, Ordering::Relaxed),
            source_type,
            predicate,
            handler,
        }
    }

    /// Process-unique identity of this registration.
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn source_type(&self) -> &SourceType {
        &self.source_type
    }

    #[must_use]
    pub fn predicate(&self) -> Option<&Predicate> {
        self.predicate.as_ref()
    }

    /// Deliver a change notification. `ack` is invoked once the observer has
    /// finished handling it.
    ///
    /// If the owning observer no longer exists the notification is
    /// acknowledged immediately.
    pub fn notify(&self, ack: Ack) {
        match self.handler.upgrade() {
            Some(handler) => handler.on_trigger(self.id, ack),
            None => {
                debug!(query_id = self.id, source_type = %self.source_type, "Observer dropped, acknowledging trigger");
                ack();
            }
        }
    }

    /// Deliver a failed notification. Errored deliveries carry no
    /// acknowledgement; they are logged and dropped.
    pub fn notify_error(&self, error: SyncError) {
        warn!(
            query_id = self.id,
            source_type = %self.source_type,
            error = %error,
            "Live query returned an error"
        );
        crate::metrics::record_trigger(self.source_type.identifier(), "error");
    }
}

impl fmt::Debug for LiveQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LiveQuery")
            .field("id", &self.id)
            .field("source_type", &self.source_type)
            .field("predicate", &self.predicate)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::atomic::AtomicBool;
    use std::sync::Arc;

    #[derive(Default)]
    struct Recorder {
        seen: Mutex<Vec<u64>>,
    }

    impl TriggerHandler for Recorder {
        fn on_trigger(&self, query_id: u64, ack: Ack) {
            self.seen.lock().push(query_id);
            ack();
        }
    }

    #[test]
    fn test_ids_are_unique() {
        let handler: Arc<dyn TriggerHandler> = Arc::new(Recorder::default());
        let a = LiveQuery::new(SourceType::new("Steps"), None, Arc::downgrade(&handler));
        let b = LiveQuery::new(SourceType::new("Steps"), None, Arc::downgrade(&handler));
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn test_notify_reaches_handler() {
        let recorder = Arc::new(Recorder::default());
        let handler: Arc<dyn TriggerHandler> = recorder.clone();
        let query = LiveQuery::new(SourceType::new("Steps"), None, Arc::downgrade(&handler));

        let acked = Arc::new(AtomicBool::new(false));
        let flag = acked.clone();
        query.notify(Box::new(move || flag.store(true, Ordering::SeqCst)));

        assert_eq!(*recorder.seen.lock(), vec![query.id()]);
        assert!(acked.load(Ordering::SeqCst));
    }

    #[test]
    fn test_notify_after_handler_dropped_acks() {
        let handler: Arc<dyn TriggerHandler> = Arc::new(Recorder::default());
        let query = LiveQuery::new(SourceType::new("Steps"), None, Arc::downgrade(&handler));
        drop(handler);

        let acked = Arc::new(AtomicBool::new(false));
        let flag = acked.clone();
        query.notify(Box::new(move || flag.store(true, Ordering::SeqCst)));
        assert!(acked.load(Ordering::SeqCst));
    }
}
