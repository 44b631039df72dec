//! FIFO of pending triggers for one observer.
//!
//! The head entry stays queued while its pass runs, so "queue non-empty"
//! doubles as "a pass is in flight". Whoever pushes into an empty queue owns
//! starting the worker; everyone else is deferred behind it.

use std::collections::VecDeque;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use crate::error::SyncError;
use crate::source::Ack;

pub(crate) enum Trigger {
    /// Pushed by the source through the installed live query, tagged with
    /// the observer generation current when it was queued
    Notification { ack: Ack, generation: u64 },
    /// Requested through [`TypeObserver::execute`](super::TypeObserver::execute)
    Manual { reply: oneshot::Sender<Result<(), SyncError>> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TriggerKind {
    Notification { generation: u64 },
    Manual,
}

impl Trigger {
    fn kind(&self) -> TriggerKind {
        match self {
            Self::Notification { generation, .. } => TriggerKind::Notification {
                generation: *generation,
            },
            Self::Manual { .. } => TriggerKind::Manual,
        }
    }

    /// Acknowledge the notification or hand the pass result to the caller.
    pub(crate) fn finish(self, result: Result<(), SyncError>) {
        match self {
            Self::Notification { ack, .. } => ack(),
            Self::Manual { reply } => {
                // Receiver gone means the caller stopped waiting.
                let _ = reply.send(result);
            }
        }
    }
}

#[derive(Default)]
pub(crate) struct TriggerQueue {
    entries: Mutex<VecDeque<Trigger>>,
}

impl TriggerQueue {
    /// Enqueue; `true` when the queue was empty and the caller must start the worker.
    pub(crate) fn push(&self, trigger: Trigger) -> bool {
        let mut entries = self.entries.lock();
        entries.push_back(trigger);
        entries.len() == 1
    }

    /// Kind of the entry currently being processed.
    pub(crate) fn head_kind(&self) -> Option<TriggerKind> {
        self.entries.lock().front().map(Trigger::kind)
    }

    /// Dequeue the processed head. The flag says whether another entry is waiting.
    pub(crate) fn complete(&self) -> (Option<Trigger>, bool) {
        let mut entries = self.entries.lock();
        let done = entries.pop_front();
        (done, !entries.is_empty())
    }

    /// Remove everything, e.g. when no runtime can process the queue.
    pub(crate) fn drain(&self) -> Vec<Trigger> {
        self.entries.lock().drain(..).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.lock().len()
    }
}
