// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! The paginated catch-up loop.
//!
//! ```text
//! ┌──────────────┐   page   ┌─────────────┐   ok   ┌───────────────┐
//! │ fetch_changes│ ───────▶ │ synchronize │ ─────▶ │ commit anchor │
//! └──────────────┘          └─────────────┘        └───────┬───────┘
//!        ▲                                                 │
//!        └────────────── page was full (== limit) ─────────┘
//! ```
//!
//! The anchor only moves after a page fully reconciles, so any failure leaves
//! the old anchor in place and the next trigger redelivers the same page.
//! Iteration is a plain loop: long backlogs never grow the stack.

use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::{ObserverInner, TypeObserver};
use crate::cursor::now_millis;
use crate::error::SyncError;
use crate::source::ChangeQuery;
use crate::types::Anchor;

/// Mutable state of one pass.
pub(crate) struct CatchUp {
    query: ChangeQuery,
    /// Generation the pass started under; a stop() in between invalidates it
    generation: u64,
    pages: usize,
    changes: usize,
}

impl CatchUp {
    #[must_use]
    pub(crate) fn limit(&self) -> usize {
        self.query.limit
    }

    #[must_use]
    pub(crate) fn pages(&self) -> usize {
        self.pages
    }
}

impl ObserverInner {
    pub(super) fn begin_pass(self: &Arc<Self>, observer: &TypeObserver) -> CatchUp {
        let generation = *self.generation.lock();
        let page_size = self.delegate().and_then(|d| d.page_size(observer));
        CatchUp {
            query: ChangeQuery {
                source_type: self.tracked.source_type.clone(),
                predicate: self.cursor.predicate(),
                anchor: self.cursor.anchor(),
                limit: self.config.effective_page_size(page_size),
            },
            generation,
            pages: 0,
            changes: 0,
        }
    }

    /// Drain every pending change, one page at a time.
    #[tracing::instrument(skip_all, fields(type_id = %self.tracked.id()))]
    pub(super) async fn catch_up(self: &Arc<Self>) -> Result<(), SyncError> {
        let observer = TypeObserver { inner: self.clone() };
        let started = Instant::now();
        let mut pass = self.begin_pass(&observer);
        debug!(limit = pass.limit(), anchor = ?pass.query.anchor, "Starting catch-up pass");

        let result = loop {
            let batch = match self.source.fetch_changes(&pass.query).await {
                Ok(batch) => batch,
                Err(e) => {
                    warn!(error = %e, pages = pass.pages, "Change query failed");
                    break Err(e);
                }
            };
            pass.pages += 1;
            let count = batch.len();
            pass.changes += count;
            crate::metrics::record_page(self.tracked.id(), count);
            debug!(
                upserts = batch.upserts.len(),
                deletions = batch.deletions.len(),
                page = pass.pages,
                "Fetched change page"
            );

            if let Err(e) = self.synchronizer.synchronize(&batch.upserts, &batch.deletions).await {
                warn!(error = %e, page = pass.pages, "Failed to synchronize page; anchor not advanced");
                break Err(e);
            }

            if let Err(e) = self.commit(pass.generation, batch.anchor.as_ref()) {
                break Err(e);
            }

            if count < pass.limit() {
                break Ok(());
            }

            debug!(page = pass.pages, "Page was full, fetching next page");
            pass.query.anchor = batch.anchor;
        };

        crate::metrics::record_pass_duration(self.tracked.id(), started.elapsed());
        if matches!(result, Err(SyncError::OperationCancelled)) {
            // Stopped underneath us; nobody is waiting on a report.
            crate::metrics::record_pass(self.tracked.id(), "cancelled");
            return result;
        }
        match &result {
            Ok(()) => {
                info!(pages = pass.pages(), changes = pass.changes, "Catch-up pass complete");
                crate::metrics::record_pass(self.tracked.id(), "success");
            }
            Err(e) => {
                crate::metrics::record_pass(self.tracked.id(), "error");
                crate::metrics::record_error(self.tracked.id(), "catch_up", e.kind());
            }
        }

        if let Some(delegate) = self.delegate() {
            delegate.on_pass_complete(&observer, result.as_ref().err());
        }
        result
    }

    /// Persist the page's anchor and the success timestamp, unless stop() has
    /// cleared the cursor since the pass began.
    fn commit(&self, pass_generation: u64, anchor: Option<&Anchor>) -> Result<(), SyncError> {
        let generation = self.generation.lock();
        if *generation != pass_generation {
            info!(
                type_id = %self.tracked.id(),
                pass_generation,
                current = *generation,
                "Observer was stopped mid-pass, discarding anchor"
            );
            crate::metrics::record_stale_commit(self.tracked.id());
            return Err(SyncError::OperationCancelled);
        }
        self.cursor.save_anchor(anchor)?;
        self.cursor.save_last_success(now_millis())?;
        Ok(())
    }
}
