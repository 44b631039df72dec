//! Error taxonomy shared by every component.
//!
//! Failures never cross a component boundary as panics: the observer reports
//! them through its returned futures and the delegate, the reconciler returns
//! them from [`Synchronizer::synchronize`](crate::reconcile::Synchronizer::synchronize).

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SyncError {
    /// The health-record source is not accessible on this host.
    #[error("health data source is unavailable")]
    Unavailable,
    /// Nothing is configured to synchronize.
    #[error("no authorization units were specified")]
    NoTrackedUnits,
    /// The operation is not valid in the current platform/mode.
    #[error("operation is not supported")]
    Unsupported,
    /// A delegate declined to run the pass, or the observer was stopped mid-pass.
    #[error("operation was cancelled")]
    OperationCancelled,
    #[error("source error: {0}")]
    Source(String),
    #[error("external store error: {0}")]
    Store(String),
    #[error("cursor store error: {0}")]
    Cursor(String),
    #[error("conversion error: {0}")]
    Conversion(String),
    /// One or more authorization units failed to enable/disable notifications.
    #[error("{} notification request(s) failed", .0.len())]
    Notifications(Vec<SyncError>),
}

impl SyncError {
    /// Short label for metrics and log fields.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Unavailable => "unavailable",
            Self::NoTrackedUnits => "no_tracked_units",
            Self::Unsupported => "unsupported",
            Self::OperationCancelled => "cancelled",
            Self::Source(_) => "source",
            Self::Store(_) => "store",
            Self::Cursor(_) => "cursor",
            Self::Conversion(_) => "conversion",
            Self::Notifications(_) => "notifications",
        }
    }

    /// Aggregated per-unit failures, or an empty slice for any other variant.
    #[must_use]
    pub fn aggregated(&self) -> &[SyncError] {
        match self {
            Self::Notifications(errors) => errors,
            _ => &[],
        }
    }
}
