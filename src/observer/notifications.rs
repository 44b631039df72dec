//! Concurrent enable/disable of push notifications across authorization units.

use std::sync::Arc;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::SyncError;
use crate::source::SourceProxy;
use crate::types::{AuthorizationUnit, UpdateFrequency};

#[derive(Debug, Clone, Copy)]
pub(crate) enum NotificationAction {
    Enable(UpdateFrequency),
    Disable,
}

impl NotificationAction {
    fn label(&self) -> &'static str {
        match self {
            Self::Enable(_) => "enable",
            Self::Disable => "disable",
        }
    }
}

/// Dispatch `action` for every unit at once and wait for all of them.
///
/// One unit failing does not stop the others; the result is an error iff any
/// unit failed, carrying every failure.
pub(crate) async fn fan_out(
    source: &Arc<dyn SourceProxy>,
    type_id: &str,
    units: &[AuthorizationUnit],
    action: NotificationAction,
) -> Result<(), SyncError> {
    let mut tasks = JoinSet::new();
    for unit in units {
        let source = source.clone();
        let unit = unit.clone();
        tasks.spawn(async move {
            let result = match action {
                NotificationAction::Enable(frequency) => source.enable_notifications(&unit, frequency).await,
                NotificationAction::Disable => source.disable_notifications(&unit).await,
            };
            (unit, result)
        });
    }

    let mut errors = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((unit, Ok(()))) => {
                debug!(type_id, unit = %unit, action = action.label(), "Notifications updated");
            }
            Ok((unit, Err(e))) => {
                warn!(type_id, unit = %unit, action = action.label(), error = %e, "Notification request failed");
                crate::metrics::record_notification_failure(type_id, action.label());
                errors.push(e);
            }
            Err(join_error) => {
                warn!(type_id, action = action.label(), error = %join_error, "Notification task aborted");
                crate::metrics::record_notification_failure(type_id, action.label());
                errors.push(SyncError::Source(format!("notification task aborted: {join_error}")));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(SyncError::Notifications(errors))
    }
}
