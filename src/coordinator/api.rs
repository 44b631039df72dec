//! Authorization and data-source queries across observers.

use std::collections::{BTreeSet, HashMap, HashSet};

use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::SyncManager;
use crate::error::SyncError;
use crate::observer::TypeObserver;
use crate::types::AuthorizationUnit;

impl SyncManager {
    /// Ask the user to authorize every unit of every registered type.
    pub async fn request_permissions_for_all(&self) -> Result<bool, SyncError> {
        let observers = self.observers();
        self.request_permissions(&observers).await
    }

    /// Ask the user to authorize the union of the given observers' units.
    ///
    /// Resolves to whether the authorization prompt completed, not whether
    /// access was granted.
    #[tracing::instrument(skip_all, fields(observers = observers.len()))]
    pub async fn request_permissions(&self, observers: &[TypeObserver]) -> Result<bool, SyncError> {
        if !self.source.is_available() {
            return Err(SyncError::Unavailable);
        }

        let units: Vec<AuthorizationUnit> = observers
            .iter()
            .flat_map(|o| o.tracked_type().authorization_units.iter().cloned())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if units.is_empty() {
            return Err(SyncError::NoTrackedUnits);
        }

        debug!(units = units.len(), "Requesting authorization");
        self.source.request_authorization(&units).await
    }

    /// Names of the sources that contributed data to each observer's type,
    /// keyed by type id.
    ///
    /// Queried concurrently. Failed lookups are left out of the map and
    /// returned alongside it.
    pub async fn sources(
        &self,
        observers: &[TypeObserver],
    ) -> (HashMap<String, HashSet<String>>, Vec<SyncError>) {
        let mut tasks = JoinSet::new();
        for observer in observers {
            let source = self.source.clone();
            let type_id = observer.type_id().to_string();
            let source_type = observer.tracked_type().source_type.clone();
            tasks.spawn(async move { (type_id, source.sources(&source_type).await) });
        }

        let mut found = HashMap::new();
        let mut errors = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((type_id, Ok(names))) => {
                    found.insert(type_id, names);
                }
                Ok((type_id, Err(e))) => {
                    warn!(type_id = %type_id, error = %e, "Source lookup failed");
                    errors.push(e);
                }
                Err(join_error) => {
                    warn!(error = %join_error, "Source lookup task aborted");
                    errors.push(SyncError::Source(format!("source lookup aborted: {join_error}")));
                }
            }
        }
        (found, errors)
    }
}
