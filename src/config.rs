//! Configuration for the synchronization engine.
//!
//! # Example
//!
//! ```
//! use health_sync::{SyncConfig, UpdateFrequency};
//!
//! // Minimal config (uses defaults)
//! let config = SyncConfig::default();
//! assert_eq!(config.page_size, 25);
//! assert_eq!(config.update_frequency, UpdateFrequency::Immediate);
//!
//! // Custom config
//! let config = SyncConfig {
//!     page_size: 100,
//!     cursor_path: Some("./cursors.json".into()),
//!     ..Default::default()
//! };
//! assert_eq!(config.effective_page_size(None), 100);
//! ```

use serde::Deserialize;

use crate::types::UpdateFrequency;

/// Configuration for the synchronization engine.
///
/// All fields have defaults, so an empty document deserializes to
/// [`SyncConfig::default()`].
#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
    /// Changes fetched per catch-up page when the delegate has no opinion (default: 25)
    #[serde(default = "default_page_size")]
    pub page_size: usize,

    /// How eagerly the source should push change notifications
    #[serde(default)]
    pub update_frequency: UpdateFrequency,

    /// JSON file used to persist cursors across restarts (None = caller supplies a store)
    #[serde(default)]
    pub cursor_path: Option<String>,
}

fn default_page_size() -> usize { 25 }

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            update_frequency: UpdateFrequency::default(),
            cursor_path: None,
        }
    }
}

impl SyncConfig {
    /// Resolve the page limit for a pass.
    ///
    /// A delegate override wins over the configured value. Zero is clamped to
    /// one, otherwise an empty page would look "full" and the pass would never end.
    #[must_use]
    pub fn effective_page_size(&self, delegate_override: Option<usize>) -> usize {
        delegate_override.unwrap_or(self.page_size).max(1)
    }
}
