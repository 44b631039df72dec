//! Data model shared by the observer, reconciler and coordinator.
//!
//! Source objects and external records correlate on a single key: the
//! source object's UUID. Everything else in a payload is opaque to the engine.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// One independently permissioned sub-component of a tracked type
/// (e.g. the systolic half of a blood pressure reading).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AuthorizationUnit(pub String);

impl AuthorizationUnit {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AuthorizationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// The queryable source-side type a tracked type maps to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SourceType(pub String);

impl SourceType {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self(identifier.into())
    }

    #[must_use]
    pub fn identifier(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Static descriptor of one synchronized type.
///
/// # Example
///
/// ```
/// use health_sync::{TrackedType, AuthorizationUnit, SourceType};
///
/// let bp = TrackedType::new(
///     SourceType::new("BloodPressure"),
///     vec![AuthorizationUnit::new("Systolic"), AuthorizationUnit::new("Diastolic")],
/// );
/// assert_eq!(bp.id(), "BloodPressure");
/// assert!(!bp.unit_bearing);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackedType {
    pub source_type: SourceType,
    pub authorization_units: Vec<AuthorizationUnit>,
    /// Whether payloads carry measurement units that need resolving before conversion
    #[serde(default)]
    pub unit_bearing: bool,
}

impl TrackedType {
    pub fn new(source_type: SourceType, authorization_units: Vec<AuthorizationUnit>) -> Self {
        Self {
            source_type,
            authorization_units,
            unit_bearing: false,
        }
    }

    /// Mark this type as carrying unit-bearing fields.
    #[must_use]
    pub fn with_units(mut self) -> Self {
        self.unit_bearing = true;
        self
    }

    /// Stable identifier; cursor keys are derived from it.
    #[must_use]
    pub fn id(&self) -> &str {
        self.source_type.identifier()
    }

    /// Two descriptors describe the same tracked type when they query the same
    /// source type under the same set of authorization units.
    #[must_use]
    pub fn same_as(&self, other: &TrackedType) -> bool {
        if self.source_type != other.source_type {
            return false;
        }
        let mut mine = self.authorization_units.clone();
        let mut theirs = other.authorization_units.clone();
        mine.sort();
        mine.dedup();
        theirs.sort();
        theirs.dedup();
        mine == theirs
    }
}

/// Per-unit authorization as reported by the source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationState {
    /// The user has not been asked yet
    Undetermined,
    Authorized,
    Denied,
}

impl AuthorizationState {
    /// Denied still counts as determined: the user answered.
    #[must_use]
    pub fn is_determined(&self) -> bool {
        !matches!(self, Self::Undetermined)
    }
}

/// How often the source should push change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFrequency {
    #[default]
    Immediate,
    Hourly,
    Daily,
    Weekly,
}

/// Opaque change-stream checkpoint issued by the source.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Anchor(pub Vec<u8>);

impl fmt::Debug for Anchor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Anchor({})", hex::encode(&self.0))
    }
}

/// Opaque, source-interpreted query filter.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Predicate(pub Vec<u8>);

impl fmt::Debug for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Predicate({})", hex::encode(&self.0))
    }
}

/// A created or modified object read from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceObject {
    pub uuid: Uuid,
    pub payload: Value,
}

impl SourceObject {
    pub fn new(uuid: Uuid, payload: Value) -> Self {
        Self { uuid, payload }
    }
}

/// Marker for an object removed from the source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeletionMarker {
    pub uuid: Uuid,
    #[serde(default)]
    pub metadata: Option<Value>,
}

impl DeletionMarker {
    pub fn new(uuid: Uuid) -> Self {
        Self { uuid, metadata: None }
    }
}

/// One page of change-capture output.
#[derive(Debug, Clone, Default)]
pub struct ChangeBatch {
    pub upserts: Vec<SourceObject>,
    pub deletions: Vec<DeletionMarker>,
    /// Checkpoint after this page; `None` means the source has no anchor to offer
    pub anchor: Option<Anchor>,
}

impl ChangeBatch {
    /// Total number of changes on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// The external store's representation of one source object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalRecord {
    pub id: Uuid,
    pub payload: Value,
}

impl ExternalRecord {
    pub fn new(id: Uuid, payload: Value) -> Self {
        Self { id, payload }
    }
}

/// Preferred display unit for each unit-bearing authorization unit.
pub type UnitMetadata = HashMap<AuthorizationUnit, String>;
