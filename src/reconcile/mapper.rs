//! Conversion from source objects to external payloads.

use serde_json::Value;

use crate::error::SyncError;
use crate::types::{SourceObject, TrackedType, UnitMetadata};

/// Caller-supplied conversion of source payloads, shared across types.
pub trait Converter: Send + Sync {
    fn convert(&self, object: &SourceObject) -> Result<Value, SyncError>;
}

/// Inputs available to a [`RecordMapper`] while converting.
#[derive(Clone, Copy, Default)]
pub struct MapContext<'a> {
    pub converter: Option<&'a dyn Converter>,
    /// Resolved only for unit-bearing types
    pub units: Option<&'a UnitMetadata>,
}

/// Per-type conversion between source objects and external payloads.
///
/// Record identity is not the mapper's concern: an external record always
/// takes the UUID of the source object it was built from.
pub trait RecordMapper: Send + Sync {
    fn tracked_type(&self) -> &TrackedType;

    /// Build the payload for a new external record.
    ///
    /// `Ok(None)` skips the object; an error fails the reconcile so the page
    /// is redelivered.
    fn to_payload(&self, object: &SourceObject, ctx: &MapContext<'_>) -> Result<Option<Value>, SyncError>;

    /// Fold `object` into a record that already exists externally.
    fn merge(&self, existing: &mut Value, object: &SourceObject, ctx: &MapContext<'_>) -> Result<(), SyncError>;
}

/// Default mapper: the converter's output (or the raw source payload), with
/// resolved units attached under `"units"` when the payload is an object.
pub struct JsonRecordMapper {
    tracked_type: TrackedType,
}

impl JsonRecordMapper {
    pub fn new(tracked_type: TrackedType) -> Self {
        Self { tracked_type }
    }

    fn build(&self, object: &SourceObject, ctx: &MapContext<'_>) -> Result<Value, SyncError> {
        let mut payload = match ctx.converter {
            Some(converter) => converter.convert(object)?,
            None => object.payload.clone(),
        };
        if let (Some(units), Value::Object(map)) = (ctx.units, &mut payload) {
            let units: serde_json::Map<String, Value> = units
                .iter()
                .map(|(unit, symbol)| (unit.to_string(), Value::String(symbol.clone())))
                .collect();
            map.insert("units".to_string(), Value::Object(units));
        }
        Ok(payload)
    }
}

impl RecordMapper for JsonRecordMapper {
    fn tracked_type(&self) -> &TrackedType {
        &self.tracked_type
    }

    fn to_payload(&self, object: &SourceObject, ctx: &MapContext<'_>) -> Result<Option<Value>, SyncError> {
        self.build(object, ctx).map(Some)
    }

    fn merge(&self, existing: &mut Value, object: &SourceObject, ctx: &MapContext<'_>) -> Result<(), SyncError> {
        *existing = self.build(object, ctx)?;
        Ok(())
    }
}
