//! Weather record type

use crate::codec::{self, JsonObject, JsonValue};

use super::error::{AggregationError, AggregationResult};

/// Field carrying the record's station identifier
pub const ID_FIELD: &str = "id";

/// Field carrying the sender's Lamport clock at send time
pub const LAMPORT_CLOCK_FIELD: &str = "lamportClock";

/// One station's observation: an ordered set of fields with a textual `id`.
///
/// All fields other than `id` and `lamportClock` are opaque and pass through
/// the store unmodified.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    fields: JsonObject,
}

impl Record {
    pub fn new(fields: JsonObject) -> Self {
        Self { fields }
    }

    /// Parse a record from its wire form; the top level must be an object
    pub fn parse(src: &str) -> AggregationResult<Self> {
        Ok(Self::new(codec::parse_object(src)?))
    }

    /// The station id, if present and textual
    pub fn id(&self) -> Option<&str> {
        self.fields.get(ID_FIELD).and_then(JsonValue::as_str)
    }

    /// The station id, or a validation error naming what is wrong with it
    pub fn require_id(&self) -> AggregationResult<&str> {
        match self.fields.get(ID_FIELD) {
            Some(JsonValue::String(id)) => Ok(id.as_str()),
            Some(other) => Err(AggregationError::Validation(format!(
                "'id' must be a string, found {}",
                other.kind()
            ))),
            None => Err(AggregationError::Validation("missing 'id' field".to_string())),
        }
    }

    /// The sender's clock value.
    ///
    /// Accepts an integer, a float (truncated) or a numeric string; anything
    /// else, including negative values, reads as 0.
    pub fn lamport_clock(&self) -> u64 {
        match self.fields.get(LAMPORT_CLOCK_FIELD) {
            Some(JsonValue::Integer(n)) => u64::try_from(*n).unwrap_or(0),
            Some(JsonValue::Float(f)) if f.is_finite() && *f > 0.0 => *f as u64,
            Some(JsonValue::String(s)) => s.trim().parse::<u64>().unwrap_or(0),
            _ => 0,
        }
    }

    pub fn set_lamport_clock(&mut self, value: u64) {
        self.fields.insert(LAMPORT_CLOCK_FIELD, value);
    }

    pub fn get(&self, field: &str) -> Option<&JsonValue> {
        self.fields.get(field)
    }

    pub fn insert(&mut self, field: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.fields.insert(field, value)
    }

    pub fn fields(&self) -> &JsonObject {
        &self.fields
    }

    /// Compact wire form
    pub fn to_json(&self) -> String {
        codec::object_to_string(&self.fields)
    }
}

impl From<JsonObject> for Record {
    fn from(fields: JsonObject) -> Self {
        Self::new(fields)
    }
}

impl From<Record> for JsonValue {
    fn from(record: Record) -> Self {
        JsonValue::Object(record.fields)
    }
}

impl TryFrom<JsonValue> for Record {
    type Error = AggregationError;

    fn try_from(value: JsonValue) -> AggregationResult<Self> {
        match value {
            JsonValue::Object(fields) => Ok(Self::new(fields)),
            other => Err(AggregationError::Validation(format!(
                "record must be an object, found {}",
                other.kind()
            ))),
        }
    }
}

impl TryFrom<serde_json::Value> for Record {
    type Error = AggregationError;

    fn try_from(value: serde_json::Value) -> AggregationResult<Self> {
        Record::try_from(JsonValue::from(value))
    }
}
