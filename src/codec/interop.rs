//! Conversions between the codec's value tree and `serde_json::Value`

use serde_json::{Map, Number, Value};

use super::value::{JsonObject, JsonValue};

impl From<Value> for JsonValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => JsonValue::Null,
            Value::Bool(b) => JsonValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => JsonValue::Integer(i),
                None => JsonValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => JsonValue::String(s),
            Value::Array(items) => JsonValue::Array(items.into_iter().map(JsonValue::from).collect()),
            Value::Object(map) => JsonValue::Object(
                map.into_iter()
                    .map(|(k, v)| (k, JsonValue::from(v)))
                    .collect(),
            ),
        }
    }
}

impl From<JsonValue> for Value {
    fn from(value: JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(b),
            JsonValue::Integer(n) => Value::Number(n.into()),
            // Non-finite floats have no JSON form
            JsonValue::Float(f) => Number::from_f64(f).map(Value::Number).unwrap_or(Value::Null),
            JsonValue::String(s) => Value::String(s),
            JsonValue::Array(items) => Value::Array(items.into_iter().map(Value::from).collect()),
            JsonValue::Object(obj) => Value::Object(object_to_map(obj)),
        }
    }
}

fn object_to_map(obj: JsonObject) -> Map<String, Value> {
    obj.into_iter().map(|(k, v)| (k, Value::from(v))).collect()
}
