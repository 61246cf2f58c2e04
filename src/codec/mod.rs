//! JSON codec
//!
//! A hand-rolled tokenizer + recursive-descent parser and a compact
//! serializer. It is used both as the wire format for request/response bodies
//! and as the on-disk format of the record store.
//!
//! # Example
//!
//! ```
//! use weather_aggregation::codec;
//!
//! let value = codec::parse(r#"{"id":"IDS60901","air_temp":13.3}"#).unwrap();
//! assert_eq!(value.to_string(), r#"{"id":"IDS60901","air_temp":13.3}"#);
//! ```

mod error;
mod interop;
mod parser;
mod tokenizer;
mod value;
mod writer;

pub use error::FormatError;
pub use value::{JsonObject, JsonValue};
pub use writer::{object_to_string, to_string};

/// Parse a complete document
pub fn parse(src: &str) -> Result<JsonValue, FormatError> {
    parser::Parser::new(src).parse_document()
}

/// Parse a document whose top level must be an object
pub fn parse_object(src: &str) -> Result<JsonObject, FormatError> {
    match parse(src)? {
        JsonValue::Object(obj) => Ok(obj),
        other => Err(FormatError::new(
            0,
            format!("expected a top-level object, found {}", other.kind()),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn round_trip(value: &JsonValue) -> JsonValue {
        parse(&to_string(value)).unwrap()
    }

    #[test]
    fn test_round_trip_value_kinds() {
        let mut nested = JsonObject::new();
        nested.insert("quote", "he said \"hi\"");
        nested.insert("backslash", "C:\\data\\weather");
        nested.insert("control", "line1\nline2\ttab");

        let mut record = JsonObject::new();
        record.insert("id", "IDS60901");
        record.insert("lat", -34.9);
        record.insert("rel_hum", 60i64);
        record.insert("raining", false);
        record.insert("cloud", JsonValue::Null);
        record.insert("nested", nested);
        record.insert(
            "history",
            JsonValue::Array(vec![JsonValue::Float(1.5), JsonValue::Integer(-2), JsonValue::from("x")]),
        );

        let value = JsonValue::Object(record);
        assert_eq!(round_trip(&value), value);
    }

    #[test]
    fn test_round_trip_extreme_numbers() {
        for value in [
            JsonValue::Integer(i64::MIN),
            JsonValue::Integer(i64::MAX),
            JsonValue::Float(1e-7),
            JsonValue::Float(1.5e300),
            JsonValue::Float(-0.1),
            JsonValue::Float(100.0),
        ] {
            assert_eq!(round_trip(&value), value);
        }
    }

    #[test]
    fn test_parse_object_rejects_other_kinds() {
        assert!(parse_object("[1]").is_err());
        assert!(parse_object("\"id\"").is_err());
        assert_eq!(parse_object("{}").unwrap(), JsonObject::new());
    }

    #[test]
    fn test_whitespace_is_accepted_but_not_emitted() {
        let value = parse("{ \"id\" : \"s1\" ,\n \"temp\" : 20.0 }").unwrap();
        assert_eq!(value.to_string(), r#"{"id":"s1","temp":20.0}"#);
    }
}
