//! Compact serializer for the value tree

use std::fmt::Write;

use super::value::{JsonObject, JsonValue};

/// Serialize a value without inserted whitespace
pub fn to_string(value: &JsonValue) -> String {
    let mut out = String::new();
    write_value(&mut out, value);
    out
}

/// Serialize an object, keeping its member order
pub fn object_to_string(obj: &JsonObject) -> String {
    let mut out = String::new();
    write_object(&mut out, obj);
    out
}

fn write_value(out: &mut String, value: &JsonValue) {
    match value {
        JsonValue::Null => out.push_str("null"),
        JsonValue::Bool(b) => out.push_str(if *b { "true" } else { "false" }),
        JsonValue::Integer(n) => {
            let _ = write!(out, "{}", n);
        }
        JsonValue::Float(f) => write_float(out, *f),
        JsonValue::String(s) => write_string(out, s),
        JsonValue::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_value(out, item);
            }
            out.push(']');
        }
        JsonValue::Object(obj) => write_object(out, obj),
    }
}

fn write_object(out: &mut String, obj: &JsonObject) {
    out.push('{');
    for (i, (key, value)) in obj.iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        write_string(out, key);
        out.push(':');
        write_value(out, value);
    }
    out.push('}');
}

fn write_float(out: &mut String, f: f64) {
    if f.is_finite() {
        // Debug keeps a fraction or exponent ("20.0", "1e-7"), so the value
        // reads back as a float.
        let _ = write!(out, "{:?}", f);
    } else {
        out.push_str("null");
    }
}

fn write_string(out: &mut String, s: &str) {
    out.push('"');
    for ch in s.chars() {
        match ch {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            c if (c as u32) < 0x20 => {
                let _ = write!(out, "\\u{:04x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
