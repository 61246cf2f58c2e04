//! Station feed files: one `key:value` pair per line

use std::fs;
use std::path::Path;

use tracing::warn;

use crate::codec::JsonValue;
use crate::types::{AggregationResult, Record};

const FLOAT_KEYS: &[&str] = &[
    "lat",
    "lon",
    "air_temp",
    "apparent_t",
    "dewpt",
    "press",
    "wind_spd_kmh",
    "wind_spd_kt",
    "temp",
];

const INTEGER_KEYS: &[&str] = &["rel_hum"];

/// Parse a station feed into a record
///
/// Blank lines and `#` comments are skipped, a trailing comma is dropped, and
/// surrounding quotes are stripped from keys and values. Known numeric keys
/// are coerced; a value that fails coercion is kept as a string. Later
/// duplicates of a key replace earlier ones.
pub fn parse_station_file(content: &str) -> Record {
    let mut record = Record::default();

    for (index, raw) in content.lines().enumerate() {
        let line_number = index + 1;
        let mut line = raw.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some(stripped) = line.strip_suffix(',') {
            line = stripped.trim_end();
        }

        let Some((key, value)) = line.split_once(':') else {
            warn!(line = line_number, content = line, "skipping malformed station line");
            continue;
        };
        let key = strip_quotes(key.trim());
        let value = strip_quotes(value.trim());

        record.insert(key, coerce(key, value, line_number));
    }

    record
}

/// Read and parse a station feed from disk
pub fn load_station_file<P: AsRef<Path>>(path: P) -> AggregationResult<Record> {
    let content = fs::read_to_string(path)?;
    Ok(parse_station_file(&content))
}

fn coerce(key: &str, value: &str, line_number: usize) -> JsonValue {
    let coerced = if FLOAT_KEYS.contains(&key) {
        value.parse::<f64>().ok().filter(|f| f.is_finite()).map(JsonValue::Float)
    } else if INTEGER_KEYS.contains(&key) {
        value.parse::<i64>().ok().map(JsonValue::Integer)
    } else {
        return JsonValue::from(value);
    };

    coerced.unwrap_or_else(|| {
        warn!(line = line_number, key, value, "keeping non-numeric value as text");
        JsonValue::from(value)
    })
}

fn strip_quotes(s: &str) -> &str {
    for quote in ['"', '\''] {
        if s.len() >= 2 && s.starts_with(quote) && s.ends_with(quote) {
            return s[1..s.len() - 1].trim();
        }
    }
    s
}
