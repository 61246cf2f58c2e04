//! Durable table format: one JSON object mapping station id to record

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use tracing::warn;

use crate::codec::{self, JsonObject, JsonValue};
use crate::types::{AggregationResult, Record};

/// Load the durable table
///
/// Returns `Ok(None)` when the file does not exist. A file that fails to
/// parse is logged and treated as an empty table.
pub(super) fn load_table(path: &Path) -> AggregationResult<Option<BTreeMap<String, Record>>> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    let table = match codec::parse_object(&content) {
        Ok(table) => table,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "durable table is unreadable, starting empty");
            return Ok(Some(BTreeMap::new()));
        }
    };

    let mut records = BTreeMap::new();
    for (id, value) in table {
        match value {
            JsonValue::Object(fields) => {
                records.insert(id, Record::new(fields));
            }
            other => warn!(
                station_id = %id,
                kind = other.kind(),
                "skipping non-object entry in durable table"
            ),
        }
    }

    Ok(Some(records))
}

/// Encode entries as a single compact object, in iteration order
pub(super) fn encode_table<'a, I>(entries: I) -> String
where
    I: IntoIterator<Item = (&'a String, &'a Record)>,
{
    let table: JsonObject = entries
        .into_iter()
        .map(|(id, record)| (id.clone(), JsonValue::Object(record.fields().clone())))
        .collect();
    codec::object_to_string(&table)
}
