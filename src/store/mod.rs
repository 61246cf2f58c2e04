//! Record Store - Core data engine
//!
//! A concurrently-accessed map of station id to weather record. Every
//! mutation rewrites the durable table atomically, and a background sweep
//! evicts records that have not been written for longer than the TTL.
//!
//! # Concurrency
//!
//! All table access goes through one reader/writer lock: reads proceed in
//! parallel, writes (put, eviction, clear) are exclusive. Persistence happens
//! while the write guard is held, so the durable file only ever has one
//! writer.

mod config;
mod persist;
mod sweeper;

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use tracing::{debug, error, info, warn};

use crate::types::{AggregationResult, Record};
use crate::utils::atomic::{atomic_write, remove_stale_temp};

pub use config::{EvictionPolicy, StoreConfig};

/// A record plus the monotonic time it was last written
#[derive(Debug, Clone)]
struct StoredRecord {
    record: Record,
    last_write: Instant,
}

type Table = BTreeMap<String, StoredRecord>;

/// Thread-safe weather record store with durable persistence
pub struct RecordStore {
    config: StoreConfig,
    table: RwLock<Table>,
}

impl RecordStore {
    /// Open the store backed by `config.data_file`
    ///
    /// Existing entries are loaded and treated as freshly written. If the file
    /// does not exist, an empty table is persisted immediately so the file
    /// always exists after construction.
    pub fn open(config: StoreConfig) -> AggregationResult<Self> {
        let path = config.data_file().to_path_buf();

        if remove_stale_temp(&path)? {
            warn!(path = %path.display(), "removed temp file left by an interrupted write");
        }

        match persist::load_table(&path)? {
            Some(records) => {
                let now = Instant::now();
                let table: Table = records
                    .into_iter()
                    .map(|(id, record)| (id, StoredRecord { record, last_write: now }))
                    .collect();
                info!(path = %path.display(), records = table.len(), "loaded record store");
                Ok(Self {
                    config,
                    table: RwLock::new(table),
                })
            }
            None => {
                let store = Self {
                    config,
                    table: RwLock::new(Table::new()),
                };
                store.flush()?;
                info!(path = %path.display(), "created empty record store");
                Ok(store)
            }
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    /// Insert or replace a record, returning `true` for a first-time insert
    ///
    /// The record replaces any previous one wholesale; fields are not merged.
    pub fn put(&self, record: Record) -> AggregationResult<bool> {
        let id = record.require_id()?.to_string();

        let mut table = self.table.write();
        let entry = StoredRecord {
            record,
            last_write: Instant::now(),
        };
        let is_new = table.insert(id.clone(), entry).is_none();
        self.persist_logged(&table);

        debug!(station_id = %id, is_new, "stored record");
        Ok(is_new)
    }

    /// Look up a single record
    pub fn get(&self, id: &str) -> Option<Record> {
        self.table.read().get(id).map(|entry| entry.record.clone())
    }

    /// Point-in-time copy of the whole table, ordered by id
    pub fn get_all(&self) -> BTreeMap<String, Record> {
        self.table
            .read()
            .iter()
            .map(|(id, entry)| (id.clone(), entry.record.clone()))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.table.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.read().is_empty()
    }

    /// Remove every record last written more than `ttl` ago
    ///
    /// Returns the number of evicted records. The table is persisted only when
    /// something was removed.
    pub fn evict_stale(&self, ttl: Duration) -> usize {
        let mut table = self.table.write();
        let now = Instant::now();
        let before = table.len();

        table.retain(|id, entry| {
            let stale = now.saturating_duration_since(entry.last_write) > ttl;
            if stale {
                info!(station_id = %id, "evicted stale record");
            }
            !stale
        });

        let evicted = before - table.len();
        if evicted > 0 {
            self.persist_logged(&table);
        }
        evicted
    }

    /// Remove all records (tests and maintenance)
    pub fn clear(&self) {
        let mut table = self.table.write();
        table.clear();
        self.persist_logged(&table);
    }

    /// Persist the current table, reporting failure to the caller
    pub fn flush(&self) -> AggregationResult<()> {
        // Write guard keeps this the only file writer
        let table = self.table.write();
        self.persist(&table)
    }

    fn persist(&self, table: &Table) -> AggregationResult<()> {
        let content = persist::encode_table(table.iter().map(|(id, entry)| (id, &entry.record)));
        atomic_write(self.config.data_file(), &content)?;
        Ok(())
    }

    /// Persistence failures leave the in-memory table authoritative
    fn persist_logged(&self, table: &Table) {
        if let Err(e) = self.persist(table) {
            error!(
                path = %self.config.data_file().display(),
                error = %e,
                "failed to persist record store"
            );
        }
    }

    #[cfg(test)]
    pub(crate) fn backdate(&self, id: &str, age: Duration) {
        if let Some(entry) = self.table.write().get_mut(id) {
            entry.last_write = Instant::now()
                .checked_sub(age)
                .unwrap_or(entry.last_write);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AggregationError;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    fn create_test_store() -> (RecordStore, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("data").join("weather_data.json"));
        let store = RecordStore::open(config).unwrap();
        (store, temp_dir)
    }

    fn record(value: serde_json::Value) -> Record {
        Record::try_from(value).unwrap()
    }

    #[test]
    fn test_open_creates_file() {
        let (store, _temp_dir) = create_test_store();
        let content = fs::read_to_string(store.config().data_file()).unwrap();
        assert_eq!(content, "{}");
        assert!(store.is_empty());
    }

    #[test]
    fn test_put_new_then_replace() {
        let (store, _temp_dir) = create_test_store();

        assert!(store.put(record(json!({"id": "s1", "temp": 20.0, "wind": "N"}))).unwrap());
        assert!(!store.put(record(json!({"id": "s1", "temp": 21.0}))).unwrap());

        let stored = store.get("s1").unwrap();
        assert_eq!(stored.get("temp").and_then(|v| v.as_f64()), Some(21.0));
        // Whole-record replacement, no merge
        assert!(stored.get("wind").is_none());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_put_without_id_fails() {
        let (store, _temp_dir) = create_test_store();

        let err = store.put(record(json!({"temp": 1.0}))).unwrap_err();
        assert!(matches!(err, AggregationError::Validation(_)));

        let err = store.put(record(json!({"id": 12}))).unwrap_err();
        assert!(matches!(err, AggregationError::Validation(_)));

        assert!(store.is_empty());
    }

    #[test]
    fn test_put_persists_table() {
        let (store, _temp_dir) = create_test_store();
        store.put(record(json!({"id": "s1", "temp": 20.0}))).unwrap();

        let content = fs::read_to_string(store.config().data_file()).unwrap();
        assert_eq!(content, r#"{"s1":{"id":"s1","temp":20.0}}"#);
    }

    #[test]
    fn test_get_all_is_a_snapshot() {
        let (store, _temp_dir) = create_test_store();
        store.put(record(json!({"id": "a"}))).unwrap();

        let snapshot = store.get_all();
        store.put(record(json!({"id": "b"}))).unwrap();
        store.put(record(json!({"id": "a", "changed": true}))).unwrap();

        assert_eq!(snapshot.len(), 1);
        assert!(snapshot["a"].get("changed").is_none());
        assert_eq!(store.get_all().len(), 2);
    }

    #[test]
    fn test_get_unknown() {
        let (store, _temp_dir) = create_test_store();
        assert!(store.get("nope").is_none());
    }

    #[test]
    fn test_evict_stale() {
        let (store, _temp_dir) = create_test_store();
        store.put(record(json!({"id": "old"}))).unwrap();
        store.put(record(json!({"id": "fresh"}))).unwrap();
        store.backdate("old", Duration::from_secs(31));

        let evicted = store.evict_stale(Duration::from_secs(30));

        assert_eq!(evicted, 1);
        let all = store.get_all();
        assert!(!all.contains_key("old"));
        assert!(all.contains_key("fresh"));

        let content = fs::read_to_string(store.config().data_file()).unwrap();
        assert_eq!(content, r#"{"fresh":{"id":"fresh"}}"#);
    }

    #[test]
    fn test_put_refreshes_last_write() {
        let (store, _temp_dir) = create_test_store();
        store.put(record(json!({"id": "s1"}))).unwrap();
        store.backdate("s1", Duration::from_secs(60));
        store.put(record(json!({"id": "s1", "temp": 2.0}))).unwrap();

        assert_eq!(store.evict_stale(Duration::from_secs(30)), 0);
        assert!(store.get("s1").is_some());
    }

    #[test]
    fn test_clear() {
        let (store, _temp_dir) = create_test_store();
        store.put(record(json!({"id": "a"}))).unwrap();
        store.put(record(json!({"id": "b"}))).unwrap();

        store.clear();

        assert!(store.is_empty());
        let content = fs::read_to_string(store.config().data_file()).unwrap();
        assert_eq!(content, "{}");
    }

    #[test]
    fn test_reopen_restores_records_as_fresh() {
        let temp_dir = TempDir::new().unwrap();
        let config = StoreConfig::new(temp_dir.path().join("weather_data.json"));

        {
            let store = RecordStore::open(config.clone()).unwrap();
            store.put(record(json!({"id": "s1", "temp": 20.0, "rel_hum": 60}))).unwrap();
        }

        let reopened = RecordStore::open(config).unwrap();
        let restored = reopened.get("s1").unwrap();
        assert_eq!(restored.to_json(), r#"{"id":"s1","temp":20.0,"rel_hum":60}"#);
        // Fresh as of restart
        assert_eq!(reopened.evict_stale(Duration::from_secs(30)), 0);
    }

    #[test]
    fn test_open_with_corrupt_file_starts_empty() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weather_data.json");
        fs::write(&path, "{not json").unwrap();

        let store = RecordStore::open(StoreConfig::new(&path)).unwrap();
        assert!(store.is_empty());

        store.put(record(json!({"id": "s1"}))).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), r#"{"s1":{"id":"s1"}}"#);
    }

    #[test]
    fn test_open_removes_stale_temp_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("weather_data.json");
        let temp_path = crate::utils::atomic::temp_path_for(&path);
        fs::write(&temp_path, "{\"half").unwrap();

        let _store = RecordStore::open(StoreConfig::new(&path)).unwrap();
        assert!(!temp_path.exists());
    }

    #[test]
    fn test_persist_failure_keeps_memory_authoritative() {
        let temp_dir = TempDir::new().unwrap();
        let data_dir = temp_dir.path().join("data");
        let store = RecordStore::open(StoreConfig::new(data_dir.join("weather_data.json"))).unwrap();

        // Replace the data directory with a plain file so writes fail
        fs::remove_dir_all(&data_dir).unwrap();
        fs::write(&data_dir, "blocker").unwrap();

        assert!(store.put(record(json!({"id": "s1"}))).unwrap());
        assert!(store.get("s1").is_some());
        assert!(store.flush().is_err());
    }
}
