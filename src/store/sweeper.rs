//! Periodic eviction of stale records

use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error};

use super::{EvictionPolicy, RecordStore};

impl RecordStore {
    /// Spawn a background task that evicts stale records every
    /// `policy.sweep_interval`.
    ///
    /// The first sweep runs one interval after spawning. Sweeps take the same
    /// write lock as `put` and run on the blocking pool. Abort the returned
    /// handle to stop sweeping.
    pub fn spawn_sweeper(self: &Arc<Self>, policy: EvictionPolicy) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + policy.sweep_interval, policy.sweep_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let sweep_store = Arc::clone(&store);
                match tokio::task::spawn_blocking(move || sweep_store.evict_stale(policy.ttl)).await {
                    Ok(0) => {}
                    Ok(evicted) => debug!(evicted, "eviction sweep completed"),
                    Err(e) => error!(error = %e, "eviction sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use crate::types::Record;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_sweeper_evicts_stale_records() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            RecordStore::open(StoreConfig::new(temp_dir.path().join("weather_data.json"))).unwrap(),
        );
        store.put(Record::parse(r#"{"id":"old"}"#).unwrap()).unwrap();
        store.backdate("old", Duration::from_secs(60));
        store.put(Record::parse(r#"{"id":"fresh"}"#).unwrap()).unwrap();

        let policy = EvictionPolicy {
            sweep_interval: Duration::from_millis(20),
            ttl: Duration::from_secs(30),
        };
        let handle = store.spawn_sweeper(policy);

        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while store.get("old").is_some() && std::time::Instant::now() < deadline {
            time::sleep(Duration::from_millis(10)).await;
        }
        handle.abort();

        assert!(store.get("old").is_none());
        assert!(store.get("fresh").is_some());
    }

    #[tokio::test]
    async fn test_sweeper_stops_when_aborted() {
        let temp_dir = TempDir::new().unwrap();
        let store = Arc::new(
            RecordStore::open(StoreConfig::new(temp_dir.path().join("weather_data.json"))).unwrap(),
        );
        let handle = store.spawn_sweeper(EvictionPolicy::default());
        handle.abort();

        let result = handle.await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
