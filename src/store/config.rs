use std::path::{Path, PathBuf};
use std::time::Duration;

/// When and how aggressively stale records are swept
///
/// The sweep period is a third of the TTL by default, so a record is always
/// caught within three sweeps of going stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// How often the sweeper runs
    pub sweep_interval: Duration,
    /// Records unwritten for longer than this are evicted
    pub ttl: Duration,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(10),
            ttl: Duration::from_secs(30),
        }
    }
}

impl EvictionPolicy {
    /// Derive the sweep period from the TTL, keeping the 1:3 ratio
    pub fn from_ttl(ttl: Duration) -> Self {
        Self {
            sweep_interval: (ttl / 3).max(Duration::from_millis(1)),
            ttl,
        }
    }

    pub fn with_sweep_interval(mut self, sweep_interval: Duration) -> Self {
        self.sweep_interval = sweep_interval.max(Duration::from_millis(1));
        self
    }
}

/// Configuration for the RecordStore
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the durable table
    pub data_file: PathBuf,
    pub eviction: EvictionPolicy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from("data/weather_data.json"),
            eviction: EvictionPolicy::default(),
        }
    }
}

impl StoreConfig {
    /// Create config with a custom data file
    pub fn new<P: AsRef<Path>>(data_file: P) -> Self {
        Self {
            data_file: data_file.as_ref().to_path_buf(),
            ..Default::default()
        }
    }

    pub fn with_eviction(mut self, eviction: EvictionPolicy) -> Self {
        self.eviction = eviction;
        self
    }

    pub fn data_file(&self) -> &Path {
        &self.data_file
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_policy_ratio() {
        let policy = EvictionPolicy::default();
        assert_eq!(policy.ttl, policy.sweep_interval * 3);
    }

    #[test]
    fn test_from_ttl() {
        let policy = EvictionPolicy::from_ttl(Duration::from_secs(90));
        assert_eq!(policy.sweep_interval, Duration::from_secs(30));

        // Never a zero period
        let tiny = EvictionPolicy::from_ttl(Duration::ZERO);
        assert!(tiny.sweep_interval > Duration::ZERO);
    }

    #[test]
    fn test_store_config_defaults() {
        let config = StoreConfig::new("/tmp/x.json");
        assert_eq!(config.data_file(), Path::new("/tmp/x.json"));
        assert_eq!(config.eviction, EvictionPolicy::default());
    }
}
