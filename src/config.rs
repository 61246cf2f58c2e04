//! Command-line and environment configuration for the server binary

use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

use crate::server::{ServerConfig, DEFAULT_PORT};
use crate::store::{EvictionPolicy, StoreConfig};

#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Port to listen on.
    #[arg(env = "WEATHER_PORT", default_value_t = DEFAULT_PORT)]
    pub port: u16,

    /// Interface to bind.
    #[arg(long, env = "WEATHER_HOST", default_value = "0.0.0.0")]
    pub host: IpAddr,

    /// Durable table location.
    #[arg(long, env = "WEATHER_DATA_FILE", default_value = "data/weather_data.json")]
    pub data_file: PathBuf,

    /// Seconds without an update before a station is evicted.
    #[arg(long, env = "WEATHER_TTL_SECS", default_value_t = 30)]
    pub ttl_secs: u64,

    /// Seconds between eviction sweeps. Defaults to a third of the TTL.
    #[arg(long, env = "WEATHER_SWEEP_SECS")]
    pub sweep_secs: Option<u64>,

    /// Seconds a client has to send a complete request.
    #[arg(long, env = "WEATHER_REQUEST_TIMEOUT", default_value_t = 30)]
    pub request_timeout_secs: u64,

    /// Seconds in-flight requests get to finish on shutdown.
    #[arg(long, env = "WEATHER_SHUTDOWN_GRACE", default_value_t = 5)]
    pub shutdown_grace_secs: u64,
}

impl Cli {
    pub fn eviction_policy(&self) -> EvictionPolicy {
        let policy = EvictionPolicy::from_ttl(Duration::from_secs(self.ttl_secs));
        match self.sweep_secs {
            Some(secs) => policy.with_sweep_interval(Duration::from_secs(secs)),
            None => policy,
        }
    }

    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.data_file).with_eviction(self.eviction_policy())
    }

    pub fn server_config(&self) -> ServerConfig {
        ServerConfig::new(SocketAddr::new(self.host, self.port))
            .with_request_timeout(Duration::from_secs(self.request_timeout_secs))
            .with_shutdown_grace(Duration::from_secs(self.shutdown_grace_secs))
    }

    pub fn into_configs(self) -> (StoreConfig, ServerConfig) {
        (self.store_config(), self.server_config())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["aggregation-server"]).unwrap();
        let (store, server) = cli.into_configs();

        assert_eq!(store.data_file(), Path::new("data/weather_data.json"));
        assert_eq!(store.eviction.ttl, Duration::from_secs(30));
        assert_eq!(store.eviction.sweep_interval, Duration::from_secs(10));
        assert_eq!(server.addr.port(), 4567);
        assert_eq!(server.request_timeout, Duration::from_secs(30));
        assert_eq!(server.shutdown_grace, Duration::from_secs(5));
    }

    #[test]
    fn test_explicit_arguments() {
        let cli = Cli::try_parse_from([
            "aggregation-server",
            "8080",
            "--host",
            "127.0.0.1",
            "--data-file",
            "/tmp/w.json",
            "--ttl-secs",
            "60",
            "--sweep-secs",
            "5",
        ])
        .unwrap();
        let (store, server) = cli.into_configs();

        assert_eq!(server.addr, "127.0.0.1:8080".parse::<SocketAddr>().unwrap());
        assert_eq!(store.data_file(), Path::new("/tmp/w.json"));
        assert_eq!(store.eviction.ttl, Duration::from_secs(60));
        assert_eq!(store.eviction.sweep_interval, Duration::from_secs(5));
    }

    #[test]
    fn test_sweep_follows_ttl() {
        let cli = Cli::try_parse_from(["aggregation-server", "--ttl-secs", "90"]).unwrap();
        assert_eq!(cli.eviction_policy().sweep_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_rejects_invalid_port() {
        assert!(Cli::try_parse_from(["aggregation-server", "not-a-port"]).is_err());
    }
}
