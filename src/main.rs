//! Weather Aggregation Server - Binary Entry Point
//!
//! Usage: `aggregation-server [PORT]`. See `--help` for the remaining options.

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::watch;
use tracing::{info, warn};

use weather_aggregation::config::Cli;
use weather_aggregation::utils::init_logging;
use weather_aggregation::{AggregationServer, LamportClock, RecordStore, NAME, VERSION};

#[tokio::main]
async fn main() -> Result<()> {
    init_logging();

    let cli = Cli::parse();
    let (store_config, server_config) = cli.into_configs();

    let data_file = store_config.data_file().display().to_string();
    let store = Arc::new(
        RecordStore::open(store_config)
            .with_context(|| format!("failed to open record store at {}", data_file))?,
    );
    let clock = Arc::new(LamportClock::new());

    let server = AggregationServer::bind(server_config.clone(), store, clock)
        .await
        .with_context(|| format!("failed to bind {}", server_config.addr))?;
    info!(
        name = NAME,
        version = VERSION,
        addr = %server.local_addr()?,
        data_file = %data_file,
        "aggregation server listening"
    );

    let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
    ctrlc::set_handler(move || {
        if shutdown_tx.send(true).is_err() {
            warn!("shutdown requested after server exit");
        }
    })
    .context("failed to install signal handler")?;

    server
        .run_until(async move {
            let _ = shutdown_rx.wait_for(|requested| *requested).await;
        })
        .await;

    info!("aggregation server stopped");
    Ok(())
}
