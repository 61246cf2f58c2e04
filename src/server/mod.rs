//! Aggregation server
//!
//! Accepts TCP connections and hands each one to a `RequestDispatcher` task.
//! The eviction sweeper runs alongside the accept loop for the lifetime of
//! the server. On shutdown the listener is closed first, in-flight requests
//! get a grace period, and the store is flushed once.

mod handlers;

use std::future::Future;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::select;
use tokio::task::JoinSet;
use tokio::time;
use tracing::{debug, error, info, warn};

use crate::clock::LamportClock;
use crate::store::RecordStore;

pub use handlers::{RequestDispatcher, DEFAULT_REQUEST_TIMEOUT};

/// Default listening port
pub const DEFAULT_PORT: u16 = 4567;

/// Default time in-flight connections get to finish after shutdown starts
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Network-facing server settings
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: SocketAddr,
    pub request_timeout: Duration,
    pub shutdown_grace: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], DEFAULT_PORT)),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl ServerConfig {
    pub fn new(addr: SocketAddr) -> Self {
        Self {
            addr,
            ..Default::default()
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn with_shutdown_grace(mut self, shutdown_grace: Duration) -> Self {
        self.shutdown_grace = shutdown_grace;
        self
    }
}

/// A bound aggregation server, ready to run
pub struct AggregationServer {
    listener: TcpListener,
    config: ServerConfig,
    dispatcher: Arc<RequestDispatcher>,
}

impl AggregationServer {
    /// Bind the listener. Use port 0 to let the OS pick one.
    pub async fn bind(
        config: ServerConfig,
        store: Arc<RecordStore>,
        clock: Arc<LamportClock>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(config.addr).await?;
        let dispatcher =
            RequestDispatcher::new(clock, store).with_request_timeout(config.request_timeout);
        Ok(Self {
            listener,
            config,
            dispatcher: Arc::new(dispatcher),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn clock(&self) -> &Arc<LamportClock> {
        self.dispatcher.clock()
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        self.dispatcher.store()
    }

    /// Serve connections until `shutdown` resolves
    ///
    /// Returns once every connection has finished or been aborted and the
    /// final flush has run. A failed flush is logged, not returned.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()> + Send,
    {
        let AggregationServer {
            listener,
            config,
            dispatcher,
        } = self;
        tokio::pin!(shutdown);

        let store = Arc::clone(dispatcher.store());
        let policy = store.config().eviction;
        let sweeper = store.spawn_sweeper(policy);
        info!(
            ttl_secs = policy.ttl.as_secs_f64(),
            sweep_secs = policy.sweep_interval.as_secs_f64(),
            "eviction sweeper started"
        );

        let mut connections = JoinSet::new();
        loop {
            select! {
                _ = &mut shutdown => break,
                accepted = listener.accept() => {
                    handle_accept_result(accepted, &dispatcher, &mut connections);
                }
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_join_result(joined);
                }
            }
        }

        info!(in_flight = connections.len(), "server shutting down");
        drop(listener);
        sweeper.abort();

        drain_connections(&mut connections, config.shutdown_grace).await;

        match tokio::task::spawn_blocking(move || store.flush()).await {
            Ok(Ok(())) => info!("record store flushed"),
            Ok(Err(e)) => error!(error = %e, "final flush failed"),
            Err(e) => error!(error = %e, "final flush task failed"),
        }
    }
}

fn handle_accept_result(
    result: io::Result<(TcpStream, SocketAddr)>,
    dispatcher: &Arc<RequestDispatcher>,
    connections: &mut JoinSet<()>,
) {
    match result {
        Ok((stream, peer)) => {
            debug!(peer = %peer, "accepted connection");
            let dispatcher = Arc::clone(dispatcher);
            connections.spawn(async move {
                if let Err(err) = dispatcher.serve(stream).await {
                    handlers::log_connection_error(&peer.to_string(), &err);
                }
            });
        }
        Err(err) => warn!(error = %err, "failed to accept connection"),
    }
}

fn log_join_result(result: Result<(), tokio::task::JoinError>) {
    if let Err(e) = result {
        if e.is_panic() {
            error!(error = %e, "connection task panicked");
        }
    }
}

/// Wait up to `grace` for in-flight connections, then abort the rest
async fn drain_connections(connections: &mut JoinSet<()>, grace: Duration) {
    let drained = time::timeout(grace, async {
        while let Some(joined) = connections.join_next().await {
            log_join_result(joined);
        }
    })
    .await;

    if drained.is_err() {
        warn!(
            remaining = connections.len(),
            grace_secs = grace.as_secs_f64(),
            "aborting connections still running after grace period"
        );
        connections.abort_all();
        while connections.join_next().await.is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::StoreConfig;
    use tempfile::TempDir;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    async fn start_server(
        temp_dir: &TempDir,
        config: ServerConfig,
    ) -> (SocketAddr, oneshot::Sender<()>, tokio::task::JoinHandle<()>) {
        let store = Arc::new(
            RecordStore::open(StoreConfig::new(temp_dir.path().join("weather_data.json")))
                .unwrap(),
        );
        let server = AggregationServer::bind(config, store, Arc::new(LamportClock::new()))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(server.run_until(async move {
            let _ = shutdown_rx.await;
        }));
        (addr, shutdown_tx, handle)
    }

    fn local_config() -> ServerConfig {
        ServerConfig::new(SocketAddr::from(([127, 0, 0, 1], 0)))
    }

    #[test]
    fn test_default_config() {
        let config = ServerConfig::default();
        assert_eq!(config.addr.port(), DEFAULT_PORT);
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.shutdown_grace, Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_serves_over_tcp() {
        let temp_dir = TempDir::new().unwrap();
        let (addr, shutdown_tx, handle) = start_server(&temp_dir, local_config()).await;

        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream
            .write_all(b"GET /weather.json HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .await
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).await.unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(response.ends_with("\r\n\r\n{}"));

        shutdown_tx.send(()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_shutdown_aborts_idle_connections_after_grace() {
        let temp_dir = TempDir::new().unwrap();
        let config = local_config().with_shutdown_grace(Duration::from_millis(100));
        let (addr, shutdown_tx, handle) = start_server(&temp_dir, config).await;

        // Connected but never sends a request
        let mut idle = TcpStream::connect(addr).await.unwrap();
        time::sleep(Duration::from_millis(50)).await;

        shutdown_tx.send(()).unwrap();
        time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();

        let mut buf = Vec::new();
        let read = idle.read_to_end(&mut buf).await;
        assert!(read.is_err() || buf.is_empty());
    }
}
