//! Weather Aggregation Server
//!
//! Collects weather observations pushed by producer stations over a minimal
//! HTTP-like protocol and serves the latest record per station to consumers.
//!
//! # Features
//!
//! - **Lamport Ordering**: A process-wide logical clock merged from every update
//! - **Durable**: Atomic write-then-rename persistence after each mutation
//! - **TTL Eviction**: Stations silent for longer than the TTL are dropped
//! - **Concurrent**: One tokio task per connection over a shared store
//! - **Self-contained JSON**: Hand-written tokenizer, parser and writer
//!
//! # Modules
//!
//! - `clock`: Lamport logical clock
//! - `codec`: JSON value tree, parser and writer
//! - `types`: Weather records and the error taxonomy
//! - `store`: Record store, persistence and eviction sweeper
//! - `protocol`: Wire request parsing and response writing
//! - `server`: Accept loop, request dispatcher, graceful shutdown
//! - `client`: Producer/consumer client and station feed parsing
//! - `config`: Command-line and environment configuration
//! - `utils`: Atomic file writes, logging setup
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use weather_aggregation::{AggregationServer, LamportClock, RecordStore, ServerConfig, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let store = Arc::new(RecordStore::open(StoreConfig::default())?);
//!     let clock = Arc::new(LamportClock::new());
//!     let server = AggregationServer::bind(ServerConfig::default(), store, clock).await?;
//!     server.run_until(async {
//!         let _ = tokio::signal::ctrl_c().await;
//!     }).await;
//!     Ok(())
//! }
//! ```

pub mod client;
pub mod clock;
pub mod codec;
pub mod config;
pub mod protocol;
pub mod server;
pub mod store;
pub mod types;
pub mod utils;

// Re-export commonly used items at crate root
pub use client::{AggregationClient, ClientResponse};
pub use clock::LamportClock;
pub use codec::{FormatError, JsonObject, JsonValue};
pub use protocol::StatusCode;
pub use server::{AggregationServer, RequestDispatcher, ServerConfig};
pub use store::{EvictionPolicy, RecordStore, StoreConfig};
pub use types::{AggregationError, AggregationResult, Record};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");
