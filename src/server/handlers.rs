//! Request handlers for the aggregation server
//!
//! `RequestDispatcher` serves exactly one request per connection: it reads the
//! request under a timeout, routes it, runs store work on the blocking pool
//! and writes a single response.

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::time;
use tracing::{debug, info, warn};

use crate::clock::LamportClock;
use crate::codec::{self, JsonObject, JsonValue};
use crate::protocol::{read_request, Request, Response, Route, StatusCode};
use crate::store::RecordStore;
use crate::types::{AggregationError, AggregationResult, Record};

/// Default bound on receiving a full request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Routes requests to the store and keeps the server clock in step
#[derive(Clone)]
pub struct RequestDispatcher {
    clock: Arc<LamportClock>,
    store: Arc<RecordStore>,
    request_timeout: Duration,
}

impl RequestDispatcher {
    pub fn new(clock: Arc<LamportClock>, store: Arc<RecordStore>) -> Self {
        Self {
            clock,
            store,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    pub fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    pub fn clock(&self) -> &Arc<LamportClock> {
        &self.clock
    }

    pub fn store(&self) -> &Arc<RecordStore> {
        &self.store
    }

    /// Serve one request on `stream`
    ///
    /// Client errors are answered with a status response and return `Ok`.
    /// A timeout or I/O failure returns the error and nothing is written.
    pub async fn serve<S>(&self, stream: S) -> AggregationResult<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        let (read_half, mut write_half) = tokio::io::split(stream);
        let mut reader = BufReader::new(read_half);

        let request = match time::timeout(self.request_timeout, read_request(&mut reader)).await {
            Ok(result) => result,
            Err(_) => return Err(AggregationError::Timeout(self.request_timeout)),
        };

        let outcome = match request {
            Ok(Some(request)) => self.dispatch(request).await,
            Ok(None) => {
                debug!("connection closed before a request was sent");
                return Ok(());
            }
            Err(e) => Err(e),
        };

        let response = match outcome {
            Ok(response) => response,
            Err(err) => match Response::for_error(&err) {
                Some(response) => {
                    debug!(error = %err, status = response.status.code(), "rejected request");
                    response
                }
                None => return Err(err),
            },
        };

        response.write_to(&mut write_half).await?;
        write_half.shutdown().await?;
        Ok(())
    }

    /// Route a parsed request to its handler
    pub async fn dispatch(&self, request: Request) -> AggregationResult<Response> {
        match request.route {
            Route::PutWeather => self.handle_put(request.body).await,
            Route::GetWeather { station_id } => self.handle_get(station_id).await,
            Route::Unsupported => Err(AggregationError::Protocol(format!(
                "unsupported request {} {}",
                request.method, request.target
            ))),
        }
    }

    async fn handle_put(&self, body: Option<String>) -> AggregationResult<Response> {
        let Some(body) = body else {
            return Ok(Response::empty(StatusCode::NoContent));
        };

        // Parse, clock merge and durable write all run on the blocking pool
        let clock = Arc::clone(&self.clock);
        let store = Arc::clone(&self.store);
        let (station_id, received, clock, is_new) =
            tokio::task::spawn_blocking(move || -> AggregationResult<_> {
                let record = Record::parse(&body)?;
                let station_id = record.require_id()?.to_string();

                let received = record.lamport_clock();
                clock.update(received);
                let clock = clock.tick();

                let is_new = store.put(record)?;
                Ok((station_id, received, clock, is_new))
            })
            .await
            .map_err(|e| AggregationError::Io(std::io::Error::other(e)))??;

        let status = if is_new {
            StatusCode::Created
        } else {
            StatusCode::Ok
        };
        info!(station_id = %station_id, received, clock, status = status.code(), "accepted update");

        Ok(Response::text(status, status.reason()))
    }

    async fn handle_get(&self, station_id: Option<String>) -> AggregationResult<Response> {
        let clock = self.clock.tick();

        let store = Arc::clone(&self.store);
        let body = match station_id {
            Some(id) => {
                let (id, record) = tokio::task::spawn_blocking(move || {
                    let record = store.get(&id);
                    (id, record)
                })
                .await
                .map_err(|e| AggregationError::Io(std::io::Error::other(e)))?;

                let record = record.ok_or_else(|| AggregationError::NotFound(id.clone()))?;
                debug!(station_id = %id, clock, "served single station");

                let mut body = JsonObject::new();
                body.insert(id, JsonValue::from(record));
                body
            }
            None => {
                let snapshot = tokio::task::spawn_blocking(move || store.get_all())
                    .await
                    .map_err(|e| AggregationError::Io(std::io::Error::other(e)))?;
                debug!(stations = snapshot.len(), clock, "served full snapshot");

                snapshot
                    .into_iter()
                    .map(|(id, record)| (id, JsonValue::from(record)))
                    .collect()
            }
        };

        Ok(Response::json(StatusCode::Ok, codec::object_to_string(&body)))
    }
}

/// Log a connection that ended with an error
pub(crate) fn log_connection_error(peer: &str, err: &AggregationError) {
    match err {
        AggregationError::Timeout(_) => warn!(peer, error = %err, "dropped slow connection"),
        _ => warn!(peer, error = %err, "connection closed with error"),
    }
}
