//! Producer and consumer side of the wire protocol
//!
//! `AggregationClient` keeps its own Lamport clock: every request is a local
//! event, and PUTs carry the clock value in the record's `lamportClock` field.

mod source;

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time;
use tracing::debug;

use crate::clock::LamportClock;
use crate::codec::{self, JsonValue};
use crate::protocol::{self, StatusCode, STATION_ID_PARAM, WEATHER_PATH};
use crate::types::{AggregationError, AggregationResult, Record};

pub use source::{load_station_file, parse_station_file};

/// Default bound on a whole client exchange
pub const DEFAULT_CLIENT_TIMEOUT: Duration = Duration::from_secs(10);

/// A response as seen by the client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientResponse {
    pub status: u16,
    pub reason: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl ClientResponse {
    /// The status as a known code, if it is one the server emits
    pub fn status_code(&self) -> Option<StatusCode> {
        StatusCode::from_code(self.status)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        protocol::find_header(&self.headers, name)
    }

    /// Parse the body as JSON
    pub fn json(&self) -> AggregationResult<JsonValue> {
        Ok(codec::parse(&self.body)?)
    }
}

/// Client for one aggregation server
#[derive(Debug)]
pub struct AggregationClient {
    addr: String,
    clock: LamportClock,
    timeout: Duration,
}

impl AggregationClient {
    /// `addr` is `host:port`; an `http://` prefix and trailing `/` are accepted
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: normalize_addr(&addr.into()),
            clock: LamportClock::new(),
            timeout: DEFAULT_CLIENT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn clock(&self) -> &LamportClock {
        &self.clock
    }

    /// Stamp the record with the next clock value and upload it
    pub async fn put_record(&self, mut record: Record) -> AggregationResult<ClientResponse> {
        record.require_id()?;
        let clock = self.clock.tick();
        record.set_lamport_clock(clock);
        debug!(station_id = record.id().unwrap_or_default(), clock, "uploading record");
        self.put_body(&record.to_json()).await
    }

    /// Upload a body verbatim, without touching the clock
    pub async fn put_body(&self, body: &str) -> AggregationResult<ClientResponse> {
        let request = format!(
            "PUT {} HTTP/1.1\r\nHost: {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            WEATHER_PATH,
            self.addr,
            body.len(),
            body
        );
        self.exchange(request.as_bytes()).await
    }

    /// Fetch every station, or just one
    pub async fn get(&self, station_id: Option<&str>) -> AggregationResult<ClientResponse> {
        let clock = self.clock.tick();
        let target = match station_id {
            Some(id) => format!("{}?{}={}", WEATHER_PATH, STATION_ID_PARAM, urlencoding::encode(id)),
            None => WEATHER_PATH.to_string(),
        };
        debug!(target = %target, clock, "fetching weather");

        let request = format!(
            "GET {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n\r\n",
            target, self.addr
        );
        self.exchange(request.as_bytes()).await
    }

    async fn exchange(&self, request: &[u8]) -> AggregationResult<ClientResponse> {
        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            stream.write_all(request).await?;
            stream.flush().await?;
            read_response(&mut BufReader::new(stream)).await
        };

        time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| AggregationError::Timeout(self.timeout))?
    }
}

/// Read one response; without `Content-Length` the body runs to EOF
pub async fn read_response<R>(reader: &mut R) -> AggregationResult<ClientResponse>
where
    R: tokio::io::AsyncBufRead + Unpin,
{
    let status_line = protocol::read_line(reader)
        .await?
        .ok_or_else(|| AggregationError::Protocol("connection closed before response".to_string()))?;

    let mut parts = status_line.splitn(3, ' ');
    let _version = parts.next();
    let status = parts
        .next()
        .and_then(|code| code.parse::<u16>().ok())
        .ok_or_else(|| AggregationError::Protocol(format!("malformed status line {:?}", status_line)))?;
    let reason = parts.next().unwrap_or_default().to_string();

    let headers = protocol::read_headers(reader).await?;
    let body = if protocol::find_header(&headers, "Content-Length").is_some() {
        let len = protocol::content_length(&headers)?;
        protocol::read_body(reader, len).await?
    } else {
        let mut buf = Vec::new();
        reader.read_to_end(&mut buf).await?;
        String::from_utf8(buf)
            .map_err(|_| AggregationError::Protocol("body is not valid UTF-8".to_string()))?
    };

    Ok(ClientResponse {
        status,
        reason,
        headers,
        body,
    })
}

fn normalize_addr(addr: &str) -> String {
    let addr = addr.trim();
    let addr = addr.strip_prefix("http://").unwrap_or(addr);
    addr.trim_end_matches('/').to_string()
}
