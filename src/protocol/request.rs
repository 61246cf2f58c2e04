//! Request parsing for the line-delimited wire protocol

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::types::{AggregationError, AggregationResult};

/// The only resource the server exposes
pub const WEATHER_PATH: &str = "/weather.json";

/// Query parameter selecting a single station on GET
pub const STATION_ID_PARAM: &str = "station_id";

const MAX_LINE_BYTES: u64 = 8 * 1024;
const MAX_HEADER_LINES: usize = 100;
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// What a request asks the server to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    PutWeather,
    GetWeather { station_id: Option<String> },
    Unsupported,
}

impl Route {
    /// Resolve a method and request target. The path is matched without its
    /// query string, ignoring ASCII case.
    pub fn resolve(method: &str, target: &str) -> AggregationResult<Self> {
        let (path, query) = match target.split_once('?') {
            Some((path, query)) => (path, Some(query)),
            None => (target, None),
        };

        if !path.eq_ignore_ascii_case(WEATHER_PATH) {
            return Ok(Route::Unsupported);
        }

        if method.eq_ignore_ascii_case("PUT") {
            Ok(Route::PutWeather)
        } else if method.eq_ignore_ascii_case("GET") {
            let station_id = match query {
                Some(query) => query_param(query, STATION_ID_PARAM)?,
                None => None,
            };
            Ok(Route::GetWeather { station_id })
        } else {
            Ok(Route::Unsupported)
        }
    }
}

/// A parsed request. `body` is only read for PUTs with a non-zero length.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: String,
    pub target: String,
    pub version: String,
    pub headers: Vec<(String, String)>,
    pub content_length: usize,
    pub route: Route,
    pub body: Option<String>,
}

impl Request {
    /// Case-insensitive header lookup; the last occurrence wins
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .rev()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Read one request from the stream
///
/// Returns `Ok(None)` when the peer closes the connection before sending a
/// request line.
pub async fn read_request<R>(reader: &mut R) -> AggregationResult<Option<Request>>
where
    R: AsyncBufRead + Unpin,
{
    let Some(line) = read_line(reader).await? else {
        return Ok(None);
    };

    let parts: Vec<&str> = line.split_whitespace().collect();
    if parts.len() < 3 {
        return Err(AggregationError::Protocol(format!(
            "malformed request line {:?}",
            line
        )));
    }
    let method = parts[0].to_string();
    let target = parts[1].to_string();
    let version = parts[2].to_string();

    let headers = read_headers(reader).await?;
    let content_length = content_length(&headers)?;
    let route = Route::resolve(&method, &target)?;

    let body = if route == Route::PutWeather && content_length > 0 {
        if content_length > MAX_BODY_BYTES {
            return Err(AggregationError::Protocol(format!(
                "body of {} bytes exceeds the {} byte limit",
                content_length, MAX_BODY_BYTES
            )));
        }
        Some(read_body(reader, content_length).await?)
    } else {
        None
    };

    Ok(Some(Request {
        method,
        target,
        version,
        headers,
        content_length,
        route,
        body,
    }))
}

/// Read a `\r\n`- or `\n`-terminated line without its terminator
pub(crate) async fn read_line<R>(reader: &mut R) -> AggregationResult<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    let n = (&mut *reader)
        .take(MAX_LINE_BYTES)
        .read_until(b'\n', &mut buf)
        .await?;
    if n == 0 {
        return Ok(None);
    }

    if buf.last() == Some(&b'\n') {
        buf.pop();
        if buf.last() == Some(&b'\r') {
            buf.pop();
        }
    } else if n as u64 == MAX_LINE_BYTES {
        return Err(AggregationError::Protocol("line too long".to_string()));
    }

    String::from_utf8(buf)
        .map(Some)
        .map_err(|_| AggregationError::Protocol("line is not valid UTF-8".to_string()))
}

/// Read header lines up to and including the blank separator line
pub(crate) async fn read_headers<R>(reader: &mut R) -> AggregationResult<Vec<(String, String)>>
where
    R: AsyncBufRead + Unpin,
{
    let mut headers = Vec::new();
    loop {
        let line = read_line(reader).await?.ok_or_else(|| {
            AggregationError::Protocol("connection closed before end of headers".to_string())
        })?;
        if line.is_empty() {
            return Ok(headers);
        }
        if headers.len() >= MAX_HEADER_LINES {
            return Err(AggregationError::Protocol("too many header lines".to_string()));
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.push((name.trim().to_string(), value.trim().to_string()));
        }
    }
}

/// `Content-Length` in bytes, defaulting to 0 when absent
pub(crate) fn content_length(headers: &[(String, String)]) -> AggregationResult<usize> {
    match find_header(headers, "Content-Length") {
        Some(value) => value.parse::<usize>().map_err(|_| {
            AggregationError::Protocol(format!("invalid Content-Length {:?}", value))
        }),
        None => Ok(0),
    }
}

/// Read exactly `len` bytes of UTF-8 body
pub(crate) async fn read_body<R>(reader: &mut R, len: usize) -> AggregationResult<String>
where
    R: AsyncBufRead + Unpin,
{
    let mut buf = Vec::new();
    (&mut *reader).take(len as u64).read_to_end(&mut buf).await?;
    if buf.len() < len {
        return Err(AggregationError::Protocol(format!(
            "incomplete body: expected {} bytes, received {}",
            len,
            buf.len()
        )));
    }
    String::from_utf8(buf)
        .map_err(|_| AggregationError::Protocol("body is not valid UTF-8".to_string()))
}

/// Form-decode a query parameter (`+` as space, then percent-decoding)
fn query_param(query: &str, name: &str) -> AggregationResult<Option<String>> {
    let Some(raw) = query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .filter(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .last()
    else {
        return Ok(None);
    };

    urlencoding::decode(&raw.replace('+', " "))
        .map(|decoded| Some(decoded.into_owned()))
        .map_err(|_| AggregationError::Protocol(format!("invalid percent-encoding in {}", name)))
}
