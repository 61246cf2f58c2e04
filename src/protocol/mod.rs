//! Wire protocol for the aggregation server
//!
//! A minimal HTTP/1.1-shaped exchange: one request line, header lines, a blank
//! line and an optional `Content-Length`-framed body. One request is served per
//! connection.

mod request;
mod response;

pub use request::{read_request, Request, Route, STATION_ID_PARAM, WEATHER_PATH};
pub use response::{Response, StatusCode};

pub(crate) use request::{content_length, find_header, read_body, read_headers, read_line};
