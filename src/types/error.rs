//! Error taxonomy shared across the aggregation core

use std::time::Duration;

use thiserror::Error;

use crate::codec::FormatError;
use crate::protocol::StatusCode;
use crate::utils::atomic::AtomicError;

/// Result type for aggregation operations
pub type AggregationResult<T> = Result<T, AggregationError>;

/// Errors raised by the store, the codec and the request dispatcher
#[derive(Debug, Error)]
pub enum AggregationError {
    /// Malformed request line, headers or body framing
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Record is missing a textual `id`
    #[error("validation error: {0}")]
    Validation(String),

    /// Unknown station on a filtered read
    #[error("station not found: {0}")]
    NotFound(String),

    #[error("invalid JSON: {0}")]
    Format(#[from] FormatError),

    #[error("I/O failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("persistence failure: {0}")]
    Persist(#[from] AtomicError),

    #[error("request not received within {0:?}")]
    Timeout(Duration),
}

impl AggregationError {
    /// Status to answer the client with, or `None` when the connection
    /// should be dropped instead.
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            AggregationError::Protocol(_)
            | AggregationError::Validation(_)
            | AggregationError::Format(_) => Some(StatusCode::BadRequest),
            AggregationError::NotFound(_) => Some(StatusCode::NotFound),
            AggregationError::Io(_) | AggregationError::Persist(_) | AggregationError::Timeout(_) => {
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_client_errors_map_to_status() {
        assert_eq!(
            AggregationError::Protocol("bad line".into()).status(),
            Some(StatusCode::BadRequest)
        );
        assert_eq!(
            AggregationError::Validation("no id".into()).status(),
            Some(StatusCode::BadRequest)
        );
        assert_eq!(
            AggregationError::Format(FormatError::new(3, "oops")).status(),
            Some(StatusCode::BadRequest)
        );
        assert_eq!(
            AggregationError::NotFound("s1".into()).status(),
            Some(StatusCode::NotFound)
        );
    }

    #[test]
    fn test_fatal_errors_abort_connection() {
        let err = AggregationError::from(io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert_eq!(err.status(), None);
        assert_eq!(AggregationError::Timeout(Duration::from_secs(1)).status(), None);
    }

    #[test]
    fn test_format_error_message_names_position() {
        let err = AggregationError::from(FormatError::new(6, "expected a value"));
        assert_eq!(err.to_string(), "invalid JSON: expected a value at position 6");
    }
}
