use thiserror::Error;

/// Codec parse failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message} at position {position}")]
pub struct FormatError {
    /// Byte offset into the input where the problem was detected
    pub position: usize,
    pub message: String,
}

impl FormatError {
    pub fn new(position: usize, message: impl Into<String>) -> Self {
        Self {
            position,
            message: message.into(),
        }
    }
}
