//! Content-side error types.

use thiserror::Error;

/// Errors raised by the content-side engine.
///
/// None of these cross the message transport: the router turns them into
/// empty replies.
#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("No live element for token: {0}")]
    UnknownToken(String),
    #[error("Element is detached from the document")]
    Detached,
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for ProbeError {
    fn from(err: serde_json::Error) -> Self {
        ProbeError::Serialization(err.to_string())
    }
}

/// Result type for content-side operations.
pub type ProbeResult<T> = Result<T, ProbeError>;
