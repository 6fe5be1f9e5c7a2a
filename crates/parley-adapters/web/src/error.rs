//! Web adapter error types.

use thiserror::Error;

/// Errors raised while reading an inbound webhook payload.
#[derive(Error, Debug)]
pub enum AdapterError {
    /// The body is not valid JSON.
    #[error("Invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    /// The body is valid JSON but not an object.
    #[error("Expected a JSON object payload, got {0}")]
    NotAnObject(&'static str),
}

/// Result type for adapter operations.
pub type AdapterResult<T> = Result<T, AdapterError>;
