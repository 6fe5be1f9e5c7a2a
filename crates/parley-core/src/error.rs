//! Unified error types for the Parley core capabilities.
//!
//! Framework-level errors (pattern compilation, dispatch, rule loading) are
//! defined in parley-framework.

use thiserror::Error;

// =============================================================================
// Driver Errors
// =============================================================================

/// Errors reported by a [`Driver`](crate::Driver) when sending a reply.
///
/// The dispatcher logs these and moves on; it never retries.
#[derive(Debug, Clone, Error)]
pub enum DriverError {
    /// The platform rejected or failed to deliver the message.
    #[error("failed to send message: {0}")]
    SendFailed(String),
}

// =============================================================================
// Storage Errors
// =============================================================================

/// Errors that can occur in storage operations.
#[derive(Debug, Clone, Error)]
pub enum StorageError {
    /// I/O error.
    #[error("storage I/O error: {0}")]
    Io(String),

    /// Failed to serialize or deserialize a stored value.
    #[error("storage serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for driver operations.
pub type DriverResult<T> = Result<T, DriverError>;

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;
