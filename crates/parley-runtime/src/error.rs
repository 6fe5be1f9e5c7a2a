//! Runtime error types.

use std::time::Duration;

use thiserror::Error;

use parley_core::StorageError;
use parley_framework::{BoxError, DispatchError, RuleError};

use crate::config::ConfigError;

/// Errors that can occur while starting the runtime or handling a message.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// Configuration could not be loaded or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The storage backend could not be opened or swept.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    /// The configured rule file could not be loaded.
    #[error("Rule file error: {0}")]
    Rules(#[from] RuleError),

    /// A dispatch failed.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// A dispatch ran past the configured limit and was dropped.
    #[error("Dispatch timed out after {0:?}")]
    Timeout(Duration),

    /// A failure raised by a service layer.
    #[error("Service error: {0}")]
    Service(BoxError),
}

/// Result type for runtime operations.
pub type RuntimeResult<T> = Result<T, RuntimeError>;
