//! Error types for the Parley framework.

use std::path::PathBuf;

use parley_core::StorageError;
use thiserror::Error;

/// Error type produced by user callbacks (handlers, middleware).
pub use tower::BoxError;

/// Errors raised while building a [`Pattern`](crate::Pattern).
#[derive(Debug, Clone, Error)]
pub enum PatternError {
    /// The regular expression does not compile.
    #[error("invalid regular expression '{pattern}': {source}")]
    InvalidRegex {
        /// The expression as written.
        pattern: String,
        source: regex::Error,
    },

    /// A regex flag letter is not supported.
    #[error("unsupported regex flag '{0}'")]
    UnsupportedFlag(char),
}

/// Errors that abort a single dispatch.
///
/// None of these are retried and no conversation changes made before the
/// failure are rolled back.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Loading or persisting the conversation failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A middleware callback failed.
    #[error("middleware failed: {0}")]
    Middleware(#[source] BoxError),

    /// A command, pattern or fallback handler failed.
    #[error("handler failed: {0}")]
    Handler(#[source] BoxError),
}

/// Configuration errors raised while loading a declarative rule set.
#[derive(Debug, Error)]
pub enum RuleError {
    /// The rule file could not be read.
    #[error("failed to read rule file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The document is not valid JSON.
    #[error("rule file is not valid JSON: {0}")]
    Syntax(#[source] serde_json::Error),

    /// The document is JSON but not shaped like a rule set.
    #[error("malformed rule set: {0}")]
    Malformed(String),

    /// The top-level `conversations` array is missing.
    #[error("rule set has no top-level 'conversations' array")]
    MissingConversations,

    /// An explicit pattern in a rule does not compile.
    #[error("rule #{index} has an invalid pattern: {source}")]
    InvalidPattern { index: usize, source: PatternError },
}

impl RuleError {
    /// Creates a malformed rule set error.
    pub fn malformed(message: impl Into<String>) -> Self {
        Self::Malformed(message.into())
    }
}

/// Result type for pattern construction.
pub type PatternResult<T> = Result<T, PatternError>;

/// Result type for a dispatch.
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Result type for rule loading.
pub type RuleResult<T> = Result<T, RuleError>;
