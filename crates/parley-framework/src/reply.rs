//! Handler return values.
//!
//! Every handler produces a [`Reply`]: nothing, one message, or several
//! messages delivered in order. Handlers may return anything implementing
//! [`IntoReply`]:
//!
//! ```rust,ignore
//! async fn nothing(_ctx: Arc<Context>) {}
//! async fn one(_ctx: Arc<Context>) -> &'static str { "Hi!" }
//! async fn many(_ctx: Arc<Context>) -> Vec<String> { vec!["a".into(), "b".into()] }
//! async fn maybe(ctx: Arc<Context>) -> Option<String> { ctx.param("name") }
//! async fn fallible(ctx: Arc<Context>) -> Result<String, BoxError> { ... }
//! ```

use crate::error::BoxError;

/// What a handler wants sent back to the sender.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Reply {
    /// Send nothing.
    #[default]
    None,
    /// Send exactly one message.
    Single(String),
    /// Send each message, in order, as separate sends.
    Many(Vec<String>),
}

impl Reply {
    /// Returns `true` if nothing will be sent.
    pub fn is_none(&self) -> bool {
        match self {
            Self::None => true,
            Self::Single(_) => false,
            Self::Many(messages) => messages.is_empty(),
        }
    }

    /// Flattens the reply into the list of messages to send.
    pub fn into_messages(self) -> Vec<String> {
        match self {
            Self::None => Vec::new(),
            Self::Single(message) => vec![message],
            Self::Many(messages) => messages,
        }
    }
}

impl From<String> for Reply {
    fn from(message: String) -> Self {
        Self::Single(message)
    }
}

impl From<&str> for Reply {
    fn from(message: &str) -> Self {
        Self::Single(message.to_string())
    }
}

impl From<Vec<String>> for Reply {
    fn from(messages: Vec<String>) -> Self {
        Self::Many(messages)
    }
}

// ============================================================================
// IntoReply
// ============================================================================

/// Converts a handler's return value into a [`Reply`].
///
/// An `Err` is propagated to the dispatch caller untouched.
pub trait IntoReply: Send {
    fn into_reply(self) -> Result<Reply, BoxError>;
}

impl IntoReply for () {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::None)
    }
}

impl IntoReply for Reply {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(self)
    }
}

impl IntoReply for String {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Single(self))
    }
}

impl IntoReply for &'static str {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Single(self.to_string()))
    }
}

impl IntoReply for Vec<String> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Many(self))
    }
}

impl IntoReply for Vec<&'static str> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        Ok(Reply::Many(self.into_iter().map(str::to_string).collect()))
    }
}

impl<T: IntoReply> IntoReply for Option<T> {
    fn into_reply(self) -> Result<Reply, BoxError> {
        match self {
            Some(inner) => inner.into_reply(),
            None => Ok(Reply::None),
        }
    }
}

impl<T, E> IntoReply for Result<T, E>
where
    T: IntoReply,
    E: Into<BoxError> + Send,
{
    fn into_reply(self) -> Result<Reply, BoxError> {
        self.map_err(Into::into)?.into_reply()
    }
}
