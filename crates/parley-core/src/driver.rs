//! Driver trait.
//!
//! A driver adapts one chat platform's webhook payload into the normalized
//! message/sender pair the dispatcher consumes, and carries replies back.
//! One driver instance wraps exactly one inbound payload.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::DriverResult;

/// The platform adapter consumed by the dispatcher.
///
/// # API Design
///
/// - Inbound accessors are synchronous: the payload has already been parsed
///   when the driver was constructed.
/// - `send_message` is the only I/O operation. A failure is reported as an
///   error value and never retried by the core.
///
/// # Example Implementation
///
/// ```rust,ignore
/// struct EchoDriver { text: String, sender: String, payload: Value }
///
/// #[async_trait]
/// impl Driver for EchoDriver {
///     fn platform(&self) -> &'static str { "echo" }
///     fn message(&self) -> Option<&str> { Some(&self.text) }
///     fn sender_id(&self) -> Option<&str> { Some(&self.sender) }
///     fn data(&self) -> &Value { &self.payload }
///     async fn send_message(&self, text: &str, _to: Option<&str>) -> DriverResult<()> {
///         println!("{text}");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Driver: Send + Sync + 'static {
    /// Returns a short platform name used in logs (e.g. `"web"`).
    fn platform(&self) -> &'static str;

    /// Returns `true` when the payload carries a non-empty message.
    fn has_message(&self) -> bool {
        self.message().is_some_and(|m| !m.is_empty())
    }

    /// Returns the inbound message text, if any.
    fn message(&self) -> Option<&str>;

    /// Returns the sender id, if any.
    fn sender_id(&self) -> Option<&str>;

    /// Returns the raw structured payload.
    fn data(&self) -> &Value;

    /// Sends a message to `sender_id`, or to the inbound sender when `None`.
    async fn send_message(&self, text: &str, sender_id: Option<&str>) -> DriverResult<()>;
}

/// A shared Driver trait object.
pub type BoxedDriver = Arc<dyn Driver>;
