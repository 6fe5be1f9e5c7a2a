//! Per-dispatch context.
//!
//! One [`Context`] is built for every message the dispatcher accepts. It is
//! shared with middleware, guards and handlers through an `Arc` and dropped
//! when the dispatch finishes; nothing in it is persisted except through the
//! [`Conversation`].

use parking_lot::RwLock;
use serde_json::Value;
use tracing::error;

use parley_core::{BoxedDriver, Role, StorageResult};

use crate::conversation::Conversation;
use crate::matcher::Params;

/// The message, sender, parameters, conversation and driver of one dispatch.
pub struct Context {
    message: String,
    sender_id: String,
    params: RwLock<Params>,
    conversation: Conversation,
    driver: BoxedDriver,
}

impl Context {
    pub(crate) fn new(
        message: String,
        sender_id: String,
        conversation: Conversation,
        driver: BoxedDriver,
    ) -> Self {
        Self {
            message,
            sender_id,
            params: RwLock::new(Params::new()),
            conversation,
            driver,
        }
    }

    /// Returns the inbound message text.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the sender id.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Returns a copy of the parameters extracted for the current route.
    pub fn params(&self) -> Params {
        self.params.read().clone()
    }

    /// Returns a parameter rendered as a string.
    ///
    /// Strings come back as-is, arrays are joined with spaces, `null` and
    /// missing parameters yield `None`.
    pub fn param(&self, name: &str) -> Option<String> {
        match self.params.read().get(name)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            Value::Array(items) => Some(
                items
                    .iter()
                    .map(|item| match item {
                        Value::String(s) => s.clone(),
                        other => other.to_string(),
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            ),
            other => Some(other.to_string()),
        }
    }

    /// Returns a parameter as raw JSON.
    pub fn param_value(&self, name: &str) -> Option<Value> {
        self.params.read().get(name).cloned()
    }

    /// Returns the sender's conversation.
    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Returns the driver the message came from.
    pub fn driver(&self) -> &BoxedDriver {
        &self.driver
    }

    /// Returns the driver's raw inbound payload.
    pub fn data(&self) -> &Value {
        self.driver.data()
    }

    /// Sends a message to the sender right away.
    ///
    /// The message is appended to the history before the driver is called.
    /// Returns whether the driver accepted it; a storage failure is the only
    /// error.
    pub async fn reply(&self, text: impl Into<String>) -> StorageResult<bool> {
        let text = text.into();
        self.conversation.add_message(Role::Bot, text.as_str()).await?;
        match self.driver.send_message(&text, Some(&self.sender_id)).await {
            Ok(()) => Ok(true),
            Err(e) => {
                error!(
                    platform = self.driver.platform(),
                    sender_id = %self.sender_id,
                    "Failed to send message: {e}"
                );
                Ok(false)
            }
        }
    }

    pub(crate) fn set_params(&self, params: Params) {
        *self.params.write() = params;
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("message", &self.message)
            .field("sender_id", &self.sender_id)
            .field("params", &*self.params.read())
            .field("platform", &self.driver.platform())
            .finish_non_exhaustive()
    }
}
