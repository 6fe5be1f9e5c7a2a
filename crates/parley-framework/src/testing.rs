//! Test support: a driver that records what it was asked to send.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Value, json};

use parley_core::{Driver, DriverError, DriverResult};

pub(crate) struct MockDriver {
    message: Option<String>,
    sender_id: Option<String>,
    data: Value,
    fail_sends: bool,
    sent: Mutex<Vec<(String, Option<String>)>>,
}

impl MockDriver {
    pub(crate) fn new(message: &str, sender_id: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(message), Some(sender_id), false))
    }

    pub(crate) fn without_sender(message: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(message), None, false))
    }

    pub(crate) fn failing(message: &str, sender_id: &str) -> Arc<Self> {
        Arc::new(Self::build(Some(message), Some(sender_id), true))
    }

    fn build(message: Option<&str>, sender_id: Option<&str>, fail_sends: bool) -> Self {
        Self {
            message: message.map(str::to_string),
            sender_id: sender_id.map(str::to_string),
            data: json!({ "message": message, "sender_id": sender_id }),
            fail_sends,
            sent: Mutex::new(Vec::new()),
        }
    }

    /// Texts sent so far, in order.
    pub(crate) fn sent(&self) -> Vec<String> {
        self.sent.lock().iter().map(|(text, _)| text.clone()).collect()
    }

    /// Recipients passed to each send, in order.
    pub(crate) fn recipients(&self) -> Vec<Option<String>> {
        self.sent.lock().iter().map(|(_, to)| to.clone()).collect()
    }
}

#[async_trait]
impl Driver for MockDriver {
    fn platform(&self) -> &'static str {
        "mock"
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn sender_id(&self) -> Option<&str> {
        self.sender_id.as_deref()
    }

    fn data(&self) -> &Value {
        &self.data
    }

    async fn send_message(&self, text: &str, sender_id: Option<&str>) -> DriverResult<()> {
        if self.fail_sends {
            return Err(DriverError::SendFailed("mock outage".into()));
        }
        self.sent
            .lock()
            .push((text.to_string(), sender_id.map(str::to_string)));
        Ok(())
    }
}
