//! The JSON-webhook driver.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::trace;

use parley_core::{Driver, DriverResult};

use crate::error::{AdapterError, AdapterResult};

/// One buffered outbound message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebResponse {
    pub message: String,
    pub sender_id: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

/// A driver for a generic JSON webhook.
///
/// The payload is an object with a `message` and a `sender_id` (or
/// `user_id`); any other fields stay available through [`Driver::data`].
/// A payload without a sender id gets a generated `web_…` id.
///
/// Nothing is sent over the network: replies are buffered and rendered into
/// the webhook's HTTP response with [`to_json`](Self::to_json).
#[derive(Debug)]
pub struct WebDriver {
    message: Option<String>,
    sender_id: String,
    data: Value,
    responses: Mutex<Vec<WebResponse>>,
}

impl WebDriver {
    /// Parses a request body.
    pub fn from_json(body: &str) -> AdapterResult<Self> {
        Self::from_value(serde_json::from_str(body)?)
    }

    /// Builds a driver from a decoded payload.
    pub fn from_value(data: Value) -> AdapterResult<Self> {
        let Value::Object(fields) = &data else {
            return Err(AdapterError::NotAnObject(json_kind(&data)));
        };

        let message = fields.get("message").and_then(scalar_text);
        let sender_id = ["sender_id", "user_id"]
            .iter()
            .find_map(|key| fields.get(*key).and_then(scalar_text))
            .filter(|id| !id.is_empty())
            .unwrap_or_else(|| format!("web_{}", uuid::Uuid::new_v4().simple()));

        trace!(sender_id = %sender_id, has_message = message.is_some(), "Parsed web payload");
        Ok(Self {
            message,
            sender_id,
            data,
            responses: Mutex::new(Vec::new()),
        })
    }

    /// Returns the buffered replies, oldest first.
    pub fn responses(&self) -> Vec<WebResponse> {
        self.responses.lock().clone()
    }

    pub fn clear_responses(&self) {
        self.responses.lock().clear();
    }

    /// Renders `{"responses": [...], "status": "success"}`.
    pub fn to_json(&self) -> Value {
        json!({
            "responses": *self.responses.lock(),
            "status": "success",
        })
    }

    /// Renders each reply as an escaped `<div class="bot-message">`.
    pub fn to_html(&self) -> String {
        self.responses
            .lock()
            .iter()
            .map(|r| format!("<div class=\"bot-message\">{}</div>", escape_html(&r.message)))
            .collect()
    }
}

#[async_trait]
impl Driver for WebDriver {
    fn platform(&self) -> &'static str {
        "web"
    }

    fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }

    fn sender_id(&self) -> Option<&str> {
        Some(&self.sender_id)
    }

    fn data(&self) -> &Value {
        &self.data
    }

    async fn send_message(&self, text: &str, sender_id: Option<&str>) -> DriverResult<()> {
        self.responses.lock().push(WebResponse {
            message: text.to_string(),
            sender_id: sender_id.unwrap_or(&self.sender_id).to_string(),
            timestamp: chrono::Utc::now().timestamp(),
        });
        Ok(())
    }
}

/// Strings pass through; numbers are accepted for ids posted as integers.
fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#039;"),
            c => escaped.push(c),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parley_core::MemoryStore;
    use parley_framework::{Context, Dispatcher};

    use super::*;

    #[test]
    fn test_reads_message_and_sender() {
        let driver =
            WebDriver::from_json(r#"{"message": "hello", "sender_id": "u1", "locale": "en"}"#)
                .unwrap();
        assert_eq!(driver.message(), Some("hello"));
        assert_eq!(driver.sender_id(), Some("u1"));
        assert_eq!(driver.data()["locale"], "en");
        assert!(driver.has_message());
    }

    #[test]
    fn test_user_id_fallback_and_generated_id() {
        let driver = WebDriver::from_value(json!({"message": "hi", "user_id": 42})).unwrap();
        assert_eq!(driver.sender_id(), Some("42"));

        let driver = WebDriver::from_value(json!({"message": "hi"})).unwrap();
        let id = driver.sender_id().unwrap();
        assert!(id.starts_with("web_"));
        assert!(id.len() > "web_".len());
    }

    #[test]
    fn test_missing_message() {
        let driver = WebDriver::from_value(json!({"sender_id": "u1"})).unwrap();
        assert_eq!(driver.message(), None);
        assert!(!driver.has_message());

        let driver = WebDriver::from_value(json!({"message": "", "sender_id": "u1"})).unwrap();
        assert!(!driver.has_message());
    }

    #[test]
    fn test_rejects_bad_payloads() {
        assert!(matches!(
            WebDriver::from_json("{not json"),
            Err(AdapterError::InvalidJson(_))
        ));
        assert!(matches!(
            WebDriver::from_json(r#"["hello"]"#),
            Err(AdapterError::NotAnObject("an array"))
        ));
    }

    #[tokio::test]
    async fn test_buffers_and_renders_responses() {
        let driver = WebDriver::from_value(json!({"message": "hi", "sender_id": "u1"})).unwrap();
        driver.send_message("first", None).await.unwrap();
        driver.send_message("<b>second</b>", Some("u2")).await.unwrap();

        let responses = driver.responses();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].sender_id, "u1");
        assert_eq!(responses[1].sender_id, "u2");

        let rendered = driver.to_json();
        assert_eq!(rendered["status"], "success");
        assert_eq!(rendered["responses"][0]["message"], "first");
        assert_eq!(rendered["responses"][1]["sender_id"], "u2");
        assert!(rendered["responses"][0]["timestamp"].is_i64());

        assert_eq!(
            driver.to_html(),
            "<div class=\"bot-message\">first</div>\
             <div class=\"bot-message\">&lt;b&gt;second&lt;/b&gt;</div>"
        );

        driver.clear_responses();
        assert_eq!(driver.to_json()["responses"], json!([]));
    }

    #[tokio::test]
    async fn test_dispatch_through_web_driver() {
        let mut dispatcher = Dispatcher::new(Arc::new(MemoryStore::new()));
        dispatcher.hears("hello {name}", |ctx: Arc<Context>| async move {
            format!("Hello, {}!", ctx.param("name").unwrap_or_default())
        });

        let driver = Arc::new(
            WebDriver::from_json(r#"{"message": "hello Maria", "sender_id": "u1"}"#).unwrap(),
        );
        dispatcher.listen(driver.clone()).await.unwrap();

        assert_eq!(
            driver.to_json()["responses"][0]["message"],
            "Hello, Maria!"
        );
    }
}
