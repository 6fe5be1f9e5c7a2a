//! Rule side effects on the conversation.

use serde::Deserialize;
use serde_json::Value;
use tracing::{trace, warn};

use parley_core::StorageResult;

use super::condition::as_number;
use super::template::{TemplateVars, render};
use crate::context::Context;

/// A side effect run before a rich response is rendered.
///
/// ```json
/// { "type": "set", "key": "status", "value": "active" }
/// { "type": "increment", "key": "visits" }
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Action {
    /// Stores `value` under `key`. String values are rendered as templates.
    Set {
        key: String,
        #[serde(default)]
        value: Value,
    },
    /// Adds one to the number under `key`, treating anything else as 0.
    Increment { key: String },
    /// Ignored.
    #[serde(other)]
    Unknown,
}

impl Action {
    /// Applies the action to the sender's conversation.
    pub async fn apply(&self, ctx: &Context, vars: &TemplateVars) -> StorageResult<()> {
        let conversation = ctx.conversation();
        match self {
            Self::Set { key, value } => {
                let value = match value {
                    Value::String(template) => Value::String(render(template, vars)),
                    other => other.clone(),
                };
                trace!(key = %key, "Rule action: set");
                conversation.set(key.as_str(), value).await
            }
            Self::Increment { key } => {
                let current = conversation.get(key).as_ref().and_then(as_number).unwrap_or(0.0);
                let next = current + 1.0;
                let value = if next.fract() == 0.0 && next.abs() < i64::MAX as f64 {
                    Value::from(next as i64)
                } else {
                    Value::from(next)
                };
                trace!(key = %key, value = %value, "Rule action: increment");
                conversation.set(key.as_str(), value).await
            }
            Self::Unknown => {
                warn!("Ignoring unknown rule action");
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_deserialize() {
        let actions: Vec<Action> = serde_json::from_value(json!([
            { "type": "set", "key": "status", "value": "active" },
            { "type": "increment", "key": "visits" },
            { "type": "email", "to": "ops" }
        ]))
        .unwrap();
        assert_eq!(
            actions,
            vec![
                Action::Set { key: "status".into(), value: json!("active") },
                Action::Increment { key: "visits".into() },
                Action::Unknown,
            ]
        );
    }
}
