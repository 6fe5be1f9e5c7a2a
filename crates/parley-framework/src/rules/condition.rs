//! Rule conditions.
//!
//! ```json
//! { "type": "conversation", "key": "status", "operator": "exists" }
//! { "type": "param", "key": "qty", "operator": ">", "value": 2 }
//! ```

use std::cmp::Ordering;

use serde::Deserialize;
use serde_json::Value;

use super::template::value_to_text;
use crate::context::Context;

/// Where a condition reads its left-hand side from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConditionSource {
    /// A conversation variable.
    Conversation,
    /// A matched parameter.
    Param,
    /// Anything else reads as `null`.
    #[default]
    #[serde(other)]
    Unknown,
}

/// Comparison operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum Operator {
    #[serde(rename = "=", alias = "==")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "contains")]
    Contains,
    #[serde(rename = "exists")]
    Exists,
    /// Unrecognised operators always pass.
    #[default]
    #[serde(other)]
    Unknown,
}

/// One `{type, key, operator, value}` check.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Condition {
    #[serde(rename = "type", default)]
    pub source: ConditionSource,
    pub key: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: Value,
}

impl Condition {
    /// Evaluates the condition against a dispatch.
    pub fn evaluate(&self, ctx: &Context) -> bool {
        let actual = match self.source {
            ConditionSource::Conversation => ctx.conversation().get(&self.key),
            ConditionSource::Param => ctx.param_value(&self.key),
            ConditionSource::Unknown => None,
        }
        .unwrap_or(Value::Null);
        self.operator.apply(&actual, &self.value)
    }
}

impl Operator {
    /// Applies the operator to `actual` (left) and `expected` (right).
    pub fn apply(self, actual: &Value, expected: &Value) -> bool {
        match self {
            Self::Eq => loose_eq(actual, expected),
            Self::Ne => !loose_eq(actual, expected),
            Self::Gt => loose_cmp(actual, expected) == Some(Ordering::Greater),
            Self::Lt => loose_cmp(actual, expected) == Some(Ordering::Less),
            Self::Contains => value_to_text(actual).contains(&value_to_text(expected)),
            Self::Exists => is_truthy(actual),
            Self::Unknown => true,
        }
    }
}

/// Numeric equality when both sides read as numbers, text equality otherwise.
fn loose_eq(a: &Value, b: &Value) -> bool {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x == y,
        _ => value_to_text(a) == value_to_text(b),
    }
}

fn loose_cmp(a: &Value, b: &Value) -> Option<Ordering> {
    match (as_number(a), as_number(b)) {
        (Some(x), Some(y)) => x.partial_cmp(&y),
        _ => Some(value_to_text(a).cmp(&value_to_text(b))),
    }
}

pub(crate) fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok().filter(|n: &f64| n.is_finite()),
        _ => None,
    }
}

/// `null`, `false`, `0`, `""`, `"0"` and empty collections are falsy.
pub(crate) fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
        Value::String(s) => !s.is_empty() && s != "0",
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
