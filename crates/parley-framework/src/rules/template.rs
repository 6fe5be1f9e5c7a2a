//! `{token}` substitution for rule responses.
//!
//! Tokens are looked up in a flat table built from the matched parameters
//! and the conversation variables, the latter under a `conversation.`
//! prefix. Rendering is a single left-to-right pass: substituted text is
//! never scanned again.

use std::collections::HashMap;

use serde_json::Value;

use crate::context::Context;

const CONVERSATION_PREFIX: &str = "conversation.";

/// Lookup table for [`render`].
#[derive(Debug, Clone, Default)]
pub struct TemplateVars {
    values: HashMap<String, String>,
}

impl TemplateVars {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the table from the context's parameters and conversation.
    pub fn from_context(ctx: &Context) -> Self {
        let mut vars = Self::new();
        for (name, value) in ctx.params().iter() {
            vars.insert(name, value_to_text(value));
        }
        for (key, value) in ctx.conversation().variables() {
            vars.insert(format!("{CONVERSATION_PREFIX}{key}"), value_to_text(&value));
        }
        vars
    }

    /// Adds or replaces a token.
    pub fn insert(&mut self, token: impl Into<String>, value: impl Into<String>) {
        self.values.insert(token.into(), value.into());
    }

    fn lookup(&self, token: &str) -> Option<&str> {
        self.values.get(token).map(String::as_str)
    }
}

/// Substitutes every `{token}` in `template`.
///
/// Unknown `{conversation.*}` tokens render as the empty string. Any other
/// unknown token is kept verbatim, braces included.
pub fn render(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let Some(close) = after.find('}') else {
            rest = &rest[open..];
            break;
        };
        let token = &after[..close];
        if token.contains('{') {
            // `{{name}`: the first brace is plain text.
            out.push('{');
            rest = after;
            continue;
        }
        match vars.lookup(token) {
            Some(value) => out.push_str(value),
            None if token.starts_with(CONVERSATION_PREFIX) => {}
            None => {
                out.push('{');
                out.push_str(token);
                out.push('}');
            }
        }
        rest = &after[close + 1..];
    }

    out.push_str(rest);
    out
}

/// Renders a JSON value the way templates and loose comparisons see it.
///
/// Strings are unquoted, `null` is empty, arrays of scalars are joined with
/// spaces and objects fall back to compact JSON.
pub(crate) fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .collect::<Vec<_>>()
            .join(" "),
        Value::Object(_) => value.to_string(),
    }
}
