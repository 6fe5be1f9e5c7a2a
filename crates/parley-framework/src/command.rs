//! Slash-command parsing.
//!
//! A message is a command when it has the shape `/<word>` optionally
//! followed by whitespace and an argument string. The keyword is made of
//! word characters; everything after the first run of whitespace is the raw
//! argument string, which is also split on whitespace into `args`.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::matcher::Params;

static COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^/(\w+)(?:\s+(.*))?$").expect("command regex is valid"));

/// A parsed `/command arg1 arg2` message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    /// The keyword without the leading slash.
    pub command: String,
    /// The raw argument string, empty when there are no arguments.
    pub arguments: String,
    /// The argument string split on whitespace, empty tokens discarded.
    pub args: Vec<String>,
}

impl CommandInvocation {
    /// Parses `message`, returning `None` if it is not a command.
    pub fn parse(message: &str) -> Option<Self> {
        let caps = COMMAND.captures(message)?;
        let command = caps.get(1)?.as_str().to_string();
        let arguments = caps
            .get(2)
            .map(|m| m.as_str().to_string())
            .unwrap_or_default();
        let args = arguments.split_whitespace().map(str::to_string).collect();
        Some(Self {
            command,
            arguments,
            args,
        })
    }

    /// Converts the invocation into the parameters handlers see.
    pub fn into_params(self) -> Params {
        let mut params = Params::new();
        params.insert("command", self.command);
        params.insert("arguments", self.arguments);
        params.insert(
            "args",
            Value::Array(self.args.into_iter().map(Value::String).collect()),
        );
        params
    }
}
