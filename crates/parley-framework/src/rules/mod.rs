//! Declarative rules loaded from JSON.
//!
//! A rule file lists conversations as pattern/response pairs with optional
//! conditions:
//!
//! ```json
//! {
//!   "conversations": [
//!     {
//!       "pattern": "check status",
//!       "response": "Your status is {conversation.status}",
//!       "conditions": [
//!         { "type": "conversation", "key": "status", "operator": "exists" }
//!       ]
//!     },
//!     { "pattern": "check status", "response": "You have no status yet." },
//!     {
//!       "pattern": "activate",
//!       "response": {
//!         "text": "Done, {conversation.status}!",
//!         "actions": [{ "type": "set", "key": "status", "value": "active" }]
//!       }
//!     },
//!     { "pattern": ["hi", "hello"], "response": { "random": ["Hey!", "Hello!"] } }
//!   ]
//! }
//! ```
//!
//! Each rule becomes one [`Route`]. Conditions act as the route's guard, so a
//! rule whose conditions fail lets later rules and the fallback take over.
//!
//! Loading fails on a missing or unreadable file, invalid JSON, a document
//! without a `conversations` array, or an explicit pattern object that does
//! not compile. Entries without `pattern` or `response` are skipped.

mod action;
mod condition;
mod template;

use std::fs;
use std::path::Path;
use std::sync::Arc;

use rand::seq::IndexedRandom;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use parley_core::StorageResult;

pub use action::Action;
pub use condition::{Condition, ConditionSource, Operator};
pub use template::{TemplateVars, render};

use crate::context::Context;
use crate::error::{BoxError, RuleError, RuleResult};
use crate::matcher::Pattern;
use crate::reply::Reply;
use crate::routing::Route;

// ============================================================================
// Response
// ============================================================================

/// What a rule answers with.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Response {
    /// A template string.
    Text(String),
    /// One template picked uniformly at random.
    Random { random: Vec<String> },
    /// Actions to run, then an optional template to send.
    Rich {
        #[serde(default)]
        text: Option<String>,
        #[serde(default)]
        actions: Vec<Action>,
    },
}

impl Response {
    /// Runs the response's actions and renders its reply.
    pub async fn respond(&self, ctx: &Context) -> StorageResult<Reply> {
        match self {
            Self::Text(template) => Ok(render(template, &TemplateVars::from_context(ctx)).into()),
            Self::Random { random } => {
                let Some(template) = random.choose(&mut rand::rng()) else {
                    return Ok(Reply::None);
                };
                Ok(render(template, &TemplateVars::from_context(ctx)).into())
            }
            Self::Rich { text, actions } => {
                let vars = TemplateVars::from_context(ctx);
                for action in actions {
                    action.apply(ctx, &vars).await?;
                }
                Ok(match text {
                    // Re-read so the text sees what the actions wrote.
                    Some(template) => render(template, &TemplateVars::from_context(ctx)).into(),
                    None => Reply::None,
                })
            }
        }
    }
}

// ============================================================================
// Rule
// ============================================================================

/// One compiled entry of a rule file.
#[derive(Debug, Clone)]
pub struct Rule {
    index: usize,
    name: Option<String>,
    pattern: Pattern,
    conditions: Arc<[Condition]>,
    response: Arc<Response>,
}

impl Rule {
    /// Creates a rule without conditions.
    pub fn new(pattern: impl Into<Pattern>, response: Response) -> Self {
        Self {
            index: 0,
            name: None,
            pattern: pattern.into(),
            conditions: Arc::from(Vec::new()),
            response: Arc::new(response),
        }
    }

    /// Adds conditions that must all pass.
    pub fn with_conditions(mut self, conditions: Vec<Condition>) -> Self {
        self.conditions = conditions.into();
        self
    }

    /// Position of the entry in its file.
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn response(&self) -> &Response {
        &self.response
    }

    /// Returns `true` if every condition passes.
    pub fn conditions_pass(&self, ctx: &Context) -> bool {
        self.conditions.iter().all(|c| c.evaluate(ctx))
    }

    /// Compiles the rule into a route.
    pub fn to_route(&self) -> Route {
        let response = Arc::clone(&self.response);
        let mut route = Route::new(self.pattern.clone(), move |ctx: Arc<Context>| {
            let response = Arc::clone(&response);
            async move { response.respond(&ctx).await.map_err(BoxError::from) }
        })
        .name(
            self.name
                .clone()
                .unwrap_or_else(|| format!("rule #{}", self.index)),
        );

        if !self.conditions.is_empty() {
            let conditions = Arc::clone(&self.conditions);
            route = route.when(move |ctx| conditions.iter().all(|c| c.evaluate(ctx)));
        }
        route
    }
}

// ============================================================================
// RuleSet
// ============================================================================

/// All usable rules of a rule file, in file order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    /// Reads and parses a rule file.
    pub fn from_path(path: impl AsRef<Path>) -> RuleResult<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|source| RuleError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let rules = Self::from_json(&contents)?;
        debug!(path = %path.display(), rules = rules.len(), "Loaded rule file");
        Ok(rules)
    }

    /// Parses a rule document.
    pub fn from_json(json: &str) -> RuleResult<Self> {
        let value: Value = serde_json::from_str(json).map_err(|e| {
            if e.is_syntax() || e.is_eof() {
                RuleError::Syntax(e)
            } else {
                RuleError::malformed(e.to_string())
            }
        })?;
        Self::from_value(value)
    }

    /// Builds a rule set from an already parsed document.
    pub fn from_value(value: Value) -> RuleResult<Self> {
        let Value::Object(mut root) = value else {
            return Err(RuleError::malformed("the document root must be an object"));
        };
        let entries = match root.remove("conversations") {
            None | Some(Value::Null) => return Err(RuleError::MissingConversations),
            Some(Value::Array(entries)) => entries,
            Some(_) => return Err(RuleError::malformed("'conversations' must be an array")),
        };

        let mut rules = Vec::with_capacity(entries.len());
        for (index, entry) in entries.into_iter().enumerate() {
            if let Some(rule) = parse_rule(index, entry)? {
                rules.push(rule);
            }
        }
        Ok(Self { rules })
    }

    /// Appends a rule.
    pub fn push(&mut self, mut rule: Rule) {
        rule.index = self.rules.len();
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// One route per rule, in order.
    pub fn routes(&self) -> impl Iterator<Item = Route> + '_ {
        self.rules.iter().map(Rule::to_route)
    }
}

/// Raw shape of one entry, before pattern compilation.
#[derive(Deserialize)]
struct RawRule {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    pattern: Option<Value>,
    #[serde(default)]
    response: Option<Response>,
    #[serde(default)]
    conditions: Vec<Condition>,
}

fn parse_rule(index: usize, entry: Value) -> RuleResult<Option<Rule>> {
    let raw: RawRule = match serde_json::from_value(entry) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(index, "Skipping malformed rule: {e}");
            return Ok(None);
        }
    };
    let (Some(pattern), Some(response)) = (raw.pattern.filter(|p| !p.is_null()), raw.response)
    else {
        warn!(index, "Skipping rule without pattern or response");
        return Ok(None);
    };
    let Some(pattern) = parse_pattern(index, &pattern)? else {
        warn!(index, "Skipping rule with unsupported pattern");
        return Ok(None);
    };

    Ok(Some(Rule {
        index,
        name: raw.name,
        pattern,
        conditions: raw.conditions.into(),
        response: Arc::new(response),
    }))
}

/// A string is classified, an array becomes `Any`, and a single-key object
/// names the kind explicitly. Other shapes yield `None`.
fn parse_pattern(index: usize, value: &Value) -> RuleResult<Option<Pattern>> {
    let invalid = |source| RuleError::InvalidPattern { index, source };
    Ok(match value {
        Value::String(source) => Some(Pattern::classify(source)),
        Value::Array(items) => {
            let mut patterns = Vec::with_capacity(items.len());
            for item in items {
                match parse_pattern(index, item)? {
                    Some(pattern) => patterns.push(pattern),
                    None => return Ok(None),
                }
            }
            Some(Pattern::any(patterns))
        }
        Value::Object(map) => {
            let text = |key: &str| map.get(key).and_then(Value::as_str);
            if let Some(source) = text("regex") {
                let flags = text("flags").unwrap_or("");
                Some(Pattern::regex_with_flags(source, flags).map_err(invalid)?)
            } else if let Some(source) = text("wildcard") {
                Some(Pattern::wildcard(source).map_err(invalid)?)
            } else if let Some(source) = text("placeholder") {
                Some(Pattern::placeholder(source).map_err(invalid)?)
            } else {
                text("literal").map(Pattern::literal)
            }
        }
        _ => None,
    })
}
