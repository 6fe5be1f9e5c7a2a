//! Pattern matching for incoming messages.
//!
//! A [`Pattern`] decides whether a handler is interested in a message and,
//! for placeholder and regex patterns, pulls named parameters out of it.
//!
//! # Pattern Kinds
//!
//! | Kind | Example | Matches when |
//! |------|---------|--------------|
//! | Literal | `"help"` | message equals it, or contains it case-insensitively |
//! | Wildcard | `"order *"` | the whole message fits, `*` = any run of characters, case-insensitive |
//! | Placeholder | `"hello {name}"` | the message (or a prefix of it) fits, `{name}` = non-whitespace run |
//! | Regex | `/^hi+$/i` | the regex matches, anchors and flags as written |
//! | Any | `["hi", "hey"]` | any element matches, left to right |
//! | Predicate | `\|m\| m.len() > 3` | the closure returns `true` |
//!
//! Kinds are chosen explicitly through the constructors, or by
//! [`Pattern::classify`] for plain strings (used by `From<&str>` and rule
//! files). Classification only treats a string as a regex when it is written
//! in delimited form (`/body/flags`, `#body#flags`, `~body~flags`) and the
//! body compiles, so a literal such as `"a/b"` is never mistaken for one.
//!
//! # Example
//!
//! ```rust,ignore
//! use parley_framework::Pattern;
//!
//! let p = Pattern::from("my name is {name}");
//! assert!(p.matches("my name is Maria"));
//! assert_eq!(p.extract_params("my name is Maria").get_str("name"), Some("Maria"));
//! ```

use std::fmt;
use std::sync::{Arc, LazyLock};

use regex::{Regex, RegexBuilder};
use serde_json::Value;
use tracing::warn;

use crate::error::{PatternError, PatternResult};

/// `{name}` tokens inside a placeholder pattern.
static PLACEHOLDER_TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\{([^{}]+)\}").expect("placeholder token regex is valid")
});

/// Capture used for every placeholder token.
const PLACEHOLDER_CAPTURE: &str = r"(\S+)";

/// Delimiters accepted for regex patterns written as strings.
const REGEX_DELIMITERS: [char; 3] = ['/', '#', '~'];

/// A type-erased predicate pattern.
pub type PredicateFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

// ============================================================================
// Pattern
// ============================================================================

/// A match expression registered against incoming messages.
///
/// Immutable once built; cloning is cheap for every kind except `Literal`
/// and `Any`, which clone their strings.
#[derive(Clone)]
pub enum Pattern {
    /// Exact, then case-insensitive substring match.
    Literal(String),
    /// Full-string, case-insensitive match with `*` as "anything".
    Wildcard(WildcardPattern),
    /// Full-or-prefix, case-insensitive match with `{name}` captures.
    Placeholder(PlaceholderPattern),
    /// A compiled regular expression used as written.
    Regex(Regex),
    /// OR over several patterns, short-circuiting left to right.
    Any(Vec<Pattern>),
    /// Arbitrary predicate over the message text.
    Predicate(PredicateFn),
}

/// Discriminant of a [`Pattern`], handy for logs and tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatternKind {
    Literal,
    Wildcard,
    Placeholder,
    Regex,
    Any,
    Predicate,
}

/// A compiled wildcard pattern.
#[derive(Debug, Clone)]
pub struct WildcardPattern {
    source: String,
    regex: Regex,
}

impl WildcardPattern {
    /// Returns the pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// A compiled placeholder pattern.
#[derive(Debug, Clone)]
pub struct PlaceholderPattern {
    source: String,
    names: Vec<String>,
    full: Regex,
    prefix: Regex,
}

impl PlaceholderPattern {
    /// Returns the pattern as written.
    pub fn source(&self) -> &str {
        &self.source
    }

    /// Returns the parameter names in left-to-right order of occurrence.
    pub fn names(&self) -> &[String] {
        &self.names
    }

    fn captures<'m>(&self, message: &'m str) -> Option<regex::Captures<'m>> {
        self.full
            .captures(message)
            .or_else(|| self.prefix.captures(message))
    }
}

impl Pattern {
    /// Creates a literal pattern.
    pub fn literal(text: impl Into<String>) -> Self {
        Self::Literal(text.into())
    }

    /// Creates a wildcard pattern where each `*` stands for any run of
    /// characters, newlines included.
    pub fn wildcard(source: impl Into<String>) -> PatternResult<Self> {
        let source = source.into();
        let body = source
            .split('*')
            .map(regex::escape)
            .collect::<Vec<_>>()
            .join("(?s:.*)");
        let regex = case_insensitive(&source, &format!("^{body}$"))?;
        Ok(Self::Wildcard(WildcardPattern { source, regex }))
    }

    /// Creates a placeholder pattern such as `"order {qty} {item}"`.
    ///
    /// Every `{name}` token captures one run of non-whitespace characters.
    /// The rest of the text is matched literally and case-insensitively.
    /// The match is attempted against the whole message first and then
    /// against a prefix of it, so trailing content is tolerated.
    pub fn placeholder(source: impl Into<String>) -> PatternResult<Self> {
        let source = source.into();
        let mut body = String::with_capacity(source.len() + 16);
        let mut names = Vec::new();
        let mut last = 0;

        for caps in PLACEHOLDER_TOKEN.captures_iter(&source) {
            let Some(token) = caps.get(0) else { continue };
            body.push_str(&regex::escape(&source[last..token.start()]));
            body.push_str(PLACEHOLDER_CAPTURE);
            names.push(caps[1].to_string());
            last = token.end();
        }
        body.push_str(&regex::escape(&source[last..]));

        let full = case_insensitive(&source, &format!("^{body}$"))?;
        let prefix = case_insensitive(&source, &format!("^{body}"))?;
        Ok(Self::Placeholder(PlaceholderPattern {
            source,
            names,
            full,
            prefix,
        }))
    }

    /// Creates a regex pattern from a raw expression (no delimiters).
    ///
    /// Use inline flags such as `(?i)` for case-insensitivity.
    pub fn regex(source: &str) -> PatternResult<Self> {
        Self::regex_with_flags(source, "")
    }

    /// Creates a regex pattern from an expression and PCRE-style flag letters.
    ///
    /// Supported flags: `i` (case-insensitive), `m` (multi-line), `s` (dot
    /// matches newline), `x` (ignore whitespace), `U` (swap greed) and `u`
    /// (accepted, Unicode is always on).
    pub fn regex_with_flags(source: &str, flags: &str) -> PatternResult<Self> {
        let mut builder = RegexBuilder::new(source);
        for flag in flags.chars() {
            match flag {
                'i' => builder.case_insensitive(true),
                'm' => builder.multi_line(true),
                's' => builder.dot_matches_new_line(true),
                'x' => builder.ignore_whitespace(true),
                'U' => builder.swap_greed(true),
                'u' => &mut builder,
                other => return Err(PatternError::UnsupportedFlag(other)),
            };
        }
        builder
            .build()
            .map(Self::Regex)
            .map_err(|source_err| PatternError::InvalidRegex {
                pattern: source.to_string(),
                source: source_err,
            })
    }

    /// Creates an OR pattern.
    pub fn any(patterns: impl IntoIterator<Item = Pattern>) -> Self {
        Self::Any(patterns.into_iter().collect())
    }

    /// Creates a predicate pattern.
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(f))
    }

    /// Classifies a plain string into a pattern kind.
    ///
    /// Precedence: delimited regex that compiles, then wildcard (contains
    /// `*`), then placeholder (contains `{`), then literal. The result is a
    /// pure function of the input string.
    pub fn classify(source: &str) -> Self {
        if let Some((body, flags)) = split_delimited(source)
            && let Ok(pattern) = Self::regex_with_flags(body, flags)
        {
            return pattern;
        }

        let compiled = if source.contains('*') {
            Self::wildcard(source)
        } else if source.contains('{') {
            Self::placeholder(source)
        } else {
            return Self::literal(source);
        };

        compiled.unwrap_or_else(|e| {
            warn!(pattern = source, error = %e, "Falling back to literal pattern");
            Self::literal(source)
        })
    }

    /// Returns this pattern's kind.
    pub fn kind(&self) -> PatternKind {
        match self {
            Self::Literal(_) => PatternKind::Literal,
            Self::Wildcard(_) => PatternKind::Wildcard,
            Self::Placeholder(_) => PatternKind::Placeholder,
            Self::Regex(_) => PatternKind::Regex,
            Self::Any(_) => PatternKind::Any,
            Self::Predicate(_) => PatternKind::Predicate,
        }
    }

    /// Tests the pattern against a message.
    pub fn matches(&self, message: &str) -> bool {
        match self {
            Self::Literal(text) => text == message || contains_ignore_case(message, text),
            Self::Wildcard(w) => w.source == message || w.regex.is_match(message),
            Self::Placeholder(p) => {
                p.source == message || p.full.is_match(message) || p.prefix.is_match(message)
            }
            Self::Regex(regex) => regex.is_match(message),
            Self::Any(patterns) => patterns.iter().any(|p| p.matches(message)),
            Self::Predicate(f) => f(message),
        }
    }

    /// Extracts parameters from a message.
    ///
    /// - Placeholder: one entry per `{name}` token, in order of occurrence.
    ///   A token without a capture maps to `null`. When a name repeats, the
    ///   entry stays at its first position and holds the last capture.
    /// - Regex: capture groups 1.. keyed by position (`"0"`, `"1"`, ...).
    /// - Every other kind yields no parameters.
    pub fn extract_params(&self, message: &str) -> Params {
        let mut params = Params::new();
        match self {
            Self::Placeholder(p) => {
                if let Some(caps) = p.captures(message) {
                    for (index, name) in p.names.iter().enumerate() {
                        params.insert(name.clone(), capture_value(caps.get(index + 1)));
                    }
                }
            }
            Self::Regex(regex) => {
                if let Some(caps) = regex.captures(message) {
                    for index in 1..caps.len() {
                        params.insert((index - 1).to_string(), capture_value(caps.get(index)));
                    }
                }
            }
            _ => {}
        }
        params
    }
}

fn case_insensitive(source: &str, expr: &str) -> PatternResult<Regex> {
    RegexBuilder::new(expr)
        .case_insensitive(true)
        .build()
        .map_err(|e| PatternError::InvalidRegex {
            pattern: source.to_string(),
            source: e,
        })
}

fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack.to_lowercase().contains(&needle.to_lowercase())
}

fn capture_value(m: Option<regex::Match<'_>>) -> Value {
    m.map_or(Value::Null, |m| Value::String(m.as_str().to_string()))
}

/// Splits `/body/flags` into body and flags.
fn split_delimited(source: &str) -> Option<(&str, &str)> {
    let delimiter = source.chars().next()?;
    if !REGEX_DELIMITERS.contains(&delimiter) {
        return None;
    }
    let rest = &source[delimiter.len_utf8()..];
    let end = rest.rfind(delimiter)?;
    let flags = &rest[end + delimiter.len_utf8()..];
    flags
        .chars()
        .all(|c| "imsxuU".contains(c))
        .then_some((&rest[..end], flags))
}

impl fmt::Debug for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(text) => f.debug_tuple("Literal").field(text).finish(),
            Self::Wildcard(w) => f.debug_tuple("Wildcard").field(&w.source).finish(),
            Self::Placeholder(p) => f
                .debug_struct("Placeholder")
                .field("source", &p.source)
                .field("names", &p.names)
                .finish(),
            Self::Regex(regex) => f.debug_tuple("Regex").field(&regex.as_str()).finish(),
            Self::Any(patterns) => f.debug_tuple("Any").field(patterns).finish(),
            Self::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

impl From<&str> for Pattern {
    fn from(source: &str) -> Self {
        Self::classify(source)
    }
}

impl From<String> for Pattern {
    fn from(source: String) -> Self {
        Self::classify(&source)
    }
}

impl From<Regex> for Pattern {
    fn from(regex: Regex) -> Self {
        Self::Regex(regex)
    }
}

impl From<Vec<Pattern>> for Pattern {
    fn from(patterns: Vec<Pattern>) -> Self {
        Self::Any(patterns)
    }
}

impl From<Vec<&str>> for Pattern {
    fn from(sources: Vec<&str>) -> Self {
        Self::any(sources.into_iter().map(Self::classify))
    }
}

impl<const N: usize> From<[&str; N]> for Pattern {
    fn from(sources: [&str; N]) -> Self {
        Self::any(sources.into_iter().map(Self::classify))
    }
}

// ============================================================================
// Params
// ============================================================================

/// Ordered parameters extracted from a message.
///
/// Values are JSON so that command dispatch can store the tokenized
/// argument list alongside plain string captures.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Params {
    entries: Vec<(String, Value)>,
}

impl Params {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a parameter. An existing name keeps its position and takes the new value.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some((_, slot)) => *slot = value,
            None => self.entries.push((name, value)),
        }
    }

    /// Returns the value stored under `name`.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    /// Returns the value under `name` if it is a string.
    pub fn get_str(&self, name: &str) -> Option<&str> {
        self.get(name).and_then(Value::as_str)
    }

    /// Returns the regex capture at `index` (0 = first capture group).
    pub fn positional(&self, index: usize) -> Option<&str> {
        self.get_str(&index.to_string())
    }

    /// Returns the parameter names in order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(n, _)| n.as_str())
    }

    /// Iterates over `(name, value)` pairs in order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl FromIterator<(String, Value)> for Params {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        let mut params = Self::new();
        for (name, value) in iter {
            params.insert(name, value);
        }
        params
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_is_stable() {
        assert_eq!(Pattern::classify("help").kind(), PatternKind::Literal);
        assert_eq!(Pattern::classify("order *").kind(), PatternKind::Wildcard);
        assert_eq!(Pattern::classify("hi {name}").kind(), PatternKind::Placeholder);
        assert_eq!(Pattern::classify("/^hi$/i").kind(), PatternKind::Regex);
        assert_eq!(Pattern::classify("#\\d+#").kind(), PatternKind::Regex);
        // Not delimited, so never a regex.
        assert_eq!(Pattern::classify("a/b").kind(), PatternKind::Literal);
        assert_eq!(Pattern::classify("/help").kind(), PatternKind::Literal);
        // Delimited but does not compile.
        assert_eq!(Pattern::classify("/(unclosed/").kind(), PatternKind::Literal);
        // Unknown flag.
        assert_eq!(Pattern::classify("/x/q").kind(), PatternKind::Literal);
        // Wildcard takes precedence over placeholder.
        assert_eq!(Pattern::classify("{a} *").kind(), PatternKind::Wildcard);
    }

    #[test]
    fn test_literal_exact_or_contains() {
        let p = Pattern::literal("Hello");
        assert!(p.matches("Hello"));
        assert!(p.matches("oh hello there"));
        assert!(p.matches("HELLO"));
        assert!(!p.matches("help"));

        let bar = Pattern::classify("hi|hey");
        assert!(!bar.matches("hi"));
        assert!(bar.matches("say hi|hey"));
    }

    #[test]
    fn test_wildcard() {
        let p = Pattern::wildcard("order * please").unwrap();
        assert!(p.matches("order pizza please"));
        assert!(p.matches("ORDER two large pizzas PLEASE"));
        assert!(p.matches("order  please"));
        assert!(!p.matches("order pizza"));
        assert!(!p.matches("please order pizza please now"));

        // Metacharacters are literal.
        let p = Pattern::wildcard("cost (usd)? *").unwrap();
        assert!(p.matches("cost (usd)? 12"));
        assert!(!p.matches("cost usd 12"));
    }

    #[test]
    fn test_wildcard_spans_lines() {
        let p = Pattern::wildcard("order *").unwrap();
        assert!(p.matches("order pizza\nand coke"));
        assert!(p.matches("order \n"));
        assert!(!Pattern::wildcard("a*b").unwrap().matches("a\nb\nc"));
    }

    #[test]
    fn test_wildcard_shared_prefix_and_suffix() {
        let p = Pattern::wildcard("ab*yz").unwrap();
        for middle in ["", "c", "anything at all", "***"] {
            assert!(p.matches(&format!("ab{middle}yz")));
        }
    }

    #[test]
    fn test_placeholder_extracts_in_order() {
        let p = Pattern::placeholder("order {qty} {item} to {city}").unwrap();
        let params = p.extract_params("order 2 pizzas to Lisbon");
        let names: Vec<_> = params.names().collect();
        assert_eq!(names, vec!["qty", "item", "city"]);
        assert_eq!(params.get_str("qty"), Some("2"));
        assert_eq!(params.get_str("item"), Some("pizzas"));
        assert_eq!(params.get_str("city"), Some("Lisbon"));
    }

    #[test]
    fn test_placeholder_hello_name() {
        let p = Pattern::from("hello {name}");
        assert!(p.matches("hello Maria"));
        assert!(p.matches("HELLO Maria"));
        assert_eq!(p.extract_params("hello Maria").get_str("name"), Some("Maria"));
    }

    #[test]
    fn test_placeholder_prefix_fallback() {
        let p = Pattern::placeholder("my name is {name}").unwrap();
        assert!(p.matches("my name is John and I like tea"));
        let params = p.extract_params("my name is John and I like tea");
        assert_eq!(params.get_str("name"), Some("John"));
        assert!(!p.matches("what is my name"));
        assert!(p.extract_params("what is my name").is_empty());
    }

    #[test]
    fn test_placeholder_escapes_metacharacters() {
        let p = Pattern::placeholder("price? {amount}$").unwrap();
        assert!(p.matches("price? 10$"));
        assert!(!p.matches("pric 10$"));
    }

    #[test]
    fn test_placeholder_repeated_name_keeps_last_capture() {
        let p = Pattern::placeholder("{x} and {x}").unwrap();
        let params = p.extract_params("tea and coffee");
        assert_eq!(params.len(), 1);
        assert_eq!(params.get_str("x"), Some("coffee"));
    }

    #[test]
    fn test_adjacent_placeholders_leftmost_is_maximal() {
        let p = Pattern::placeholder("{a}{b}").unwrap();
        let params = p.extract_params("abcd");
        assert_eq!(params.get_str("a"), Some("abc"));
        assert_eq!(params.get_str("b"), Some("d"));
    }

    #[test]
    fn test_regex_positional_captures() {
        let p = Pattern::classify("/^(\\w+) (\\d+)$/");
        assert!(p.matches("apples 12"));
        let params = p.extract_params("apples 12");
        assert_eq!(params.positional(0), Some("apples"));
        assert_eq!(params.positional(1), Some("12"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_regex_flags_and_anchors_as_written() {
        let p = Pattern::classify("/hi+/i");
        assert!(p.matches("well HIIII there"));

        let p = Pattern::regex("^hi$").unwrap();
        assert!(p.matches("hi"));
        assert!(!p.matches("HI"));
        assert!(!p.matches("hi there"));

        let optional = Pattern::regex("^a(b)?(c)$").unwrap();
        let params = optional.extract_params("ac");
        assert_eq!(params.get("0"), Some(&Value::Null));
        assert_eq!(params.positional(1), Some("c"));
    }

    #[test]
    fn test_invalid_regex_is_an_error() {
        assert!(matches!(
            Pattern::regex("(oops"),
            Err(PatternError::InvalidRegex { .. })
        ));
        assert!(matches!(
            Pattern::regex_with_flags("a", "z"),
            Err(PatternError::UnsupportedFlag('z'))
        ));
    }

    #[test]
    fn test_any_short_circuits() {
        let p = Pattern::from(["hello", "hi", "hey"]);
        assert!(p.matches("hi"));
        assert!(!p.matches("goodbye"));
        assert!(p.extract_params("hi").is_empty());
    }

    #[test]
    fn test_predicate() {
        let p = Pattern::predicate(|m| m.ends_with('?'));
        assert!(p.matches("really?"));
        assert!(!p.matches("really."));
        assert_eq!(p.kind(), PatternKind::Predicate);
    }

    #[test]
    fn test_verbatim_equality_matches() {
        let p = Pattern::classify("hello {name}");
        assert!(p.matches("hello {name}"));
    }

    #[test]
    fn test_params_insert_replaces_in_place() {
        let mut params = Params::new();
        params.insert("a", "1");
        params.insert("b", "2");
        params.insert("a", "3");
        let pairs: Vec<_> = params.iter().map(|(n, v)| (n, v.clone())).collect();
        assert_eq!(
            pairs,
            vec![("a", Value::from("3")), ("b", Value::from("2"))]
        );
    }
}
