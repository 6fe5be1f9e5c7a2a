//! Persisted conversation layout.
//!
//! A [`ConversationRecord`] is what storage backends read and write for each
//! sender id. Serialized, it looks like:
//!
//! ```json
//! {
//!   "state": "awaiting_name",
//!   "variables": { "visits": 3 },
//!   "history": [
//!     { "type": "user", "message": "hello", "timestamp": 1718000000 },
//!     { "type": "bot",  "message": "Hi!",   "timestamp": 1718000000 }
//!   ]
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Maximum number of history entries kept per conversation.
pub const HISTORY_LIMIT: usize = 50;

/// Who authored a history entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Inbound message from the sender.
    User,
    /// Outbound reply.
    Bot,
}

impl Role {
    /// Returns the role as it appears in the persisted layout.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Bot => "bot",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One message in a conversation's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(rename = "type")]
    pub role: Role,
    #[serde(rename = "message")]
    pub text: String,
    /// Unix timestamp in seconds.
    pub timestamp: i64,
}

impl HistoryEntry {
    /// Creates an entry stamped with the current time.
    pub fn now(role: Role, text: impl Into<String>) -> Self {
        Self {
            role,
            text: text.into(),
            timestamp: chrono::Utc::now().timestamp(),
        }
    }
}

/// The per-sender conversation state as persisted by a storage backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationRecord {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

impl ConversationRecord {
    /// Returns `true` if the record holds no state, variables or history.
    pub fn is_empty(&self) -> bool {
        self.state.is_none() && self.variables.is_empty() && self.history.is_empty()
    }

    /// Appends an entry, evicting the oldest ones beyond [`HISTORY_LIMIT`].
    pub fn push_history(&mut self, entry: HistoryEntry) {
        self.history.push(entry);
        if self.history.len() > HISTORY_LIMIT {
            let excess = self.history.len() - HISTORY_LIMIT;
            self.history.drain(..excess);
        }
    }

    /// Returns the newest timestamp found in the history.
    pub fn last_activity(&self) -> Option<i64> {
        self.history.iter().map(|e| e.timestamp).max()
    }
}
