//! Per-sender conversation state.
//!
//! A [`Conversation`] wraps the [`ConversationRecord`] of one sender: a state
//! label, a variable bag and a bounded message history. It is loaded from
//! storage at the start of every dispatch and lives only as long as that
//! dispatch; the next message for the same sender reloads it.
//!
//! Every mutator writes the whole record back through
//! [`Storage::set_conversation`] before returning. There is no batching and
//! no explicit commit. Mutators on one `Conversation` are serialized, so
//! storage always ends up holding the newest record even when a handler
//! runs several of them concurrently.
//!
//! ```rust,ignore
//! async fn ask_name(ctx: Arc<Context>) -> Result<&'static str, BoxError> {
//!     let conversation = ctx.conversation();
//!     conversation.set_state("awaiting_name").await?;
//!     conversation.set("attempts", 1).await?;
//!     Ok("What's your name?")
//! }
//! ```

use parking_lot::Mutex;
use serde_json::Value;
use tracing::trace;

use parley_core::{BoxedStorage, ConversationRecord, HistoryEntry, Role, StorageResult};

/// Conversation state for one sender, write-through persisted.
pub struct Conversation {
    sender_id: String,
    storage: BoxedStorage,
    record: Mutex<ConversationRecord>,
    /// Held from mutation until the write lands.
    writes: tokio::sync::Mutex<()>,
}

impl Conversation {
    /// Loads the conversation for `sender_id`, or starts an empty one.
    pub async fn load(storage: BoxedStorage, sender_id: impl Into<String>) -> StorageResult<Self> {
        let sender_id = sender_id.into();
        let record = storage.get_conversation(&sender_id).await?;
        trace!(
            sender_id = %sender_id,
            history = record.history.len(),
            "Loaded conversation"
        );
        Ok(Self {
            sender_id,
            storage,
            record: Mutex::new(record),
            writes: tokio::sync::Mutex::new(()),
        })
    }

    /// Returns the sender id this conversation belongs to.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    // ─── State ────────────────────────────────────────────────────────────────

    /// Returns the current state label.
    pub fn state(&self) -> Option<String> {
        self.record.lock().state.clone()
    }

    /// Returns `true` if the current state label equals `state`.
    pub fn is_in_state(&self, state: &str) -> bool {
        self.record.lock().state.as_deref() == Some(state)
    }

    /// Sets the state label.
    pub async fn set_state(&self, state: impl Into<String>) -> StorageResult<()> {
        let state = state.into();
        self.update(move |r| r.state = Some(state)).await
    }

    /// Clears the state label.
    pub async fn reset_state(&self) -> StorageResult<()> {
        self.update(|r| r.state = None).await
    }

    // ─── Variables ────────────────────────────────────────────────────────────

    /// Returns the variable stored under `key`.
    pub fn get(&self, key: &str) -> Option<Value> {
        self.record.lock().variables.get(key).cloned()
    }

    /// Returns the variable stored under `key`, or `default`.
    pub fn get_or(&self, key: &str, default: impl Into<Value>) -> Value {
        self.get(key).unwrap_or_else(|| default.into())
    }

    /// Returns the variable under `key` if it is a string.
    pub fn get_str(&self, key: &str) -> Option<String> {
        self.get(key).and_then(|v| v.as_str().map(str::to_string))
    }

    /// Returns `true` if `key` holds a non-null value.
    pub fn has(&self, key: &str) -> bool {
        self.record
            .lock()
            .variables
            .get(key)
            .is_some_and(|v| !v.is_null())
    }

    /// Returns a copy of every variable.
    pub fn variables(&self) -> serde_json::Map<String, Value> {
        self.record.lock().variables.clone()
    }

    /// Stores `value` under `key`.
    pub async fn set(&self, key: impl Into<String>, value: impl Into<Value>) -> StorageResult<()> {
        let (key, value) = (key.into(), value.into());
        self.update(move |r| {
            r.variables.insert(key, value);
        })
        .await
    }

    /// Removes `key`.
    pub async fn remove(&self, key: &str) -> StorageResult<()> {
        self.update(|r| {
            r.variables.remove(key);
        })
        .await
    }

    // ─── History ──────────────────────────────────────────────────────────────

    /// Returns the message history, oldest first.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.record.lock().history.clone()
    }

    /// Returns the newest history entry.
    pub fn last_message(&self) -> Option<HistoryEntry> {
        self.record.lock().history.last().cloned()
    }

    /// Appends a message, keeping at most
    /// [`HISTORY_LIMIT`](parley_core::HISTORY_LIMIT) entries.
    pub async fn add_message(&self, role: Role, text: impl Into<String>) -> StorageResult<()> {
        let entry = HistoryEntry::now(role, text);
        self.update(move |r| r.push_history(entry)).await
    }

    // ─── Whole record ─────────────────────────────────────────────────────────

    /// Returns a snapshot of the whole record.
    pub fn record(&self) -> ConversationRecord {
        self.record.lock().clone()
    }

    /// Drops all state, variables and history, and clears the stored record.
    pub async fn clear(&self) -> StorageResult<()> {
        let _write = self.writes.lock().await;
        *self.record.lock() = ConversationRecord::default();
        self.storage.clear_conversation(&self.sender_id).await
    }

    /// Applies `f` and persists the resulting snapshot, one update at a time.
    async fn update<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut ConversationRecord),
    {
        let _write = self.writes.lock().await;
        let snapshot = {
            let mut record = self.record.lock();
            f(&mut record);
            record.clone()
        };
        self.storage
            .set_conversation(&self.sender_id, &snapshot)
            .await
    }
}

impl std::fmt::Debug for Conversation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("sender_id", &self.sender_id)
            .field("record", &*self.record.lock())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use parley_core::{HISTORY_LIMIT, MemoryStore, Storage};

    use super::*;

    async fn load(store: &Arc<MemoryStore>) -> Conversation {
        Conversation::load(store.clone(), "user123").await.unwrap()
    }

    #[tokio::test]
    async fn test_state_round_trip() {
        let store = Arc::new(MemoryStore::new());
        let conversation = load(&store).await;
        assert_eq!(conversation.state(), None);

        conversation.set_state("ordering").await.unwrap();
        assert!(conversation.is_in_state("ordering"));
        assert!(!conversation.is_in_state("idle"));

        let reloaded = load(&store).await;
        assert_eq!(reloaded.state().as_deref(), Some("ordering"));

        reloaded.reset_state().await.unwrap();
        assert_eq!(load(&store).await.state(), None);
    }

    #[tokio::test]
    async fn test_variables_are_written_through() {
        let store = Arc::new(MemoryStore::new());
        let conversation = load(&store).await;

        conversation.set("name", "Maria").await.unwrap();
        conversation.set("visits", 3).await.unwrap();
        assert!(conversation.has("name"));
        assert_eq!(conversation.get_str("name").as_deref(), Some("Maria"));
        assert_eq!(conversation.get_or("missing", "n/a"), Value::from("n/a"));

        let stored = store.get_conversation("user123").await.unwrap();
        assert_eq!(stored.variables["visits"], 3);

        conversation.remove("name").await.unwrap();
        assert!(!conversation.has("name"));
        assert!(!load(&store).await.has("name"));
    }

    #[tokio::test]
    async fn test_null_variable_is_not_present() {
        let store = Arc::new(MemoryStore::new());
        let conversation = load(&store).await;
        conversation.set("empty", Value::Null).await.unwrap();
        assert!(!conversation.has("empty"));
    }

    #[tokio::test]
    async fn test_history_cap() {
        let store = Arc::new(MemoryStore::new());
        let conversation = load(&store).await;

        for i in 1..=55 {
            conversation
                .add_message(Role::User, format!("m{i}"))
                .await
                .unwrap();
        }

        let history = conversation.history();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].text, "m6");
        assert_eq!(history[HISTORY_LIMIT - 1].text, "m55");
        assert_eq!(conversation.last_message().unwrap().text, "m55");
        assert_eq!(load(&store).await.history().len(), HISTORY_LIMIT);
    }

    /// Delays writes of single-variable records so they land late.
    struct SlowFirstWrite(MemoryStore);

    #[async_trait]
    impl Storage for SlowFirstWrite {
        async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
            self.0.get(key).await
        }

        async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
            self.0.set(key, value).await
        }

        async fn delete(&self, key: &str) -> StorageResult<()> {
            self.0.delete(key).await
        }

        async fn clear(&self) -> StorageResult<()> {
            self.0.clear().await
        }

        async fn get_conversation(&self, sender_id: &str) -> StorageResult<ConversationRecord> {
            self.0.get_conversation(sender_id).await
        }

        async fn set_conversation(
            &self,
            sender_id: &str,
            record: &ConversationRecord,
        ) -> StorageResult<()> {
            if record.variables.len() == 1 {
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            self.0.set_conversation(sender_id, record).await
        }

        async fn clear_conversation(&self, sender_id: &str) -> StorageResult<()> {
            self.0.clear_conversation(sender_id).await
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_mutators_persist_newest_record() {
        let store = Arc::new(SlowFirstWrite(MemoryStore::new()));
        let conversation = Conversation::load(store.clone(), "user123").await.unwrap();

        let (a, b) = tokio::join!(conversation.set("a", 1), conversation.set("b", 2));
        a.unwrap();
        b.unwrap();

        let stored = store.get_conversation("user123").await.unwrap();
        assert_eq!(stored.variables.len(), 2);
        assert_eq!(stored, conversation.record());
    }

    #[tokio::test]
    async fn test_clear_removes_stored_record() {
        let store = Arc::new(MemoryStore::new());
        let conversation = load(&store).await;
        conversation.set("k", 1).await.unwrap();
        conversation.add_message(Role::Bot, "hi").await.unwrap();

        conversation.clear().await.unwrap();
        assert!(conversation.record().is_empty());
        assert!(store.all_conversations().is_empty());
    }
}
