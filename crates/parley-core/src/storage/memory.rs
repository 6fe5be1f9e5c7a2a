use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;

use super::Storage;
use crate::error::StorageResult;
use crate::record::ConversationRecord;

/// Process-local storage backed by two hash maps.
///
/// Nothing survives a restart. Useful for tests and single-process bots.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<HashMap<String, Value>>,
    conversations: RwLock<HashMap<String, ConversationRecord>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of every key-value entry.
    pub fn all_data(&self) -> HashMap<String, Value> {
        self.data.read().clone()
    }

    /// Returns a copy of every conversation record.
    pub fn all_conversations(&self) -> HashMap<String, ConversationRecord> {
        self.conversations.read().clone()
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.data.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.data.write().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.data.write().remove(key);
        Ok(())
    }

    async fn clear(&self) -> StorageResult<()> {
        self.data.write().clear();
        Ok(())
    }

    async fn get_conversation(&self, sender_id: &str) -> StorageResult<ConversationRecord> {
        Ok(self
            .conversations
            .read()
            .get(sender_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_conversation(
        &self,
        sender_id: &str,
        record: &ConversationRecord,
    ) -> StorageResult<()> {
        self.conversations
            .write()
            .insert(sender_id.to_string(), record.clone());
        Ok(())
    }

    async fn clear_conversation(&self, sender_id: &str) -> StorageResult<()> {
        self.conversations.write().remove(sender_id);
        Ok(())
    }
}
