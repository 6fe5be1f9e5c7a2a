//! Storage trait and the in-memory backend.
//!
//! A storage backend persists two kinds of data:
//!
//! | Surface | Methods | Purpose |
//! |---------|---------|---------|
//! | Conversations | [`get_conversation`](Storage::get_conversation), [`set_conversation`](Storage::set_conversation), [`clear_conversation`](Storage::clear_conversation) | Per-sender [`ConversationRecord`] |
//! | Key-value | [`get`](Storage::get), [`set`](Storage::set), [`has`](Storage::has), [`delete`](Storage::delete), [`clear`](Storage::clear) | Non-conversational bot data |
//!
//! The core performs no locking around these calls. Two dispatches for the
//! same sender that run concurrently each load, mutate and write back the
//! whole record, so the later write wins.

mod memory;

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageResult;
use crate::record::ConversationRecord;

pub use memory::MemoryStore;

/// The persistence capability consumed by the dispatcher and conversations.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    /// Returns the value stored under `key`.
    async fn get(&self, key: &str) -> StorageResult<Option<Value>>;

    /// Stores `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> StorageResult<()>;

    /// Returns `true` if a non-null value is stored under `key`.
    async fn has(&self, key: &str) -> StorageResult<bool> {
        Ok(self.get(key).await?.is_some_and(|v| !v.is_null()))
    }

    /// Removes `key`.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Removes every key-value entry. Conversations are left untouched.
    async fn clear(&self) -> StorageResult<()>;

    /// Returns the record for `sender_id`, or an empty record if none exists.
    async fn get_conversation(&self, sender_id: &str) -> StorageResult<ConversationRecord>;

    /// Replaces the record for `sender_id`.
    async fn set_conversation(
        &self,
        sender_id: &str,
        record: &ConversationRecord,
    ) -> StorageResult<()>;

    /// Removes the record for `sender_id`.
    async fn clear_conversation(&self, sender_id: &str) -> StorageResult<()>;
}

/// A shared Storage trait object.
pub type BoxedStorage = Arc<dyn Storage>;
