//! JSON-file storage backend.
//!
//! A [`FileStore`] owns one directory holding two documents:
//!
//! - `data.json`: the flat key-value surface
//! - `conversations.json`: conversation records keyed by sender id
//!
//! Both are read once when the store opens and rewritten in full, pretty
//! printed, after every mutation. In-memory state only changes once the
//! write has succeeded. A file that is missing is created empty; a
//! file that cannot be parsed is treated as empty and overwritten on the
//! next write.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::fs;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use parley_core::{ConversationRecord, Storage, StorageResult};

const DATA_FILE: &str = "data.json";
const CONVERSATIONS_FILE: &str = "conversations.json";

#[derive(Debug, Default)]
struct Documents {
    data: BTreeMap<String, Value>,
    conversations: BTreeMap<String, ConversationRecord>,
}

/// Storage persisted as JSON files in a directory.
///
/// Writes are serialized by an async mutex, so one store instance may be
/// shared freely. Two stores (or processes) on the same directory overwrite
/// each other.
#[derive(Debug)]
pub struct FileStore {
    root: PathBuf,
    documents: Mutex<Documents>,
}

impl FileStore {
    /// Opens (creating if needed) the store rooted at `root`.
    pub async fn open(root: impl Into<PathBuf>) -> StorageResult<Self> {
        let root = root.into();
        fs::create_dir_all(&root).await?;

        let data = load_document(&root.join(DATA_FILE)).await?;
        let conversations = load_document(&root.join(CONVERSATIONS_FILE)).await?;
        debug!(
            path = %root.display(),
            conversations = conversations.len(),
            "Opened file storage"
        );

        Ok(Self {
            root,
            documents: Mutex::new(Documents {
                data,
                conversations,
            }),
        })
    }

    /// Returns the storage directory.
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Removes conversations whose newest history entry is older than
    /// `max_age`, returning how many were removed.
    ///
    /// Conversations without any timestamped history are kept.
    pub async fn cleanup(&self, max_age: Duration) -> StorageResult<usize> {
        let max_age = i64::try_from(max_age.as_secs()).unwrap_or(i64::MAX);
        let cutoff = chrono::Utc::now().timestamp().saturating_sub(max_age);

        let mut removed = 0;
        self.update_conversations(|conversations| {
            let before = conversations.len();
            conversations
                .retain(|_, record| record.last_activity().is_none_or(|last| last >= cutoff));
            removed = before - conversations.len();
            removed > 0
        })
        .await?;

        if removed > 0 {
            info!(removed, "Removed idle conversations");
        }
        Ok(removed)
    }

    /// Applies `f` to a copy of the key-value document, writes it, then
    /// commits it. A failed write leaves the store unchanged.
    async fn update_data<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, Value>),
    {
        let mut docs = self.documents.lock().await;
        let mut data = docs.data.clone();
        f(&mut data);
        self.write(DATA_FILE, &data).await?;
        docs.data = data;
        Ok(())
    }

    /// Like [`update_data`](Self::update_data); `f` returns whether anything
    /// changed and a no-op skips the write.
    async fn update_conversations<F>(&self, f: F) -> StorageResult<()>
    where
        F: FnOnce(&mut BTreeMap<String, ConversationRecord>) -> bool,
    {
        let mut docs = self.documents.lock().await;
        let mut conversations = docs.conversations.clone();
        if !f(&mut conversations) {
            return Ok(());
        }
        self.write(CONVERSATIONS_FILE, &conversations).await?;
        docs.conversations = conversations;
        Ok(())
    }

    async fn write<T: Serialize>(&self, file: &str, document: &T) -> StorageResult<()> {
        let json = serde_json::to_vec_pretty(document)?;
        fs::write(self.root.join(file), json).await?;
        Ok(())
    }
}

/// Reads one document, creating it when missing.
async fn load_document<T>(path: &Path) -> StorageResult<BTreeMap<String, T>>
where
    T: DeserializeOwned,
{
    let contents = match fs::read(path).await {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            fs::write(path, b"{}").await?;
            return Ok(BTreeMap::new());
        }
        Err(e) => return Err(e.into()),
    };

    match serde_json::from_slice(&contents) {
        Ok(document) => Ok(document),
        Err(e) => {
            warn!(path = %path.display(), "Ignoring unreadable storage file: {e}");
            Ok(BTreeMap::new())
        }
    }
}

#[async_trait]
impl Storage for FileStore {
    async fn get(&self, key: &str) -> StorageResult<Option<Value>> {
        Ok(self.documents.lock().await.data.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Value) -> StorageResult<()> {
        self.update_data(|data| {
            data.insert(key.to_string(), value);
        })
        .await
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.update_data(|data| {
            data.remove(key);
        })
        .await
    }

    async fn clear(&self) -> StorageResult<()> {
        self.update_data(BTreeMap::clear).await
    }

    async fn get_conversation(&self, sender_id: &str) -> StorageResult<ConversationRecord> {
        Ok(self
            .documents
            .lock()
            .await
            .conversations
            .get(sender_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn set_conversation(
        &self,
        sender_id: &str,
        record: &ConversationRecord,
    ) -> StorageResult<()> {
        self.update_conversations(|conversations| {
            conversations.insert(sender_id.to_string(), record.clone());
            true
        })
        .await
    }

    async fn clear_conversation(&self, sender_id: &str) -> StorageResult<()> {
        self.update_conversations(|conversations| {
            conversations.remove(sender_id);
            true
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use parley_core::{HistoryEntry, Role};
    use serde_json::json;

    use super::*;

    fn record_with(state: &str, timestamp: i64) -> ConversationRecord {
        let mut record = ConversationRecord {
            state: Some(state.into()),
            ..Default::default()
        };
        record.variables.insert("name".into(), json!("Maria"));
        record.push_history(HistoryEntry {
            role: Role::User,
            text: "hello".into(),
            timestamp,
        });
        record
    }

    #[tokio::test]
    async fn test_open_creates_empty_files() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("nested/store");
        let store = FileStore::open(&root).await.unwrap();

        assert_eq!(store.path(), root);
        assert_eq!(std::fs::read_to_string(root.join(DATA_FILE)).unwrap(), "{}");
        assert_eq!(
            std::fs::read_to_string(root.join(CONVERSATIONS_FILE)).unwrap(),
            "{}"
        );
    }

    #[tokio::test]
    async fn test_conversations_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let record = record_with("ordering", 1_700_000_000);

        let store = FileStore::open(dir.path()).await.unwrap();
        store.set_conversation("u1", &record).await.unwrap();
        store.set("greeting", json!("hi")).await.unwrap();
        drop(store);

        let store = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(store.get_conversation("u1").await.unwrap(), record);
        assert_eq!(store.get("greeting").await.unwrap(), Some(json!("hi")));
        assert!(store.has("greeting").await.unwrap());
    }

    #[tokio::test]
    async fn test_persisted_layout() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store
            .set_conversation("u1", &record_with("asking", 42))
            .await
            .unwrap();

        let raw = std::fs::read_to_string(dir.path().join(CONVERSATIONS_FILE)).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(
            value,
            json!({
                "u1": {
                    "state": "asking",
                    "variables": { "name": "Maria" },
                    "history": [{ "type": "user", "message": "hello", "timestamp": 42 }]
                }
            })
        );
        assert!(raw.contains('\n'), "documents are pretty printed");
    }

    #[tokio::test]
    async fn test_corrupt_file_is_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONVERSATIONS_FILE), "{ broken").unwrap();

        let store = FileStore::open(dir.path()).await.unwrap();
        assert!(store.get_conversation("u1").await.unwrap().is_empty());

        store
            .set_conversation("u1", &record_with("ok", 1))
            .await
            .unwrap();
        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert_eq!(
            reopened.get_conversation("u1").await.unwrap().state.as_deref(),
            Some("ok")
        );
    }

    #[tokio::test]
    async fn test_failed_write_leaves_store_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set_conversation("u1", &record_with("first", 1)).await.unwrap();

        // A directory in place of the document makes every write fail.
        let path = dir.path().join(CONVERSATIONS_FILE);
        std::fs::remove_file(&path).unwrap();
        std::fs::create_dir(&path).unwrap();

        assert!(store.set_conversation("u1", &record_with("second", 2)).await.is_err());
        assert!(store.set_conversation("u2", &record_with("other", 2)).await.is_err());
        assert_eq!(
            store.get_conversation("u1").await.unwrap().state.as_deref(),
            Some("first")
        );
        assert!(store.get_conversation("u2").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_clear_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        store.set("a", json!(1)).await.unwrap();
        store.set("b", json!(2)).await.unwrap();
        store.delete("a").await.unwrap();
        assert_eq!(store.get("a").await.unwrap(), None);

        store.set_conversation("u1", &record_with("s", 1)).await.unwrap();
        store.clear().await.unwrap();
        assert_eq!(store.get("b").await.unwrap(), None);
        assert!(!store.get_conversation("u1").await.unwrap().is_empty());

        store.clear_conversation("u1").await.unwrap();
        assert!(store.get_conversation("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_removes_idle_conversations() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::open(dir.path()).await.unwrap();
        let now = chrono::Utc::now().timestamp();

        store.set_conversation("old", &record_with("s", now - 40 * 86_400)).await.unwrap();
        store.set_conversation("fresh", &record_with("s", now - 60)).await.unwrap();
        store
            .set_conversation("silent", &ConversationRecord::default())
            .await
            .unwrap();

        let removed = store.cleanup(Duration::from_secs(30 * 86_400)).await.unwrap();
        assert_eq!(removed, 1);
        assert!(store.get_conversation("old").await.unwrap().is_empty());
        assert!(!store.get_conversation("fresh").await.unwrap().is_empty());

        let reopened = FileStore::open(dir.path()).await.unwrap();
        assert!(reopened.get_conversation("old").await.unwrap().is_empty());
    }
}
