//! Storage backends selected by configuration.

mod file;

use std::sync::Arc;

use tracing::{debug, info};

use parley_core::{BoxedStorage, MemoryStore};

use crate::config::{StorageBackend, StorageConfig};
use crate::error::RuntimeResult;

pub use file::FileStore;

/// Opens the backend named by `config`.
///
/// For the file backend, idle conversations are swept once here when
/// `cleanup_after_days` is set.
pub async fn open_storage(config: &StorageConfig) -> RuntimeResult<BoxedStorage> {
    match config.backend {
        StorageBackend::Memory => {
            debug!("Using in-memory storage");
            Ok(Arc::new(MemoryStore::new()))
        }
        StorageBackend::File => {
            let store = FileStore::open(&config.path).await?;
            if let Some(max_age) = config.cleanup_after() {
                store.cleanup(max_age).await?;
            }
            info!(path = %store.path().display(), "Using file storage");
            Ok(Arc::new(store))
        }
    }
}
