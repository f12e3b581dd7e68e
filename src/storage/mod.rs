//! Persistent key-value storage for the token record
//!
//! The token manager only ever talks to a [`KeyValueStore`]; which backend
//! sits behind it is decided by the caller.

mod file;
mod memory;

use std::sync::Arc;

use async_trait::async_trait;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Storage failure. Cheap to clone so it can travel inside a shared refresh outcome.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StoreError {
    #[error("invalid storage key {0:?}")]
    InvalidKey(String),
    #[error("storage I/O failed for key {key:?}")]
    Io {
        key: String,
        #[source]
        source: Arc<std::io::Error>,
    },
    #[error("stored value for key {key:?} is not a valid record")]
    Corrupt {
        key: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
    #[error("failed to serialize record for key {key:?}")]
    Serialize {
        key: String,
        #[source]
        source: Arc<serde_json::Error>,
    },
}

/// Async string key-value store.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError>;
    async fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
    /// Removing a key that does not exist succeeds.
    async fn remove(&self, key: &str) -> Result<(), StoreError>;
}
