use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;

use crate::storage::errors::StorageError;

pub(crate) struct InMemoryStore {
    pub(super) entry: HashMap<String, String>,
}

pub(crate) struct FileStore {
    pub(super) path: PathBuf,
}

pub(crate) struct RedisStore {
    pub(super) client: redis::Client,
}

/// Durable key-value backend underneath the credential store.
#[async_trait]
pub trait KeyValueStore: Send + Sync + 'static {
    /// Initialize the store. This is called when the store is created.
    async fn init(&self) -> Result<(), StorageError>;

    /// Get a value from the store.
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Apply every change as one unit: either all of them are visible afterwards
    /// or none are. A `None` value removes the key.
    async fn apply(&mut self, changes: &[(&str, Option<&str>)]) -> Result<(), StorageError>;
}
