use async_trait::async_trait;
use std::collections::HashMap;

use crate::storage::errors::StorageError;

use super::types::{InMemoryStore, KeyValueStore};

impl InMemoryStore {
    pub(crate) fn new() -> Self {
        tracing::info!("Creating new in-memory credential store");
        Self {
            entry: HashMap::new(),
        }
    }
}

#[async_trait]
impl KeyValueStore for InMemoryStore {
    async fn init(&self) -> Result<(), StorageError> {
        Ok(()) // Nothing to initialize for in-memory store
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entry.get(key).cloned())
    }

    async fn apply(&mut self, changes: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        for (key, value) in changes {
            match value {
                Some(v) => {
                    self.entry.insert(key.to_string(), v.to_string());
                }
                None => {
                    self.entry.remove(*key);
                }
            }
        }
        Ok(())
    }
}
