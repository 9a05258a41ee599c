use async_trait::async_trait;
use redis::{self, AsyncCommands};

use crate::storage::errors::StorageError;

use super::types::{KeyValueStore, RedisStore};

const STORE_PREFIX: &str = "medicai";

impl RedisStore {
    fn make_key(key: &str) -> String {
        format!("{STORE_PREFIX}:{key}")
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn init(&self) -> Result<(), StorageError> {
        // Verify the connection works
        let _conn = self.client.get_multiplexed_async_connection().await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        let value: Option<String> = conn.get(Self::make_key(key)).await?;
        Ok(value)
    }

    async fn apply(&mut self, changes: &[(&str, Option<&str>)]) -> Result<(), StorageError> {
        let mut conn = self.client.get_multiplexed_async_connection().await?;

        // MULTI/EXEC so a clear never leaves one of the keys behind
        let mut pipe = redis::pipe();
        pipe.atomic();
        for (key, value) in changes {
            match value {
                Some(v) => pipe.set(Self::make_key(key), *v).ignore(),
                None => pipe.del(Self::make_key(key)).ignore(),
            };
        }
        let _: () = pipe.query_async(&mut conn).await?;
        Ok(())
    }
}
