use std::{env, sync::LazyLock};

use super::errors::StorageError;
use super::types::{FileStore, InMemoryStore, KeyValueStore, RedisStore};

pub(crate) static CREDENTIAL_STORE_TYPE: LazyLock<String> = LazyLock::new(|| {
    env::var("CREDENTIAL_STORE_TYPE")
        .ok()
        .unwrap_or("file".to_string())
});

pub(crate) static CREDENTIAL_STORE_PATH: LazyLock<String> = LazyLock::new(|| {
    env::var("CREDENTIAL_STORE_PATH")
        .ok()
        .unwrap_or(".medicai/credentials.json".to_string())
});

pub(crate) static CREDENTIAL_STORE_URL: LazyLock<String> = LazyLock::new(|| {
    env::var("CREDENTIAL_STORE_URL")
        .ok()
        .unwrap_or("redis://127.0.0.1:6379".to_string())
});

/// Build the backend named by `store_type`, verifying it is reachable.
pub(crate) async fn open_store(
    store_type: &str,
    location: &str,
) -> Result<Box<dyn KeyValueStore>, StorageError> {
    tracing::info!("Initializing credential store with type: {}", store_type);

    let store: Box<dyn KeyValueStore> = match store_type {
        "memory" => Box::new(InMemoryStore::new()),
        "file" => Box::new(FileStore::new(location)),
        "redis" => Box::new(RedisStore {
            client: redis::Client::open(location)?,
        }),
        t => return Err(StorageError::UnsupportedStore(t.to_string())),
    };

    if let Err(e) = store.init().await {
        tracing::error!("Failed to initialize {} credential store: {}", store_type, e);
        return Err(e);
    }

    Ok(store)
}

pub(crate) async fn open_store_from_env() -> Result<Box<dyn KeyValueStore>, StorageError> {
    let store_type = CREDENTIAL_STORE_TYPE.as_str();
    let location = match store_type {
        "redis" => CREDENTIAL_STORE_URL.as_str(),
        _ => CREDENTIAL_STORE_PATH.as_str(),
    };
    open_store(store_type, location).await
}
