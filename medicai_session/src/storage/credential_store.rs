use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;

use super::config::{open_store, open_store_from_env};
use super::errors::StorageError;
use super::types::{InMemoryStore, KeyValueStore};

const ACCESS_TOKEN_KEY: &str = "token";
const REFRESH_TOKEN_KEY: &str = "refreshToken";

/// Bearer credential issued by the identity backend.
///
/// Never mutated in place: a refresh produces a new `Credential` which replaces
/// the stored one wholesale.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
    access_token: String,
    refresh_token: Option<String>,
}

impl Credential {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token,
        }
    }

    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    pub fn refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref()
    }
}

// Tokens stay out of logs
impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("access_token", &"<redacted>")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "<redacted>"),
            )
            .finish()
    }
}

/// Durable holder of the current [`Credential`].
///
/// Cloning shares the same backend.
#[derive(Clone)]
pub struct CredentialStore {
    backend: Arc<Mutex<Box<dyn KeyValueStore>>>,
}

impl CredentialStore {
    pub fn new(backend: impl KeyValueStore) -> Self {
        Self {
            backend: Arc::new(Mutex::new(Box::new(backend))),
        }
    }

    /// Non-durable store, mainly for tests.
    pub fn in_memory() -> Self {
        Self::new(InMemoryStore::new())
    }

    /// Open the backend selected by `CREDENTIAL_STORE_TYPE`.
    pub async fn from_env() -> Result<Self, StorageError> {
        Ok(Self {
            backend: Arc::new(Mutex::new(open_store_from_env().await?)),
        })
    }

    /// Open a `memory`, `file` or `redis` backend at `location`.
    pub async fn open(store_type: &str, location: &str) -> Result<Self, StorageError> {
        Ok(Self {
            backend: Arc::new(Mutex::new(open_store(store_type, location).await?)),
        })
    }

    pub async fn save(&self, credential: &Credential) -> Result<(), StorageError> {
        self.backend
            .lock()
            .await
            .apply(&[
                (ACCESS_TOKEN_KEY, Some(credential.access_token())),
                (REFRESH_TOKEN_KEY, credential.refresh_token()),
            ])
            .await
    }

    pub async fn load(&self) -> Result<Option<Credential>, StorageError> {
        let backend = self.backend.lock().await;

        let Some(access_token) = backend.get(ACCESS_TOKEN_KEY).await? else {
            return Ok(None);
        };
        let refresh_token = backend.get(REFRESH_TOKEN_KEY).await?;

        Ok(Some(Credential {
            access_token,
            refresh_token,
        }))
    }

    /// Remove both entries in one change set.
    pub async fn clear(&self) -> Result<(), StorageError> {
        self.backend
            .lock()
            .await
            .apply(&[(ACCESS_TOKEN_KEY, None), (REFRESH_TOKEN_KEY, None)])
            .await
    }
}
