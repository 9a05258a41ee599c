mod config;
mod credential_store;
mod errors;
mod file;
mod memory;
mod redis;
mod types;

pub use credential_store::{Credential, CredentialStore};
pub use errors::StorageError;
pub use types::KeyValueStore;
