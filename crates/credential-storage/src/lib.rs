//! Persisted credential storage for the recruit-desk client.
//!
//! Backends:
//! - [`FileStorage`]: a JSON object on disk, replaced atomically, owner-only permissions
//! - [`MemoryStorage`]: process-local, for tests and ephemeral sessions
//!
//! [`CredentialStore`] sits on top and owns the persisted session layout.

mod credentials;
mod file;
mod keys;
mod memory;
mod traits;

pub use credentials::{CredentialStore, PersistedSession};
pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use traits::SecureStorage;

use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Backend-specific failure
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Encoding(err.to_string())
    }
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Create a CredentialStore backed by a file at `path`.
pub fn create_credential_store(path: impl Into<PathBuf>) -> CredentialStore {
    CredentialStore::new(Box::new(FileStorage::new(path)))
}
