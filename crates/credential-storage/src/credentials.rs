//! High-level API for the persisted session.

use crate::{SecureStorage, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Durable session layout, shared with the web client's local storage format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSession {
    pub access_token: String,
    pub refresh_token: String,
    /// Identity exactly as the API returned it.
    #[serde(default)]
    pub user: serde_json::Value,
}

/// Reads and writes the persisted session through a storage backend.
pub struct CredentialStore {
    storage: Box<dyn SecureStorage>,
}

impl CredentialStore {
    pub fn new(storage: Box<dyn SecureStorage>) -> Self {
        Self { storage }
    }

    /// Load the persisted session.
    ///
    /// A record that no longer parses is deleted and reported as absent, so a
    /// corrupt file cannot wedge every later start.
    pub fn load_session(&self) -> StorageResult<Option<PersistedSession>> {
        let Some(raw) = self.storage.get(StorageKeys::SESSION)? else {
            return Ok(None);
        };

        match serde_json::from_str::<PersistedSession>(&raw) {
            Ok(session) if !session.access_token.is_empty() => Ok(Some(session)),
            Ok(_) => {
                warn!("Persisted session has no access token, discarding");
                self.storage.delete(StorageKeys::SESSION)?;
                Ok(None)
            }
            Err(err) => {
                warn!(error = %err, "Persisted session is unreadable, discarding");
                self.storage.delete(StorageKeys::SESSION)?;
                Ok(None)
            }
        }
    }

    pub fn save_session(&self, session: &PersistedSession) -> StorageResult<()> {
        let raw = serde_json::to_string(session)?;
        self.storage.set(StorageKeys::SESSION, &raw)?;
        debug!("Persisted session saved");
        Ok(())
    }

    /// Remove the persisted session. Returns whether one existed.
    pub fn clear_session(&self) -> StorageResult<bool> {
        let removed = self.storage.delete(StorageKeys::SESSION)?;
        if removed {
            debug!("Persisted session cleared");
        }
        Ok(removed)
    }

    pub fn has_session(&self) -> StorageResult<bool> {
        self.storage.has(StorageKeys::SESSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;

    fn store() -> CredentialStore {
        CredentialStore::new(Box::new(MemoryStorage::new()))
    }

    fn sample() -> PersistedSession {
        PersistedSession {
            access_token: "access-1".to_string(),
            refresh_token: "refresh-1".to_string(),
            user: serde_json::json!({ "_id": "u1", "email": "hr@example.com" }),
        }
    }

    #[test]
    fn test_save_load_clear() {
        let store = store();
        assert!(store.load_session().unwrap().is_none());

        store.save_session(&sample()).unwrap();
        assert!(store.has_session().unwrap());
        assert_eq!(store.load_session().unwrap(), Some(sample()));

        assert!(store.clear_session().unwrap());
        assert!(!store.clear_session().unwrap());
        assert!(store.load_session().unwrap().is_none());
    }

    #[test]
    fn test_layout_uses_camel_case_keys() {
        let json = serde_json::to_value(sample()).unwrap();
        assert_eq!(json["accessToken"], "access-1");
        assert_eq!(json["refreshToken"], "refresh-1");
        assert_eq!(json["user"]["_id"], "u1");
    }

    #[test]
    fn test_corrupt_record_is_discarded() {
        let storage = MemoryStorage::new();
        storage.set(StorageKeys::SESSION, "{ nope").unwrap();
        let store = CredentialStore::new(Box::new(storage));

        assert!(store.load_session().unwrap().is_none());
        assert!(!store.has_session().unwrap());
    }

    #[test]
    fn test_record_without_access_token_is_discarded() {
        let storage = MemoryStorage::new();
        storage
            .set(
                StorageKeys::SESSION,
                r#"{"accessToken":"","refreshToken":"r","user":null}"#,
            )
            .unwrap();
        let store = CredentialStore::new(Box::new(storage));

        assert!(store.load_session().unwrap().is_none());
    }
}
