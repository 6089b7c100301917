//! Terminal teardown of the session.

use crate::session_store::{EndReason, SessionEvent, SessionStore};
use credential_storage::CredentialStore;
use std::sync::Arc;
use tracing::{info, warn};

/// Clears the in-memory session and its persisted copy, then announces that
/// the session ended. Idempotent.
pub struct SessionInvalidator {
    store: Arc<SessionStore>,
    credentials: Option<Arc<CredentialStore>>,
}

impl SessionInvalidator {
    /// `credentials` is the persisted copy to remove; `None` for sessions
    /// that are never written to disk.
    pub fn new(store: Arc<SessionStore>, credentials: Option<Arc<CredentialStore>>) -> Self {
        Self { store, credentials }
    }

    /// Tear down whatever session is current. Returns false if there was none.
    pub fn invalidate(&self, reason: EndReason) -> bool {
        match self.store.clear() {
            Some(removed) => {
                self.finish(removed.epoch, reason);
                true
            }
            None => false,
        }
    }

    /// Tear down only if the current session is `epoch` or older, so a failure
    /// observed with old credentials cannot end a newer sign-in.
    pub fn invalidate_at(&self, epoch: u64, reason: EndReason) -> bool {
        match self.store.clear_if_at_most(epoch) {
            Some(removed) => {
                self.finish(removed.epoch, reason);
                true
            }
            None => false,
        }
    }

    fn finish(&self, epoch: u64, reason: EndReason) {
        if let Some(credentials) = &self.credentials {
            if let Err(err) = credentials.clear_session() {
                warn!(error = %err, "Failed to remove persisted session");
            }
        }
        info!(epoch, %reason, "Session ended");
        self.store.publish(SessionEvent::Ended { reason });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session_store::SessionSource;
    use crate::wire::{Credentials, Identity};
    use credential_storage::{MemoryStorage, PersistedSession};

    fn creds() -> Credentials {
        Credentials {
            access_token: "a".to_string(),
            refresh_token: "r".to_string(),
            identity: Identity::default(),
        }
    }

    fn persisted() -> Arc<CredentialStore> {
        let credentials = Arc::new(CredentialStore::new(Box::new(MemoryStorage::new())));
        credentials
            .save_session(&PersistedSession {
                access_token: "a".to_string(),
                refresh_token: "r".to_string(),
                user: serde_json::Value::Null,
            })
            .unwrap();
        credentials
    }

    #[tokio::test]
    async fn test_invalidate_clears_both_copies_and_announces() {
        let store = Arc::new(SessionStore::new());
        let credentials = persisted();
        let invalidator = SessionInvalidator::new(store.clone(), Some(credentials.clone()));
        store.replace(creds(), SessionSource::Login);
        let mut rx = store.subscribe();

        assert!(invalidator.invalidate(EndReason::Logout));
        assert!(store.read().is_none());
        assert!(!credentials.has_session().unwrap());

        assert!(matches!(rx.recv().await.unwrap(), SessionEvent::Cleared { epoch: 1 }));
        assert!(matches!(
            rx.recv().await.unwrap(),
            SessionEvent::Ended {
                reason: EndReason::Logout
            }
        ));
    }

    #[test]
    fn test_invalidate_is_idempotent() {
        let store = Arc::new(SessionStore::new());
        let invalidator = SessionInvalidator::new(store.clone(), None);
        store.replace(creds(), SessionSource::Login);
        let mut rx = store.subscribe();

        assert!(invalidator.invalidate(EndReason::RefreshFailed));
        assert!(!invalidator.invalidate(EndReason::RefreshFailed));

        let mut ended = 0;
        while let Ok(event) = rx.try_recv() {
            if matches!(event, SessionEvent::Ended { .. }) {
                ended += 1;
            }
        }
        assert_eq!(ended, 1);
    }

    #[test]
    fn test_invalidate_at_spares_newer_session() {
        let store = Arc::new(SessionStore::new());
        let invalidator = SessionInvalidator::new(store.clone(), None);
        store.replace(creds(), SessionSource::Login);
        store.replace(creds(), SessionSource::Login);

        assert!(!invalidator.invalidate_at(1, EndReason::RefreshFailed));
        assert_eq!(store.read().unwrap().epoch, 2);

        assert!(invalidator.invalidate_at(2, EndReason::RefreshFailed));
        assert!(store.read().is_none());
    }
}
