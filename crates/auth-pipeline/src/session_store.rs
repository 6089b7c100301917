//! Versioned in-memory session.
//!
//! Every successful replacement bumps the epoch. The epoch survives a clear,
//! so a login after logout still gets a higher number than anything seen
//! before, and a caller holding an old epoch can always tell its credentials
//! were superseded.

use crate::lifecycle::{LifecycleTracker, SessionPhase};
use crate::wire::{Credentials, Identity};
use credential_storage::PersistedSession;
use serde::Serialize;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;
use tracing::{debug, info};

const EVENT_CAPACITY: usize = 64;

/// Snapshot of the current session. Always a copy, never a live reference.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionState {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
    pub epoch: u64,
}

impl SessionState {
    pub fn credentials(&self) -> Credentials {
        Credentials {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            identity: self.identity.clone(),
        }
    }

    /// Durable layout written by the persistence task.
    pub fn to_persisted(&self) -> PersistedSession {
        PersistedSession {
            access_token: self.access_token.clone(),
            refresh_token: self.refresh_token.clone(),
            user: serde_json::to_value(&self.identity).unwrap_or(serde_json::Value::Null),
        }
    }
}

impl std::fmt::Debug for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionState")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("identity", &self.identity)
            .field("epoch", &self.epoch)
            .finish()
    }
}

/// How a session came to be installed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionSource {
    Login,
    Refresh,
    Restored,
}

/// Why a session was torn down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// Renewal was rejected, timed out or could not be attempted.
    RefreshFailed,
    /// A retried call was told its renewed token had expired as well.
    RetryExhausted,
    /// The user signed out.
    Logout,
}

impl std::fmt::Display for EndReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EndReason::RefreshFailed => "refresh_failed",
            EndReason::RetryExhausted => "retry_exhausted",
            EndReason::Logout => "logout",
        };
        f.write_str(s)
    }
}

/// Notifications for persistence, UI and anything else that cares.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Established {
        session: SessionState,
        source: SessionSource,
    },
    RefreshStarted {
        epoch: u64,
    },
    RefreshFailed {
        epoch: u64,
        reason: String,
    },
    Cleared {
        epoch: u64,
    },
    /// The session was invalidated; the user has to sign in again.
    Ended {
        reason: EndReason,
    },
}

#[derive(Default)]
struct Inner {
    current: Option<SessionState>,
    last_epoch: u64,
}

/// Exclusive owner of the current [`SessionState`].
pub struct SessionStore {
    inner: RwLock<Inner>,
    events: broadcast::Sender<SessionEvent>,
    lifecycle: LifecycleTracker,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: RwLock::new(Inner::default()),
            events,
            lifecycle: LifecycleTracker::new(),
        }
    }

    fn read_inner(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_inner(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Current session, or `None` when signed out.
    pub fn read(&self) -> Option<SessionState> {
        self.read_inner().current.clone()
    }

    /// Highest epoch ever installed. Equals the current session's epoch while
    /// one exists.
    pub fn epoch(&self) -> u64 {
        self.read_inner().last_epoch
    }

    pub fn phase(&self) -> SessionPhase {
        self.lifecycle.phase()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Install `credentials` with the next epoch and return the stored value.
    pub fn replace(&self, credentials: Credentials, source: SessionSource) -> SessionState {
        let mut inner = self.write_inner();
        self.install(&mut inner, credentials, source)
    }

    /// Like [`replace`](Self::replace), but only if the current session is
    /// still at `expected`. Returns `None` if it moved on or was cleared.
    pub fn replace_if_epoch(
        &self,
        expected: u64,
        credentials: Credentials,
        source: SessionSource,
    ) -> Option<SessionState> {
        let mut inner = self.write_inner();
        match &inner.current {
            Some(current) if current.epoch == expected => {
                Some(self.install(&mut inner, credentials, source))
            }
            _ => None,
        }
    }

    /// Drop the current session. Returns what was removed.
    pub fn clear(&self) -> Option<SessionState> {
        let mut inner = self.write_inner();
        self.take(&mut inner)
    }

    /// Clear only if the current session's epoch is `epoch` or older.
    pub fn clear_if_at_most(&self, epoch: u64) -> Option<SessionState> {
        let mut inner = self.write_inner();
        match &inner.current {
            Some(current) if current.epoch <= epoch => self.take(&mut inner),
            _ => None,
        }
    }

    /// Publish a non-state event. Serialised with state changes so every
    /// subscriber sees one consistent order.
    pub(crate) fn publish(&self, event: SessionEvent) {
        let _inner = self.write_inner();
        self.emit(event);
    }

    fn install(
        &self,
        inner: &mut Inner,
        credentials: Credentials,
        source: SessionSource,
    ) -> SessionState {
        inner.last_epoch += 1;
        let session = SessionState {
            access_token: credentials.access_token,
            refresh_token: credentials.refresh_token,
            identity: credentials.identity,
            epoch: inner.last_epoch,
        };
        inner.current = Some(session.clone());

        info!(epoch = session.epoch, ?source, user_id = %session.identity.id, "Session established");
        self.emit(SessionEvent::Established {
            session: session.clone(),
            source,
        });
        session
    }

    fn take(&self, inner: &mut Inner) -> Option<SessionState> {
        let removed = inner.current.take()?;
        info!(epoch = removed.epoch, "Session cleared");
        self.emit(SessionEvent::Cleared {
            epoch: removed.epoch,
        });
        Some(removed)
    }

    fn emit(&self, event: SessionEvent) {
        self.lifecycle.observe(&event);
        if self.events.send(event).is_err() {
            debug!("No session event subscribers");
        }
    }
}
