//! Wiring of store, coordinator, invalidator and dispatcher, plus the
//! session entry points that sit around them: login, logout, restore and
//! persistence.

use crate::dispatcher::RequestDispatcher;
use crate::error::{AuthError, AuthResult, DispatchResult};
use crate::invalidator::SessionInvalidator;
use crate::lifecycle::SessionPhase;
use crate::refresh::RefreshCoordinator;
use crate::session_store::{EndReason, SessionEvent, SessionSource, SessionState, SessionStore};
use crate::transport::ApiTransport;
use crate::wire::{
    parse_token_grant, ApiRequest, ApiResponse, Credentials, Identity, LOGIN_PATH, LOGOUT_PATH,
};
use credential_storage::CredentialStore;
use serde::Serialize;
use serde_json::json;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Default bound on a renewal call.
pub const DEFAULT_REFRESH_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub refresh_timeout: Duration,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            refresh_timeout: DEFAULT_REFRESH_TIMEOUT,
        }
    }
}

/// Point-in-time view of the session for status output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthSnapshot {
    pub phase: SessionPhase,
    pub authenticated: bool,
    pub epoch: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

/// Cheap-to-clone handle on one client's session machinery.
#[derive(Clone)]
pub struct AuthPipeline {
    store: Arc<SessionStore>,
    transport: Arc<dyn ApiTransport>,
    credentials: Arc<CredentialStore>,
    coordinator: Arc<RefreshCoordinator>,
    invalidator: Arc<SessionInvalidator>,
    dispatcher: Arc<RequestDispatcher>,
}

impl AuthPipeline {
    pub fn new(
        transport: Arc<dyn ApiTransport>,
        credentials: Arc<CredentialStore>,
        options: PipelineOptions,
    ) -> Self {
        let store = Arc::new(SessionStore::new());
        let coordinator = Arc::new(RefreshCoordinator::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            options.refresh_timeout,
        ));
        let invalidator = Arc::new(SessionInvalidator::new(
            Arc::clone(&store),
            Some(Arc::clone(&credentials)),
        ));
        let dispatcher = Arc::new(RequestDispatcher::new(
            Arc::clone(&store),
            Arc::clone(&transport),
            Arc::clone(&coordinator),
            Arc::clone(&invalidator),
        ));

        Self {
            store,
            transport,
            credentials,
            coordinator,
            invalidator,
            dispatcher,
        }
    }

    pub fn store(&self) -> &Arc<SessionStore> {
        &self.store
    }

    pub fn coordinator(&self) -> &Arc<RefreshCoordinator> {
        &self.coordinator
    }

    pub fn invalidator(&self) -> &Arc<SessionInvalidator> {
        &self.invalidator
    }

    pub fn dispatcher(&self) -> &Arc<RequestDispatcher> {
        &self.dispatcher
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.store.subscribe()
    }

    /// Seed the store from the persisted session. Call once at start.
    pub fn restore(&self) -> AuthResult<Option<SessionState>> {
        let Some(persisted) = self.credentials.load_session()? else {
            debug!("No persisted session");
            return Ok(None);
        };

        let identity = Identity::from_value(&persisted.user).unwrap_or_default();
        let session = self.store.replace(
            Credentials {
                access_token: persisted.access_token,
                refresh_token: persisted.refresh_token,
                identity,
            },
            SessionSource::Restored,
        );
        Ok(Some(session))
    }

    /// Keep the persisted session in step with the store.
    ///
    /// The task ends once every handle on this pipeline has been dropped.
    pub fn spawn_persistence(&self) -> JoinHandle<()> {
        let mut events = self.store.subscribe();
        let store = Arc::downgrade(&self.store);
        let credentials = Arc::clone(&self.credentials);

        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(SessionEvent::Established { session, source }) => {
                        if source != SessionSource::Restored {
                            persist(&credentials, Some(&session));
                        }
                    }
                    Ok(SessionEvent::Cleared { .. }) => persist(&credentials, None),
                    Ok(_) => {}
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Persistence fell behind, resyncing");
                        if !resync(&store, &credentials) {
                            break;
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
            debug!("Session persistence stopped");
        })
    }

    /// Sign in with email and password.
    pub async fn login(&self, email: &str, password: &str) -> AuthResult<SessionState> {
        let request = ApiRequest::post(
            LOGIN_PATH,
            json!({ "email": email, "password": password }),
        );
        let response = self.transport.send(&request, None).await?;

        if !response.is_success() {
            let message = response.message().unwrap_or("login rejected").to_string();
            return Err(match response.status {
                400 | 401 | 403 => AuthError::InvalidCredentials(message),
                status => AuthError::UnexpectedResponse(format!(
                    "login failed with status {}: {}",
                    status, message
                )),
            });
        }

        let grant = parse_token_grant(&response.body).ok_or_else(|| {
            AuthError::UnexpectedResponse("login response has no access token".to_string())
        })?;
        let refresh_token = grant.refresh_token.ok_or_else(|| {
            AuthError::UnexpectedResponse("login response has no refresh token".to_string())
        })?;

        let session = self.store.replace(
            Credentials {
                access_token: grant.access_token,
                refresh_token,
                identity: grant.user.unwrap_or_default(),
            },
            SessionSource::Login,
        );
        info!(user_id = %session.identity.id, "Logged in");
        Ok(session)
    }

    /// Sign out. The server call is best effort; the local session is always
    /// torn down. Returns false if there was no session.
    pub async fn logout(&self) -> AuthResult<bool> {
        let Some(session) = self.store.read() else {
            return Ok(false);
        };

        let request = ApiRequest::post(
            LOGOUT_PATH,
            json!({ "refreshToken": session.refresh_token }),
        );
        match self.transport.send(&request, Some(&session.access_token)).await {
            Ok(response) if response.is_success() => debug!("Server session revoked"),
            Ok(response) => debug!(status = response.status, "Server logout not acknowledged"),
            Err(err) => warn!(error = %err, "Server logout failed"),
        }

        Ok(self.invalidator.invalidate(EndReason::Logout))
    }

    /// Perform an authenticated call. See [`RequestDispatcher::perform`].
    pub async fn perform(&self, request: &ApiRequest) -> DispatchResult<ApiResponse> {
        self.dispatcher.perform(request).await
    }

    pub fn status(&self) -> AuthSnapshot {
        let session = self.store.read();
        let identity = session.as_ref().map(|s| &s.identity);
        AuthSnapshot {
            phase: self.store.phase(),
            authenticated: session.is_some(),
            epoch: self.store.epoch(),
            user_id: identity.map(|i| i.id.clone()).filter(|id| !id.is_empty()),
            email: identity.and_then(|i| i.email.clone()),
            name: identity.and_then(|i| i.name.clone()),
            role: identity.and_then(|i| i.role.clone()),
        }
    }
}

fn persist(credentials: &CredentialStore, session: Option<&SessionState>) {
    let result = match session {
        Some(session) => credentials.save_session(&session.to_persisted()),
        None => credentials.clear_session().map(|_| ()),
    };
    if let Err(err) = result {
        warn!(error = %err, "Failed to persist session");
    }
}

/// Write whatever the store holds now. False once the store is gone.
fn resync(store: &Weak<SessionStore>, credentials: &CredentialStore) -> bool {
    let Some(store) = store.upgrade() else {
        return false;
    };
    persist(credentials, store.read().as_ref());
    true
}
