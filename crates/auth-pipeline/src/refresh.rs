//! Single-flight token renewal.
//!
//! The slot holds at most one [`RefreshOperation`]. Whoever finds it empty
//! creates the operation and spawns the renewal call; everyone else who asks
//! while it is pending subscribes to the same outcome channel. The slot lock
//! only covers that check-and-create decision and the final hand-off, never
//! the network call.
//!
//! The renewal runs in its own task, so a caller that gives up (its future is
//! dropped) just drops its receiver. The call itself and every other waiter
//! are unaffected.

use crate::error::{AuthError, AuthResult};
use crate::session_store::{SessionEvent, SessionSource, SessionState, SessionStore};
use crate::transport::ApiTransport;
use crate::wire::{parse_token_grant, ApiRequest, Credentials, TokenGrant, REFRESH_TOKEN_PATH};
use serde_json::json;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info, warn};

#[derive(Debug, Clone)]
enum RefreshOutcome {
    Renewed(SessionState),
    Failed(String),
}

type OutcomeSender = Arc<watch::Sender<Option<RefreshOutcome>>>;

/// The in-flight renewal. Waiters are the live receivers of `outcome`.
struct RefreshOperation {
    started_at_epoch: u64,
    outcome: OutcomeSender,
}

struct Shared {
    store: Arc<SessionStore>,
    transport: Arc<dyn ApiTransport>,
    timeout: Duration,
    slot: Mutex<Option<RefreshOperation>>,
    renewals_started: AtomicU64,
}

impl Shared {
    fn slot(&self) -> MutexGuard<'_, Option<RefreshOperation>> {
        self.slot.lock().unwrap_or_else(|p| p.into_inner())
    }
}

/// Guarantees at most one outstanding renewal call and fans its result out.
pub struct RefreshCoordinator {
    shared: Arc<Shared>,
}

impl RefreshCoordinator {
    /// `timeout` bounds the renewal call; expiry counts as a failed renewal.
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn ApiTransport>,
        timeout: Duration,
    ) -> Self {
        Self {
            shared: Arc::new(Shared {
                store,
                transport,
                timeout,
                slot: Mutex::new(None),
                renewals_started: AtomicU64::new(0),
            }),
        }
    }

    /// Obtain credentials newer than `observed_epoch`.
    ///
    /// Returns the current session straight away if it has already moved past
    /// `observed_epoch`. Otherwise joins the in-flight renewal, starting one if
    /// there is none. A failure leaves the session untouched; tearing it down
    /// is the caller's decision.
    pub async fn request_refresh(&self, observed_epoch: u64) -> AuthResult<SessionState> {
        loop {
            let (mut outcome, stale_operation) = {
                let mut slot = self.shared.slot();

                let Some(current) = self.shared.store.read() else {
                    return Err(AuthError::RefreshFailed("no session to refresh".to_string()));
                };
                if current.epoch > observed_epoch {
                    debug!(
                        observed_epoch,
                        current_epoch = current.epoch,
                        "Credentials already renewed, skipping refresh"
                    );
                    return Ok(current);
                }

                match slot.as_ref() {
                    Some(op) => {
                        let rx = op.outcome.subscribe();
                        debug!(
                            epoch = op.started_at_epoch,
                            waiters = op.outcome.receiver_count(),
                            "Joining in-flight refresh"
                        );
                        (rx, op.started_at_epoch < current.epoch)
                    }
                    None => (self.start(&mut *slot, current), false),
                }
            };

            let resolved = match outcome.wait_for(Option::is_some).await {
                Ok(value) => value.clone(),
                Err(_) => None,
            };

            // A renewal for an older session still occupied the slot. Its
            // result says nothing about ours; look again now it is gone.
            if stale_operation {
                continue;
            }

            return match resolved {
                Some(RefreshOutcome::Renewed(session)) => Ok(session),
                Some(RefreshOutcome::Failed(reason)) => Err(AuthError::RefreshFailed(reason)),
                None => Err(AuthError::RefreshFailed("renewal task aborted".to_string())),
            };
        }
    }

    fn start(
        &self,
        slot: &mut Option<RefreshOperation>,
        session: SessionState,
    ) -> watch::Receiver<Option<RefreshOutcome>> {
        let (tx, rx) = watch::channel(None);
        let tx = Arc::new(tx);
        let epoch = session.epoch;

        *slot = Some(RefreshOperation {
            started_at_epoch: epoch,
            outcome: Arc::clone(&tx),
        });
        self.shared.renewals_started.fetch_add(1, Ordering::SeqCst);

        info!(epoch, "Starting token refresh");
        self.shared
            .store
            .publish(SessionEvent::RefreshStarted { epoch });

        tokio::spawn(run_renewal(Arc::clone(&self.shared), session, tx));
        rx
    }

    /// Number of callers currently awaiting the in-flight renewal.
    pub fn waiter_count(&self) -> usize {
        self.shared
            .slot()
            .as_ref()
            .map_or(0, |op| op.outcome.receiver_count())
    }

    /// Epoch the in-flight renewal started from, if one is pending.
    pub fn in_flight(&self) -> Option<u64> {
        self.shared.slot().as_ref().map(|op| op.started_at_epoch)
    }

    /// Total renewal operations created since construction.
    pub fn renewals_started(&self) -> u64 {
        self.shared.renewals_started.load(Ordering::SeqCst)
    }
}

/// Owns the outcome channel for one renewal task.
///
/// Whatever happens to the task, the slot is vacated and every waiter gets an
/// outcome: if the task unwinds or is dropped before resolving, `Drop` reports
/// a failure instead.
struct Completion {
    shared: Arc<Shared>,
    tx: OutcomeSender,
    epoch: u64,
    resolved: bool,
}

impl Completion {
    fn resolve(&mut self, slot: &mut Option<RefreshOperation>, outcome: RefreshOutcome) {
        if slot
            .as_ref()
            .is_some_and(|op| Arc::ptr_eq(&op.outcome, &self.tx))
        {
            *slot = None;
        }
        self.tx.send_replace(Some(outcome));
        self.resolved = true;
    }
}

impl Drop for Completion {
    fn drop(&mut self) {
        if self.resolved {
            return;
        }
        let reason = "renewal task aborted".to_string();
        warn!(epoch = self.epoch, "Token refresh task ended without a result");

        let shared = Arc::clone(&self.shared);
        let mut slot = shared.slot();
        shared.store.publish(SessionEvent::RefreshFailed {
            epoch: self.epoch,
            reason: reason.clone(),
        });
        self.resolve(&mut slot, RefreshOutcome::Failed(reason));
    }
}

async fn run_renewal(shared: Arc<Shared>, session: SessionState, tx: OutcomeSender) {
    let epoch = session.epoch;
    let mut completion = Completion {
        shared: Arc::clone(&shared),
        tx,
        epoch,
        resolved: false,
    };
    let result = renew(shared.as_ref(), &session.refresh_token).await;

    let mut slot = shared.slot();
    let outcome = match result {
        Ok(grant) => {
            let credentials = Credentials {
                access_token: grant.access_token,
                refresh_token: grant.refresh_token.unwrap_or(session.refresh_token),
                identity: grant.user.unwrap_or(session.identity),
            };
            match shared
                .store
                .replace_if_epoch(epoch, credentials, SessionSource::Refresh)
            {
                Some(renewed) => {
                    info!(from_epoch = epoch, epoch = renewed.epoch, "Token refresh succeeded");
                    RefreshOutcome::Renewed(renewed)
                }
                None => match shared.store.read() {
                    Some(current) => {
                        debug!(
                            epoch,
                            current_epoch = current.epoch,
                            "Session replaced during refresh, discarding renewed tokens"
                        );
                        RefreshOutcome::Renewed(current)
                    }
                    None => RefreshOutcome::Failed("session ended during refresh".to_string()),
                },
            }
        }
        Err(reason) => {
            warn!(epoch, reason = %reason, "Token refresh failed");
            shared.store.publish(SessionEvent::RefreshFailed {
                epoch,
                reason: reason.clone(),
            });
            RefreshOutcome::Failed(reason)
        }
    };

    completion.resolve(&mut slot, outcome);
}

async fn renew(shared: &Shared, refresh_token: &str) -> Result<TokenGrant, String> {
    if refresh_token.is_empty() {
        return Err("no refresh token".to_string());
    }

    let request = ApiRequest::post(REFRESH_TOKEN_PATH, json!({ "refreshToken": refresh_token }));
    let call = shared.transport.send(&request, None);
    let response = match tokio::time::timeout(shared.timeout, call).await {
        Err(_) => {
            return Err(format!(
                "renewal timed out after {}ms",
                shared.timeout.as_millis()
            ))
        }
        Ok(Err(err)) => return Err(format!("renewal request failed: {}", err)),
        Ok(Ok(response)) => response,
    };

    if !response.is_success() {
        return Err(format!("renewal rejected with status {}", response.status));
    }
    parse_token_grant(&response.body)
        .ok_or_else(|| "renewal response has no access token".to_string())
}
