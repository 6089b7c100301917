//! Authenticated request execution with a bounded refresh-and-retry.

use crate::error::{DispatchError, DispatchResult};
use crate::invalidator::SessionInvalidator;
use crate::refresh::RefreshCoordinator;
use crate::session_store::{EndReason, SessionStore};
use crate::transport::ApiTransport;
use crate::wire::{ApiRequest, ApiResponse};
use std::sync::Arc;
use tracing::{debug, warn};

/// Refresh-and-retry cycles a single call may go through.
pub const MAX_RETRIES: u8 = 1;

/// Per-call bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestAttempt {
    /// Epoch of the credentials the latest send used.
    pub epoch_at_send: u64,
    pub retries_used: u8,
}

impl RequestAttempt {
    pub fn new(epoch_at_send: u64) -> Self {
        Self {
            epoch_at_send,
            retries_used: 0,
        }
    }

    pub fn can_retry(&self) -> bool {
        self.retries_used < MAX_RETRIES
    }

    /// Account for one retry about to be sent with credentials at `epoch`.
    pub fn record_retry(&mut self, epoch: u64) {
        self.retries_used = self.retries_used.saturating_add(1).min(MAX_RETRIES);
        self.epoch_at_send = epoch;
    }
}

/// Attaches the current access token, spots the expiry signal and drives at
/// most one renewal-and-retry per call.
pub struct RequestDispatcher {
    store: Arc<SessionStore>,
    transport: Arc<dyn ApiTransport>,
    coordinator: Arc<RefreshCoordinator>,
    invalidator: Arc<SessionInvalidator>,
}

impl RequestDispatcher {
    pub fn new(
        store: Arc<SessionStore>,
        transport: Arc<dyn ApiTransport>,
        coordinator: Arc<RefreshCoordinator>,
        invalidator: Arc<SessionInvalidator>,
    ) -> Self {
        Self {
            store,
            transport,
            coordinator,
            invalidator,
        }
    }

    /// Perform one logical call.
    ///
    /// A successful renewal-and-retry is invisible to the caller. Renewal
    /// failure, or a retried call that is told its fresh token expired too,
    /// ends the session and yields [`DispatchError::AuthExpired`]. Transport
    /// failures never touch the session.
    pub async fn perform(&self, request: &ApiRequest) -> DispatchResult<ApiResponse> {
        let Some(session) = self.store.read() else {
            debug!(path = %request.path, "No session, not sending");
            return Err(DispatchError::Unauthenticated);
        };

        let mut attempt = RequestAttempt::new(session.epoch);
        let mut access_token = session.access_token;

        loop {
            let response = self.transport.send(request, Some(&access_token)).await?;
            if !response.is_access_token_expired() {
                return into_result(response);
            }

            if !attempt.can_retry() {
                warn!(
                    path = %request.path,
                    epoch = attempt.epoch_at_send,
                    "Renewed access token rejected as expired"
                );
                self.invalidator
                    .invalidate_at(attempt.epoch_at_send, EndReason::RetryExhausted);
                return Err(DispatchError::AuthExpired);
            }

            debug!(path = %request.path, epoch = attempt.epoch_at_send, "Access token expired");
            match self.coordinator.request_refresh(attempt.epoch_at_send).await {
                Ok(renewed) => {
                    attempt.record_retry(renewed.epoch);
                    access_token = renewed.access_token;
                }
                Err(err) => {
                    warn!(path = %request.path, error = %err, "Could not renew session");
                    self.invalidator
                        .invalidate_at(attempt.epoch_at_send, EndReason::RefreshFailed);
                    return Err(DispatchError::AuthExpired);
                }
            }
        }
    }
}

fn into_result(response: ApiResponse) -> DispatchResult<ApiResponse> {
    if response.is_success() {
        return Ok(response);
    }
    let message = response
        .message()
        .map(str::to_string)
        .unwrap_or_else(|| format!("HTTP {}", response.status));
    Err(DispatchError::Upstream {
        status: response.status,
        message,
        body: response.body,
    })
}
