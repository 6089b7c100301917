//! Authenticated request pipeline for the recruit-desk client.
//!
//! - [`SessionStore`] owns the current credentials, versioned by an epoch.
//! - [`RefreshCoordinator`] runs at most one renewal call at a time and hands
//!   its result to every caller that asked while it was pending.
//! - [`RequestDispatcher`] attaches the access token, recognises the expiry
//!   signal and retries a call at most once after a renewal.
//! - [`SessionInvalidator`] tears the session down when renewal is hopeless.
//!
//! [`AuthPipeline`] wires them together with login, logout and persistence.

mod dispatcher;
mod error;
mod invalidator;
mod lifecycle;
mod pipeline;
mod refresh;
mod session_store;
mod transport;
mod wire;

#[cfg(test)]
mod tests;

pub use dispatcher::{RequestAttempt, RequestDispatcher, MAX_RETRIES};
pub use error::{
    AuthError, AuthResult, DispatchError, DispatchResult, TransportError, TransportResult,
};
pub use invalidator::SessionInvalidator;
pub use lifecycle::SessionPhase;
pub use pipeline::{AuthPipeline, AuthSnapshot, PipelineOptions, DEFAULT_REFRESH_TIMEOUT};
pub use refresh::RefreshCoordinator;
pub use session_store::{EndReason, SessionEvent, SessionSource, SessionState, SessionStore};
pub use transport::{ApiTransport, HttpTransport};
pub use wire::{
    ApiRequest, ApiResponse, Credentials, Identity, ACCESS_TOKEN_EXPIRED_MESSAGE, LOGIN_PATH,
    LOGOUT_PATH, REFRESH_TOKEN_PATH,
};

pub use reqwest::Method;
