//! Error types for the authenticated request pipeline.

use thiserror::Error;

/// Failure to complete an HTTP exchange at all.
#[derive(Error, Debug)]
pub enum TransportError {
    /// HTTP client error (connection refused, TLS, malformed response)
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The call did not finish within its deadline
    #[error("Request timed out")]
    Timeout,

    /// The endpoint URL could not be built
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Network unreachable or otherwise unavailable
    #[error("Network unavailable: {0}")]
    Unavailable(String),
}

/// Result type alias using TransportError.
pub type TransportResult<T> = Result<T, TransportError>;

/// Errors from session management: login, renewal, restore.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Login rejected by the API
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(String),

    /// Renewal attempt failed. Internal to the pipeline: callers of
    /// `RequestDispatcher::perform` only ever see `DispatchError::AuthExpired`.
    #[error("Token refresh failed: {0}")]
    RefreshFailed(String),

    /// The API answered with something the client cannot use
    #[error("Unexpected response: {0}")]
    UnexpectedResponse(String),

    /// Persisted credential storage failed
    #[error("Storage error: {0}")]
    Storage(#[from] credential_storage::StorageError),

    /// Transport error
    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),
}

/// Result type alias using AuthError.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors surfaced by `RequestDispatcher::perform`.
#[derive(Error, Debug)]
pub enum DispatchError {
    /// No session; nothing was sent.
    #[error("Not logged in")]
    Unauthenticated,

    /// Renewal failed or the retry budget ran out. The session has been
    /// torn down and the user must sign in again.
    #[error("Session expired, sign in again")]
    AuthExpired,

    /// The call could not be completed. Never causes invalidation.
    #[error("Network error: {0}")]
    Network(#[from] TransportError),

    /// The API answered with a non-success status that is not an expiry signal.
    #[error("Upstream error {status}: {message}")]
    Upstream {
        status: u16,
        message: String,
        body: serde_json::Value,
    },
}

impl DispatchError {
    /// Returns true if the caller should route the user to sign in.
    pub fn requires_login(&self) -> bool {
        matches!(self, DispatchError::Unauthenticated | DispatchError::AuthExpired)
    }
}

/// Result type alias using DispatchError.
pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_login() {
        assert!(DispatchError::Unauthenticated.requires_login());
        assert!(DispatchError::AuthExpired.requires_login());
        assert!(!DispatchError::Network(TransportError::Timeout).requires_login());
        assert!(!DispatchError::Upstream {
            status: 401,
            message: "Insufficient permissions".to_string(),
            body: serde_json::Value::Null,
        }
        .requires_login());
    }

    #[test]
    fn test_upstream_display_includes_status() {
        let err = DispatchError::Upstream {
            status: 404,
            message: "Job not found".to_string(),
            body: serde_json::Value::Null,
        };
        assert_eq!(err.to_string(), "Upstream error 404: Job not found");
    }
}
