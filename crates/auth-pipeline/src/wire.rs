//! Request/response shapes exchanged with the recruitment API.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Token renewal endpoint.
pub const REFRESH_TOKEN_PATH: &str = "/auth/refresh-token";
/// Email/password login endpoint.
pub const LOGIN_PATH: &str = "/auth/login";
/// Server-side logout endpoint.
pub const LOGOUT_PATH: &str = "/auth/logout";

/// The only 401 message that means "renew and retry". Every other 401 is an
/// ordinary error for the caller.
pub const ACCESS_TOKEN_EXPIRED_MESSAGE: &str = "Access token expired";

/// Who the session belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// User id. The API sends `_id`; locally persisted sessions use `id`.
    #[serde(alias = "_id", default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl Identity {
    /// Lenient conversion: anything that is not a user object yields `None`.
    pub fn from_value(value: &Value) -> Option<Self> {
        if !value.is_object() {
            return None;
        }
        serde_json::from_value(value.clone()).ok()
    }
}

/// A credential pair plus the identity it was issued for.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: String,
    pub identity: Identity,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"[redacted]")
            .field("refresh_token", &"[redacted]")
            .field("identity", &self.identity)
            .finish()
    }
}

/// One outbound API call, independent of the credentials attached to it.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL, e.g. `/jobs`.
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(Method::POST, path).with_body(body)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn with_query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }
}

/// A completed HTTP exchange. Any status, including errors.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiResponse {
    pub status: u16,
    /// Parsed JSON body; `Null` when empty, a JSON string when not JSON.
    pub body: Value,
}

impl ApiResponse {
    pub fn new(status: u16, body: Value) -> Self {
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Top-level `message` field of the body, if it is a string.
    pub fn message(&self) -> Option<&str> {
        self.body.get("message").and_then(Value::as_str)
    }

    /// True only for `401` with `message == "Access token expired"`.
    pub fn is_access_token_expired(&self) -> bool {
        self.status == 401 && self.message() == Some(ACCESS_TOKEN_EXPIRED_MESSAGE)
    }
}

/// Tokens returned by the login and renewal endpoints.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct TokenGrant {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub user: Option<Identity>,
}

/// Parse `{accessToken, refreshToken, user}`, either at the top level or
/// nested under `data`. `None` when no non-empty access token is present.
pub(crate) fn parse_token_grant(body: &Value) -> Option<TokenGrant> {
    let has_access_token = |v: &Value| v.get("accessToken").is_some();
    let grant = if has_access_token(body) {
        body
    } else {
        body.get("data").filter(|data| has_access_token(data))?
    };

    let non_empty = |key: &str| {
        grant
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Some(TokenGrant {
        access_token: non_empty("accessToken")?,
        refresh_token: non_empty("refreshToken"),
        user: grant.get("user").and_then(Identity::from_value),
    })
}
