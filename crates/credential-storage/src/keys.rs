//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Persisted session `{accessToken, refreshToken, user}` (JSON)
    pub const SESSION: &'static str = "session";
}
