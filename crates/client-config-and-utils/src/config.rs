//! Configuration management for the client.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API base URL (can be overridden at compile time via RECRUIT_API_URL env var).
pub const DEFAULT_API_BASE_URL: &str = match option_env!("RECRUIT_API_URL") {
    Some(url) => url,
    None => "http://localhost:5000/api",
};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Upper bound on a single token renewal call.
pub const DEFAULT_REFRESH_TIMEOUT_MS: u64 = 10_000;

/// Upper bound on an ordinary API call.
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;

const ENV_LOG_LEVEL: &str = "RECRUIT_LOG_LEVEL";
const ENV_API_URL: &str = "RECRUIT_API_URL";
const ENV_REFRESH_TIMEOUT_MS: &str = "RECRUIT_REFRESH_TIMEOUT_MS";

/// Main client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Base URL of the recruitment API, e.g. `https://hr.example.com/api`.
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,
    /// Timeout for the token renewal call in milliseconds.
    #[serde(default = "default_refresh_timeout_ms")]
    pub refresh_timeout_ms: u64,
    /// Timeout for ordinary API calls in milliseconds.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_base_url() -> String {
    DEFAULT_API_BASE_URL.to_string()
}

fn default_refresh_timeout_ms() -> u64 {
    DEFAULT_REFRESH_TIMEOUT_MS
}

fn default_request_timeout_ms() -> u64 {
    DEFAULT_REQUEST_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_base_url: default_api_base_url(),
            refresh_timeout_ms: DEFAULT_REFRESH_TIMEOUT_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}

impl Config {
    /// Load configuration from `<base>/config.json`, falling back to defaults,
    /// then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.load_from_env();
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a file.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    fn load_from_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Apply overrides from a variable lookup. Blank values are ignored, as are
    /// timeouts that do not parse.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| {
            lookup(name)
                .map(|raw| raw.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        if let Some(level) = read(ENV_LOG_LEVEL) {
            self.log_level = level;
        }
        if let Some(url) = read(ENV_API_URL) {
            self.api_base_url = url;
        }
        if let Some(timeout) = read(ENV_REFRESH_TIMEOUT_MS).and_then(|raw| raw.parse().ok()) {
            self.refresh_timeout_ms = timeout;
        }
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_base_url()?;
        if self.refresh_timeout_ms == 0 {
            return Err(CoreError::InvalidSetting {
                key: "refresh_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(CoreError::InvalidSetting {
                key: "request_timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Get the API base URL as a parsed URL.
    pub fn api_base_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_base_url).map_err(CoreError::from)
    }

    pub fn refresh_timeout(&self) -> Duration {
        Duration::from_millis(self.refresh_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}
