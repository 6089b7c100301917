//! Errors raised while locating, reading or validating client configuration.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    /// A setting was present but unusable.
    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: &'static str, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("invalid API URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// `config.json` is not valid JSON or has the wrong shape.
    #[error("malformed config file: {0}")]
    Json(#[from] serde_json::Error),

    #[error("could not determine the home directory; pass --base-dir or set RECRUIT_HOME")]
    NoHomeDir,
}

pub type CoreResult<T> = Result<T, CoreError>;
