//! # Observability
//!
//! Structured logging for the recruit-desk crates.
//!
//! Binaries call [`init_with_config`] once at startup and then use the plain
//! `tracing` macros. Where the lines end up is decided here, not at the call
//! sites.
//!
//! Every event is written as one JSON object per line to
//! `~/.recruit-desk/logs/client.jsonl` (or a configured path), optionally
//! mirrored to stderr in compact form for interactive use.
//!
//! ```rust,ignore
//! fn main() {
//!     observability::init_with_config(observability::LogConfig {
//!         service_name: "recruit-cli".into(),
//!         default_level: "debug".into(),
//!         also_stderr: true,
//!         ..Default::default()
//!     });
//!     tracing::info!("ready");
//! }
//! ```

mod dev;
mod json_layer;

use std::path::PathBuf;

pub use dev::{default_log_path, CentralLogWriter};
pub use json_layer::{JsonLayer, LogEntry};

/// Configuration for the logging system.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Name of the service (e.g., "recruit-cli").
    /// Included in every log line for filtering.
    pub service_name: String,

    /// Default log level filter (e.g., "debug", "info", "warn").
    /// Can be overridden by `RUST_LOG` environment variable.
    pub default_level: String,

    /// Optional custom log file path.
    /// Defaults to `~/.recruit-desk/logs/client.jsonl`.
    pub log_path: Option<PathBuf>,

    /// Also emit logs to stderr for immediate feedback.
    pub also_stderr: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            service_name: "recruit-desk".into(),
            default_level: "info".into(),
            log_path: None,
            also_stderr: false,
        }
    }
}

/// Initialize the observability layer with custom configuration.
///
/// Calling this more than once is harmless: the first installed subscriber
/// wins and later calls are ignored.
pub fn init_with_config(config: LogConfig) {
    dev::init_subscriber(&config);
}
