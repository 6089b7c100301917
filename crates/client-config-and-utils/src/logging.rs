//! Logging initialization for the client.
//!
//! Thin wrapper over the observability crate so binaries make a single call.

use observability::LogConfig;
use std::path::PathBuf;

const DEFAULT_SERVICE_NAME: &str = "recruit-cli";

/// Initialize the logging system.
///
/// `RUST_LOG` takes precedence over `level`.
pub fn init_logging(level: &str, log_path: Option<PathBuf>) {
    init_logging_for_service(DEFAULT_SERVICE_NAME, level, log_path);
}

/// Initialize logging with a custom service name.
pub fn init_logging_for_service(service_name: &str, level: &str, log_path: Option<PathBuf>) {
    let also_stderr = std::env::var("RECRUIT_LOG_STDERR")
        .map(|raw| matches!(raw.trim(), "1" | "true" | "yes"))
        .unwrap_or(false);

    observability::init_with_config(LogConfig {
        service_name: service_name.into(),
        default_level: parse_level(level).to_string().to_lowercase(),
        log_path,
        also_stderr,
    });
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}
