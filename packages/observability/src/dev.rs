//! Subscriber setup and the shared log file.

use crate::json_layer::JsonLayer;
use crate::LogConfig;
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{self, LineWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// `~/.recruit-desk/logs/client.jsonl`, or the same layout under the temp dir
/// when there is no home directory.
pub fn default_log_path() -> PathBuf {
    let root = dirs::home_dir().unwrap_or_else(std::env::temp_dir);
    root.join(".recruit-desk").join("logs").join("client.jsonl")
}

/// Append-mode log file handed out to every event.
///
/// Writes go through a [`LineWriter`], so a line reaches the file as soon as
/// its newline does and several processes can share the file.
#[derive(Clone)]
pub struct CentralLogWriter {
    file: Arc<Mutex<LineWriter<File>>>,
}

impl CentralLogWriter {
    pub fn new(path: &Path) -> io::Result<Self> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Arc::new(Mutex::new(LineWriter::new(file))),
        })
    }
}

impl Write for CentralLogWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file.lock().write(buf)
    }

    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        // One lock for the whole line keeps concurrent events from interleaving.
        self.file.lock().write_all(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file.lock().flush()
    }
}

impl<'a> MakeWriter<'a> for CentralLogWriter {
    type Writer = CentralLogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

fn filter_for(config: &LogConfig) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.default_level))
}

pub(crate) fn init_subscriber(config: &LogConfig) {
    let path = config.log_path.clone().unwrap_or_else(default_log_path);

    let file_layer = match CentralLogWriter::new(&path) {
        Ok(writer) => {
            Some(JsonLayer::new(config.service_name.as_str(), writer).with_filter(filter_for(config)))
        }
        Err(err) => {
            eprintln!("warning: logging to {} disabled: {}", path.display(), err);
            None
        }
    };

    // Fall back to stderr when the file could not be opened.
    let stderr_layer = (config.also_stderr || file_layer.is_none()).then(|| {
        tracing_subscriber::fmt::layer()
            .compact()
            .with_target(true)
            .with_writer(io::stderr)
            .with_filter(filter_for(config))
    });

    if tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .is_ok()
    {
        tracing::debug!(path = %path.display(), service = %config.service_name, "Logging ready");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn creates_missing_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("logs").join("client.jsonl");

        let mut writer = CentralLogWriter::new(&path).unwrap();
        writer.write_all(b"{\"msg\":\"hello\"}\n").unwrap();

        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "{\"msg\":\"hello\"}\n"
        );
    }

    #[test]
    fn reopening_appends() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.jsonl");

        for line in ["one\n", "two\n"] {
            CentralLogWriter::new(&path)
                .unwrap()
                .write_all(line.as_bytes())
                .unwrap();
        }

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
    }

    #[test]
    fn clones_share_one_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("client.jsonl");

        let writer = CentralLogWriter::new(&path).unwrap();
        let mut a = writer.make_writer();
        let mut b = writer.clone();
        a.write_all(b"a\n").unwrap();
        b.write_all(b"b\n").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "a\nb\n");
    }

    #[test]
    fn default_path_ends_in_client_log() {
        assert!(default_log_path().ends_with(".recruit-desk/logs/client.jsonl"));
    }
}
