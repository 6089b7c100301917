//! CLI command implementations.

mod api;
mod auth;

pub use api::{call, list};
pub use auth::{login, logout, status};

use anyhow::Result;
use auth_pipeline::{AuthPipeline, DispatchError, HttpTransport, PipelineOptions};
use client_config_and_utils::{Config, Paths};
use credential_storage::create_credential_store;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

const PERSISTENCE_FLUSH_TIMEOUT: Duration = Duration::from_secs(2);

/// Everything a command needs: a restored session and its persistence task.
pub struct Session {
    pub pipeline: AuthPipeline,
    persistence: JoinHandle<()>,
}

impl Session {
    /// Build the pipeline from config and restore the persisted session.
    pub fn open(paths: &Paths, config: &Config) -> Result<Self> {
        let base_url = config.api_base_url()?;
        debug!(api = %base_url, "Using API");

        let transport = HttpTransport::new(base_url, config.request_timeout())?;
        let credentials = Arc::new(create_credential_store(paths.session_file()));
        let pipeline = AuthPipeline::new(
            Arc::new(transport),
            credentials,
            PipelineOptions {
                refresh_timeout: config.refresh_timeout(),
            },
        );

        if let Some(session) = pipeline.restore()? {
            debug!(epoch = session.epoch, "Restored persisted session");
        }
        let persistence = pipeline.spawn_persistence();

        Ok(Self {
            pipeline,
            persistence,
        })
    }

    /// Drop the pipeline and wait for pending writes to reach disk.
    pub async fn close(self) {
        let Session {
            pipeline,
            persistence,
        } = self;
        drop(pipeline);

        match tokio::time::timeout(PERSISTENCE_FLUSH_TIMEOUT, persistence).await {
            Ok(Ok(())) => {}
            Ok(Err(err)) => warn!(error = %err, "Persistence task failed"),
            Err(_) => warn!("Timed out flushing session to disk"),
        }
    }
}

/// Turn a dispatch failure into something the user can act on.
fn explain(err: DispatchError) -> anyhow::Error {
    if !err.requires_login() {
        return err.into();
    }
    match err {
        DispatchError::AuthExpired => {
            anyhow::anyhow!("Session expired. Run 'recruit login' to sign in again")
        }
        _ => anyhow::anyhow!("Not logged in. Run 'recruit login' first"),
    }
}
