//! HTTP transport seam.
//!
//! Everything above this trait speaks `ApiRequest`/`ApiResponse`; only
//! [`HttpTransport`] knows about reqwest. Tests substitute their own
//! implementation.

use crate::error::{TransportError, TransportResult};
use crate::wire::{ApiRequest, ApiResponse};
use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

/// Issues one HTTP exchange against the recruitment API.
///
/// Implementations return `Ok` for every response the server produced,
/// whatever its status. `Err` means no response was obtained.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn send(&self, request: &ApiRequest, bearer: Option<&str>)
        -> TransportResult<ApiResponse>;
}

/// reqwest-backed transport.
pub struct HttpTransport {
    client: Client,
    base_url: Url,
}

impl HttpTransport {
    /// Create a transport rooted at `base_url` (e.g. `http://localhost:5000/api`).
    pub fn new(base_url: Url, timeout: Duration) -> TransportResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(concat!("recruit-desk/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, path: &str) -> TransportResult<Url> {
        let base = self.base_url.as_str().trim_end_matches('/');
        let path = path.trim_start_matches('/');
        Ok(Url::parse(&format!("{}/{}", base, path))?)
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn send(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> TransportResult<ApiResponse> {
        let url = self.endpoint(&request.path)?;
        debug!(method = %request.method, path = %request.path, "Sending API request");

        let mut builder = self.client.request(request.method.clone(), url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = bearer {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(classify)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(classify)?;
        trace!(status, len = bytes.len(), "API response received");

        Ok(ApiResponse::new(status, decode_body(&bytes)))
    }
}

fn classify(err: reqwest::Error) -> TransportError {
    if err.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Http(err)
    }
}

fn decode_body(bytes: &[u8]) -> Value {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}
