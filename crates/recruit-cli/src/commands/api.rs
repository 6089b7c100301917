//! Authenticated API calls.

use super::{explain, Session};
use crate::output::{self, OutputFormat};
use anyhow::{Context as _, Result};
use auth_pipeline::{ApiRequest, DispatchError, Method};
use serde_json::Value;

/// Issue an arbitrary call and print the response body.
pub async fn call(
    session: &Session,
    method: &str,
    path: &str,
    body: Option<&str>,
    query: &[String],
    format: OutputFormat,
) -> Result<()> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method '{}'", method))?;

    let mut request = ApiRequest::new(method, normalize_path(path));
    if let Some(raw) = body {
        let body: Value = serde_json::from_str(raw).context("--body must be valid JSON")?;
        request = request.with_body(body);
    }
    for pair in query {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("query parameter '{}' must be key=value", pair))?;
        request = request.with_query(key, value);
    }

    let response = perform(session, &request, format).await?;
    output::print_json(&response);
    Ok(())
}

/// GET a collection and print it as a table (or JSON).
pub async fn list(session: &Session, path: &str, format: OutputFormat) -> Result<()> {
    let response = perform(session, &ApiRequest::get(path), format).await?;
    match format {
        OutputFormat::Text => output::print_listing(&response),
        OutputFormat::Json => output::print_json(&response),
    }
    Ok(())
}

async fn perform(session: &Session, request: &ApiRequest, format: OutputFormat) -> Result<Value> {
    match session.pipeline.perform(request).await {
        Ok(response) => Ok(response.body),
        Err(DispatchError::Upstream {
            status,
            message,
            body,
        }) => {
            if format == OutputFormat::Json {
                output::print_json(&body);
            }
            anyhow::bail!(
                "{} {} failed ({}): {}",
                request.method,
                request.path,
                status,
                message
            )
        }
        Err(err) => Err(explain(err)),
    }
}

fn normalize_path(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{}", path)
    }
}
