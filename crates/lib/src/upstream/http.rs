//! Shared HTTP plumbing for both transports: URL building, auth headers, status and
//! `success: false` handling.

use crate::config::Credentials;
use crate::upstream::call::Route;
use reqwest::Url;
use serde_json::Value;
use std::time::Duration;

/// Failure of a single transport attempt. The gateway treats every variant the same way: advance to the next candidate.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("periskope request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("API Error {status}: {body}")]
    Status { status: u16, body: String },
    #[error("malformed response: {0}")]
    Malformed(String),
    #[error("invalid endpoint url: {0}")]
    InvalidUrl(String),
    #[error("upstream reported failure: {0}")]
    UpstreamReported(String),
}

pub(crate) fn build_client(timeout: Duration) -> Result<reqwest::Client, TransportError> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Join path segments onto a base URL (which may itself carry a path like `/v1`).
pub(crate) fn endpoint_url(base: &str, segments: &[String]) -> Result<Url, TransportError> {
    let mut url = Url::parse(base.trim_end_matches('/'))
        .map_err(|e| TransportError::InvalidUrl(format!("{}: {}", base, e)))?;
    {
        let mut path = url
            .path_segments_mut()
            .map_err(|_| TransportError::InvalidUrl(format!("{}: cannot be a base", base)))?;
        path.pop_if_empty().extend(segments);
    }
    Ok(url)
}

/// Send a route to `base`, returning the decoded JSON body. Empty bodies decode to `null`.
pub(crate) async fn send_route(
    client: &reqwest::Client,
    base: &str,
    credentials: &Credentials,
    route: &Route,
) -> Result<Value, TransportError> {
    let url = endpoint_url(base, &route.segments)?;
    log::debug!("periskope {} {}", route.method, url);
    let mut req = client
        .request(route.method.clone(), url)
        .bearer_auth(&credentials.api_key)
        .header("x-phone", &credentials.phone);
    if !route.query.is_empty() {
        req = req.query(&route.query);
    }
    if let Some(ref body) = route.body {
        req = req.json(body);
    }
    let res = req.send().await?;
    let status = res.status();
    let text = res.text().await?;
    if !status.is_success() {
        return Err(TransportError::Status {
            status: status.as_u16(),
            body: text,
        });
    }
    let value = if text.trim().is_empty() {
        Value::Null
    } else {
        serde_json::from_str(&text).map_err(|e| TransportError::Malformed(e.to_string()))?
    };
    check_reported_failure(&value)?;
    Ok(value)
}

/// A well-formed body with `success: false` is still a failed attempt.
pub(crate) fn check_reported_failure(value: &Value) -> Result<(), TransportError> {
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let msg = ["message", "error"]
            .iter()
            .find_map(|k| value.get(*k).and_then(Value::as_str))
            .unwrap_or("success: false");
        return Err(TransportError::UpstreamReported(msg.to_string()));
    }
    Ok(())
}
