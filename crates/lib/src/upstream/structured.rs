//! Structured adapter: the method-oriented Periskope client (`message.send`, `chat.getChats`, ...).
//! Posts `{method, params}` to `<base>/rpc` at the configured base URL and expects a JSON
//! object or array back. A `result` wrapper is peeled off.

use crate::config::{Credentials, UpstreamSettings};
use crate::upstream::call::ApiCall;
use crate::upstream::http::{build_client, send_route, TransportError};
use crate::upstream::StructuredApi;
use async_trait::async_trait;
use serde_json::Value;

/// Client for the Periskope API keyed by resource method.
#[derive(Clone)]
pub struct PeriskopeClient {
    base_url: String,
    credentials: Credentials,
    client: reqwest::Client,
}

impl PeriskopeClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, TransportError> {
        Ok(Self {
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            credentials: settings.credentials.clone(),
            client: build_client(settings.timeout)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl StructuredApi for PeriskopeClient {
    async fn call(&self, call: &ApiCall) -> Result<Value, TransportError> {
        let method = call.operation.resource_method();
        log::debug!("periskope structured call {}", method);
        let value = send_route(&self.client, &self.base_url, &self.credentials, &call.rpc_route()).await?;
        match unwrap_result(value) {
            v @ (Value::Object(_) | Value::Array(_)) => Ok(v),
            other => Err(TransportError::Malformed(format!(
                "{} returned {} instead of a JSON object",
                method,
                json_kind(&other)
            ))),
        }
    }
}

fn unwrap_result(value: Value) -> Value {
    match value {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("result") => {
            map.remove("result").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
