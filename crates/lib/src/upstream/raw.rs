//! Raw adapter: direct HTTP against whichever candidate base URL the gateway picks.

use crate::config::{Credentials, UpstreamSettings};
use crate::upstream::call::ApiCall;
use crate::upstream::http::{build_client, send_route, TransportError};
use crate::upstream::RawApi;
use async_trait::async_trait;
use serde_json::Value;

#[derive(Clone)]
pub struct RawHttpClient {
    credentials: Credentials,
    client: reqwest::Client,
}

impl RawHttpClient {
    pub fn new(settings: &UpstreamSettings) -> Result<Self, TransportError> {
        Ok(Self {
            credentials: settings.credentials.clone(),
            client: build_client(settings.timeout)?,
        })
    }
}

#[async_trait]
impl RawApi for RawHttpClient {
    async fn request(&self, base_url: &str, call: &ApiCall) -> Result<Value, TransportError> {
        send_route(&self.client, base_url, &self.credentials, &call.route()).await
    }
}
