//! Messaging gateway: one method per action, all sharing the same fallback policy.
//!
//! Order for every call: structured adapter, raw adapter at the canonical base URL,
//! then the raw adapter at each alternative base URL. Each candidate is tried once.

use crate::chat_id::ChatId;
use crate::config::UpstreamSettings;
use crate::gateway::fallback::{first_success, Attempt, ChainError};
use crate::models::ChatType;
use crate::upstream::{
    ApiCall, Operation, PeriskopeClient, RawApi, RawHttpClient, StructuredApi, TransportError,
};
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;

/// Message page size used when the caller does not ask for one.
pub const DEFAULT_MESSAGE_LIMIT: u32 = 50;

/// Canonical base URL plus ordered alternatives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoints {
    pub canonical: String,
    pub alternatives: Vec<String>,
}

impl Endpoints {
    /// Canonical first, then alternatives, skipping duplicates of the canonical URL.
    pub fn candidates(&self) -> impl Iterator<Item = &str> {
        let canonical = self.canonical.trim_end_matches('/');
        std::iter::once(self.canonical.as_str()).chain(
            self.alternatives
                .iter()
                .map(String::as_str)
                .filter(move |a| a.trim_end_matches('/') != canonical),
        )
    }
}

/// Successful action: raw upstream payload plus a success marker.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionResult {
    pub success: bool,
    pub data: Value,
}

impl ActionResult {
    pub fn ok(data: Value) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{0}")]
    Validation(String),
    #[error("{resource_method} failed after {attempts} attempt(s): {source}")]
    Exhausted {
        resource_method: &'static str,
        attempts: usize,
        #[source]
        source: TransportError,
    },
}

/// Executes actions against the Periskope API with endpoint fallback.
pub struct MessagingGateway {
    structured: Arc<dyn StructuredApi>,
    raw: Arc<dyn RawApi>,
    endpoints: Endpoints,
}

impl MessagingGateway {
    pub fn new(structured: Arc<dyn StructuredApi>, raw: Arc<dyn RawApi>, endpoints: Endpoints) -> Self {
        Self {
            structured,
            raw,
            endpoints,
        }
    }

    /// Wire the reqwest-backed adapters from resolved settings.
    pub fn from_settings(settings: &UpstreamSettings) -> Result<Self, TransportError> {
        let structured = Arc::new(PeriskopeClient::new(settings)?);
        let raw = Arc::new(RawHttpClient::new(settings)?);
        Ok(Self::new(
            structured,
            raw,
            Endpoints {
                canonical: settings.base_url.clone(),
                alternatives: settings.fallback_base_urls.clone(),
            },
        ))
    }

    /// Send a text message. The body is passed through untouched.
    pub async fn send_message(&self, chat_id: &ChatId, message: &str) -> Result<ActionResult, GatewayError> {
        let call = ApiCall::new(Operation::SendMessage)
            .with("chat_id", chat_id.as_str())
            .with("message", message);
        self.execute(call).await
    }

    /// Send media by URL with an optional caption.
    pub async fn send_media(
        &self,
        chat_id: &ChatId,
        media_url: &str,
        caption: Option<&str>,
    ) -> Result<ActionResult, GatewayError> {
        if media_url.trim().is_empty() {
            return Err(GatewayError::Validation("media_url must not be empty".to_string()));
        }
        let call = ApiCall::new(Operation::SendMessage)
            .with("chat_id", chat_id.as_str())
            .with("message", caption.unwrap_or_default())
            .with("media", json!({ "url": media_url }));
        self.execute(call).await
    }

    /// List chats. The filter is forwarded upstream, not applied locally.
    pub async fn list_chats(&self, filter: Option<ChatType>) -> Result<ActionResult, GatewayError> {
        let mut call = ApiCall::new(Operation::ListChats);
        if let Some(t) = filter {
            call = call.with("chat_type", t.as_api_str());
        }
        self.execute(call).await
    }

    pub async fn get_chat(&self, chat_id: &ChatId) -> Result<ActionResult, GatewayError> {
        self.execute(ApiCall::new(Operation::GetChat).with("chat_id", chat_id.as_str()))
            .await
    }

    /// Messages of one chat; `limit` defaults to [`DEFAULT_MESSAGE_LIMIT`].
    pub async fn get_chat_messages(
        &self,
        chat_id: &ChatId,
        limit: Option<u32>,
    ) -> Result<ActionResult, GatewayError> {
        let call = ApiCall::new(Operation::GetChatMessages)
            .with("chat_id", chat_id.as_str())
            .with("limit", limit.unwrap_or(DEFAULT_MESSAGE_LIMIT));
        self.execute(call).await
    }

    /// Recent messages across all chats.
    pub async fn get_all_messages(&self) -> Result<ActionResult, GatewayError> {
        self.execute(ApiCall::new(Operation::GetAllMessages)).await
    }

    pub async fn get_contact(&self, contact_id: &ChatId) -> Result<ActionResult, GatewayError> {
        self.execute(ApiCall::new(Operation::GetContact).with("contact_id", contact_id.as_str()))
            .await
    }

    /// Create a group. `members` must be non-empty canonical ids.
    pub async fn create_group(&self, name: &str, members: &[ChatId]) -> Result<ActionResult, GatewayError> {
        if name.trim().is_empty() {
            return Err(GatewayError::Validation("group name must not be empty".to_string()));
        }
        if members.is_empty() {
            return Err(GatewayError::Validation(
                "members must contain at least one identifier".to_string(),
            ));
        }
        let members: Vec<&str> = members.iter().map(ChatId::as_str).collect();
        let call = ApiCall::new(Operation::CreateGroup)
            .with("name", name)
            .with("members", members);
        self.execute(call).await
    }

    async fn execute(&self, call: ApiCall) -> Result<ActionResult, GatewayError> {
        let resource_method = call.operation.resource_method();
        let call = &call;
        let mut attempts = Vec::with_capacity(2 + self.endpoints.alternatives.len());
        let structured = &self.structured;
        attempts.push(Attempt::new("structured", move || structured.call(call)));
        let raw = &self.raw;
        for base in self.endpoints.candidates() {
            attempts.push(Attempt::new(format!("raw {}", base), move || raw.request(base, call)));
        }
        match first_success(attempts).await {
            Ok(data) => Ok(ActionResult::ok(data)),
            Err(ChainError::Exhausted { attempts, source, .. }) => Err(GatewayError::Exhausted {
                resource_method,
                attempts,
                source,
            }),
            Err(ChainError::Empty) => unreachable!("structured attempt is always present"),
        }
    }
}
