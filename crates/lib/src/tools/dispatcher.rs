//! Tool dispatcher: look up, validate, normalize ids, call the gateway, wrap the result.
//!
//! Past this point failures are data: [`Dispatcher::dispatch`] always returns a
//! [`ResultEnvelope`], with `is_error` set when anything went wrong.

use crate::chat_id::{self, ChatId};
use crate::gateway::{ActionResult, GatewayError, MessagingGateway};
use crate::models::{Chat, ChatType, Message};
use crate::normalize::{extract_list, extract_single, ListPage, Shape};
use crate::tools::registry::{self, scalar_string, ToolRegistry};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;

/// An incoming tool call. Wire form is the MCP `{ "name", "arguments" }` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Invocation {
    #[serde(rename = "name")]
    pub action: String,
    #[serde(default)]
    pub arguments: Value,
}

impl Invocation {
    pub fn new(action: impl Into<String>, arguments: Value) -> Self {
        Self {
            action: action.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ContentBlock {
    Text { text: String },
}

/// What the protocol boundary gets back: exactly one text block plus an error flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResultEnvelope {
    #[serde(rename = "content")]
    pub content_blocks: Vec<ContentBlock>,
    #[serde(default)]
    pub is_error: bool,
}

impl ResultEnvelope {
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content_blocks: vec![ContentBlock::Text { text: text.into() }],
            is_error: false,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            content_blocks: vec![ContentBlock::Text { text: text.into() }],
            is_error: true,
        }
    }

    /// Text of the first block (empty when there is none).
    pub fn first_text(&self) -> &str {
        match self.content_blocks.first() {
            Some(ContentBlock::Text { text }) => text,
            None => "",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Unknown tool: {0}")]
    UnknownAction(String),
    #[error("invalid arguments: {0}")]
    Validation(String),
    #[error(transparent)]
    Gateway(GatewayError),
}

impl From<GatewayError> for DispatchError {
    fn from(e: GatewayError) -> Self {
        match e {
            GatewayError::Validation(msg) => DispatchError::Validation(msg),
            other => DispatchError::Gateway(other),
        }
    }
}

/// Successful tool run: summary line(s) plus the normalized payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    pub summary: String,
    pub payload: Value,
}

impl ToolOutput {
    pub fn into_envelope(self) -> ResultEnvelope {
        let payload = serde_json::to_string_pretty(&self.payload).unwrap_or_else(|_| self.payload.to_string());
        ResultEnvelope::text(format!("{}\n\n{}", self.summary, payload))
    }
}

/// Validated, normalized request. Ids are canonical from here on.
#[derive(Debug, Clone, PartialEq)]
enum ToolRequest {
    SendMessage { chat_id: ChatId, message: String },
    SendMedia { chat_id: ChatId, media_url: String, caption: Option<String> },
    ListChats { filter: Option<ChatType> },
    GetChat { chat_id: ChatId },
    GetChatMessages { chat_id: ChatId, limit: Option<u32> },
    GetAllMessages,
    GetContact { contact_id: ChatId },
    CreateGroup { name: String, members: Vec<ChatId> },
}

fn arg_string(args: &Map<String, Value>, key: &str) -> Option<String> {
    args.get(key).and_then(scalar_string)
}

fn arg_chat_id(args: &Map<String, Value>, keys: &[&str]) -> Result<ChatId, DispatchError> {
    keys.iter()
        .find_map(|k| arg_string(args, k))
        .map(|s| ChatId::normalize(&s))
        .ok_or_else(|| DispatchError::Validation(format!("missing required parameter: {}", keys.join(" or "))))
}

impl ToolRequest {
    /// Build from already-validated arguments; normalization of identifiers happens here and nowhere else.
    fn parse(action: &str, arguments: &Value) -> Result<Self, DispatchError> {
        let empty = Map::new();
        let args = arguments.as_object().unwrap_or(&empty);
        let req = match action {
            registry::SEND_MESSAGE => ToolRequest::SendMessage {
                chat_id: arg_chat_id(args, &["chat_id", "to"])?,
                message: arg_string(args, "message").unwrap_or_default(),
            },
            registry::SEND_MEDIA => ToolRequest::SendMedia {
                chat_id: arg_chat_id(args, &["to"])?,
                media_url: arg_string(args, "media_url").unwrap_or_default(),
                caption: arg_string(args, "caption").filter(|c| !c.is_empty()),
            },
            registry::GET_CHATS => ToolRequest::ListChats {
                filter: arg_string(args, "chat_type").and_then(|t| ChatType::parse(&t)),
            },
            registry::GET_CHAT_DETAILS => ToolRequest::GetChat {
                chat_id: arg_chat_id(args, &["chat_id"])?,
            },
            registry::GET_CHAT_MESSAGES => ToolRequest::GetChatMessages {
                chat_id: arg_chat_id(args, &["chat_id"])?,
                limit: args
                    .get("limit")
                    .and_then(Value::as_u64)
                    .map(|n| u32::try_from(n).unwrap_or(u32::MAX)),
            },
            registry::GET_ALL_MESSAGES => ToolRequest::GetAllMessages,
            registry::GET_CONTACT => ToolRequest::GetContact {
                contact_id: arg_chat_id(args, &["phone_number"])?,
            },
            registry::CREATE_GROUP => {
                let raw: Vec<String> = args
                    .get("members")
                    .and_then(Value::as_array)
                    .map(|a| a.iter().filter_map(scalar_string).collect())
                    .unwrap_or_default();
                ToolRequest::CreateGroup {
                    name: arg_string(args, "name").unwrap_or_default(),
                    members: chat_id::normalize_all(&raw),
                }
            }
            other => return Err(DispatchError::UnknownAction(other.to_string())),
        };
        Ok(req)
    }
}

/// Routes invocations to the gateway. Cheap to clone; shares the gateway.
#[derive(Clone)]
pub struct Dispatcher {
    registry: &'static ToolRegistry,
    gateway: Arc<MessagingGateway>,
}

impl Dispatcher {
    pub fn new(gateway: Arc<MessagingGateway>) -> Self {
        Self {
            registry: ToolRegistry::builtin(),
            gateway,
        }
    }

    pub fn registry(&self) -> &'static ToolRegistry {
        self.registry
    }

    /// Run an invocation; every failure becomes an error envelope.
    pub async fn dispatch(&self, invocation: &Invocation) -> ResultEnvelope {
        match self.try_dispatch(invocation).await {
            Ok(out) => out.into_envelope(),
            Err(e) => error_envelope(&invocation.action, &e),
        }
    }

    /// Same as [`dispatch`](Self::dispatch) but keeps the typed error (the web front end maps it to a status code).
    pub async fn try_dispatch(&self, invocation: &Invocation) -> Result<ToolOutput, DispatchError> {
        let action = invocation.action.as_str();
        let descriptor = self
            .registry
            .get(action)
            .ok_or_else(|| DispatchError::UnknownAction(action.to_string()))?;
        descriptor
            .validate(&invocation.arguments)
            .map_err(DispatchError::Validation)?;
        let request = ToolRequest::parse(action, &invocation.arguments)?;
        let call_id = uuid::Uuid::new_v4();
        log::info!("tool call {} [{}]", action, call_id);
        log::debug!("tool call [{}] request: {:?}", call_id, request);
        let result = self.execute(request).await;
        match result {
            Ok(_) => log::debug!("tool call [{}] ok", call_id),
            Err(ref e) => log::warn!("tool call {} [{}] failed: {}", action, call_id, e),
        }
        result
    }

    async fn execute(&self, request: ToolRequest) -> Result<ToolOutput, DispatchError> {
        let gw = &self.gateway;
        let out = match request {
            ToolRequest::SendMessage { chat_id, message } => {
                let res = gw.send_message(&chat_id, &message).await?;
                ToolOutput {
                    summary: format!(
                        "Message sent successfully!\n\nChat ID: {}\nMessage: \"{}\"\n\nResponse:",
                        chat_id, message
                    ),
                    payload: action_payload(&res),
                }
            }
            ToolRequest::SendMedia {
                chat_id,
                media_url,
                caption,
            } => {
                let res = gw.send_media(&chat_id, &media_url, caption.as_deref()).await?;
                let mut summary = format!("Media sent successfully!\n\nChat ID: {}\nMedia URL: {}", chat_id, media_url);
                if let Some(c) = caption {
                    summary.push_str(&format!("\nCaption: \"{}\"", c));
                }
                summary.push_str("\n\nResponse:");
                ToolOutput {
                    summary,
                    payload: action_payload(&res),
                }
            }
            ToolRequest::ListChats { filter } => {
                let res = gw.list_chats(filter).await?;
                let page = extract_list(&res.data, Shape::ChatList);
                let lines: Vec<String> = page
                    .items
                    .iter()
                    .filter_map(Chat::from_value)
                    .map(|c| c.summary_line())
                    .collect();
                ToolOutput {
                    summary: format!(
                        "WhatsApp Chats ({} total):\n\n{}\n\nFull data:",
                        page.count(),
                        lines_or(&lines, "(no chats found)")
                    ),
                    payload: page_payload(&page),
                }
            }
            ToolRequest::GetChat { chat_id } => {
                let res = gw.get_chat(&chat_id).await?;
                let chat = extract_single(&res.data);
                let mut summary = format!("Chat Details for {}:", chat_id);
                if let Some(c) = Chat::from_value(&chat) {
                    summary.push_str(&format!("\n\n{}", c.summary_line()));
                }
                ToolOutput { summary, payload: chat }
            }
            ToolRequest::GetChatMessages { chat_id, limit } => {
                let res = gw.get_chat_messages(&chat_id, limit).await?;
                let page = extract_list(&res.data, Shape::MessageList);
                ToolOutput {
                    summary: format!(
                        "Messages from {} ({} messages):\n\n{}",
                        chat_id,
                        page.count(),
                        message_lines(&page)
                    ),
                    payload: page_payload(&page),
                }
            }
            ToolRequest::GetAllMessages => {
                let res = gw.get_all_messages().await?;
                let page = extract_list(&res.data, Shape::MessageList);
                ToolOutput {
                    summary: format!(
                        "All Recent Messages ({} total):\n\n{}",
                        page.count(),
                        message_lines(&page)
                    ),
                    payload: page_payload(&page),
                }
            }
            ToolRequest::GetContact { contact_id } => {
                let res = gw.get_contact(&contact_id).await?;
                ToolOutput {
                    summary: format!("Contact info for {}:", contact_id),
                    payload: extract_single(&res.data),
                }
            }
            ToolRequest::CreateGroup { name, members } => {
                let res = gw.create_group(&name, &members).await?;
                let joined: Vec<&str> = members.iter().map(ChatId::as_str).collect();
                ToolOutput {
                    summary: format!(
                        "Group \"{}\" created successfully!\n\nMembers: {}\n\nResponse:",
                        name,
                        joined.join(", ")
                    ),
                    payload: action_payload(&res),
                }
            }
        };
        Ok(out)
    }
}

/// Error envelope text: `Error executing <action>: <message>`.
pub fn error_envelope(action: &str, err: &DispatchError) -> ResultEnvelope {
    ResultEnvelope::error(format!("Error executing {}: {}", action, err))
}

fn action_payload(res: &ActionResult) -> Value {
    serde_json::to_value(res).unwrap_or(Value::Null)
}

fn page_payload(page: &ListPage) -> Value {
    serde_json::to_value(page).unwrap_or(Value::Null)
}

fn lines_or(lines: &[String], empty: &str) -> String {
    if lines.is_empty() {
        empty.to_string()
    } else {
        lines.join("\n")
    }
}

fn message_lines(page: &ListPage) -> String {
    let lines: Vec<String> = page
        .items
        .iter()
        .map(|m| Message::from_value(m).summary_line())
        .collect();
    lines_or(&lines, "(no messages)")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::Endpoints;
    use crate::upstream::testing::{ScriptedApi, STRUCTURED};
    use crate::upstream::Operation;
    use serde_json::json;

    fn dispatcher(api: &Arc<ScriptedApi>) -> Dispatcher {
        let gateway = MessagingGateway::new(
            api.clone(),
            api.clone(),
            Endpoints {
                canonical: "https://canonical.test".to_string(),
                alternatives: vec!["https://alt.test".to_string()],
            },
        );
        Dispatcher::new(Arc::new(gateway))
    }

    #[tokio::test]
    async fn unknown_action_is_error_envelope() {
        let api = Arc::new(ScriptedApi::succeeding(json!({})));
        let d = dispatcher(&api);
        let inv = Invocation::new("delete_everything", json!({}));
        assert!(matches!(
            d.try_dispatch(&inv).await,
            Err(DispatchError::UnknownAction(ref n)) if n == "delete_everything"
        ));
        let env = d.dispatch(&inv).await;
        assert!(env.is_error);
        assert_eq!(env.first_text(), "Error executing delete_everything: Unknown tool: delete_everything");
        assert!(api.attempts().is_empty());
    }

    #[tokio::test]
    async fn empty_group_never_reaches_gateway() {
        let api = Arc::new(ScriptedApi::succeeding(json!({})));
        let d = dispatcher(&api);
        let inv = Invocation::new(registry::CREATE_GROUP, json!({"name": "Team", "members": []}));
        assert!(matches!(d.try_dispatch(&inv).await, Err(DispatchError::Validation(_))));
        assert!(d.dispatch(&inv).await.is_error);
        assert!(api.attempts().is_empty());
    }

    #[tokio::test]
    async fn send_normalizes_to_and_reports_success() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"message_id": "abc"})));
        let d = dispatcher(&api);
        let env = d
            .dispatch(&Invocation::new(
                registry::SEND_MESSAGE,
                json!({"to": "917060284729", "message": "hi"}),
            ))
            .await;
        assert!(!env.is_error);
        let text = env.first_text();
        assert!(text.contains("917060284729"));
        assert!(text.contains("hi"));
        let calls = api.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].operation, Operation::SendMessage);
        assert_eq!(calls[0].param_str("chat_id"), Some("917060284729@c.us"));
        assert_eq!(calls[0].param_str("message"), Some("hi"));
    }

    #[tokio::test]
    async fn blank_recipient_or_member_never_reaches_gateway() {
        let api = Arc::new(ScriptedApi::succeeding(json!({})));
        let d = dispatcher(&api);
        let env = d
            .dispatch(&Invocation::new(registry::SEND_MESSAGE, json!({"to": "", "message": "hi"})))
            .await;
        assert!(env.is_error);
        let inv = Invocation::new(registry::CREATE_GROUP, json!({"name": "T", "members": [""]}));
        assert!(matches!(d.try_dispatch(&inv).await, Err(DispatchError::Validation(_))));
        assert!(api.attempts().is_empty());
    }

    #[tokio::test]
    async fn out_of_range_timestamp_still_yields_envelope() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"messages": [
            {"body": "x", "timestamp": -9_223_372_036_854_775_807i64}
        ]})));
        let d = dispatcher(&api);
        let env = d.dispatch(&Invocation::new(registry::GET_ALL_MESSAGES, json!({}))).await;
        assert!(!env.is_error);
        assert!(env.first_text().contains("Unknown: x"));
    }

    #[tokio::test]
    async fn chat_messages_default_limit_is_fifty() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"data": {"messages": []}})));
        let d = dispatcher(&api);
        let env = d
            .dispatch(&Invocation::new(registry::GET_CHAT_MESSAGES, json!({"chat_id": "x@c.us"})))
            .await;
        assert!(!env.is_error);
        assert_eq!(api.calls()[0].param_u64("limit"), Some(50));
        assert_eq!(api.calls()[0].param_str("chat_id"), Some("x@c.us"));
    }

    #[tokio::test]
    async fn chat_list_summary_uses_normalized_items() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"data": {"chats": [
            {"chat_id": "1@c.us", "chat_name": "Alice", "chat_type": "user"},
            {"chat_id": "2@g.us", "chat_name": "Team", "chat_type": "group"},
            {"chat_id": "3@c.us", "chat_name": "Bob", "chat_type": "user"}
        ]}})));
        let d = dispatcher(&api);
        let out = d
            .try_dispatch(&Invocation::new(registry::GET_CHATS, json!({"chat_type": "group"})))
            .await
            .unwrap();
        assert!(out.summary.starts_with("WhatsApp Chats (3 total):"));
        assert!(out.summary.contains("- Team (2@g.us) - Type: group"));
        assert_eq!(out.payload["items"].as_array().unwrap().len(), 3);
        assert_eq!(api.calls()[0].param_str("chat_type"), Some("group"));
    }

    #[tokio::test]
    async fn media_messages_render_placeholder() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"messages": [
            {"body": "hello", "from_me": true, "timestamp": 0},
            {"sender_phone": "9190", "timestamp": 0}
        ]})));
        let d = dispatcher(&api);
        let out = d
            .try_dispatch(&Invocation::new(registry::GET_ALL_MESSAGES, Value::Null))
            .await
            .unwrap();
        assert!(out.summary.contains("You: hello"));
        assert!(out.summary.contains("9190: [Media]"));
    }

    #[tokio::test]
    async fn group_members_are_normalized_each() {
        let api = Arc::new(ScriptedApi::succeeding(json!({"group_id": "g@g.us"})));
        let d = dispatcher(&api);
        let env = d
            .dispatch(&Invocation::new(
                registry::CREATE_GROUP,
                json!({"name": "Team", "members": ["919537851844", "917060284729@c.us"]}),
            ))
            .await;
        assert!(!env.is_error);
        assert!(env.first_text().contains("Members: 919537851844@c.us, 917060284729@c.us"));
        assert_eq!(
            api.calls()[0].params["members"],
            json!(["919537851844@c.us", "917060284729@c.us"])
        );
    }

    #[tokio::test]
    async fn gateway_failure_becomes_error_envelope() {
        let api = Arc::new(ScriptedApi::new(&[], Value::Null));
        let d = dispatcher(&api);
        let env = d
            .dispatch(&Invocation::new(registry::GET_CONTACT, json!({"phone_number": "917060284729"})))
            .await;
        assert!(env.is_error);
        assert!(env.first_text().starts_with("Error executing get_contact_info:"));
        assert!(env.first_text().contains("contact.getContactById failed after 3 attempt(s)"));
        assert_eq!(api.attempts()[0], STRUCTURED);
        assert_eq!(api.calls()[0].param_str("contact_id"), Some("917060284729@c.us"));
    }

    #[test]
    fn envelope_wire_shape() {
        let v = serde_json::to_value(ResultEnvelope::error("boom")).unwrap();
        assert_eq!(v, json!({"content": [{"type": "text", "text": "boom"}], "isError": true}));
    }

    #[test]
    fn invocation_reads_mcp_params() {
        let inv: Invocation = serde_json::from_value(json!({"name": "get_all_messages"})).unwrap();
        assert_eq!(inv.action, "get_all_messages");
        assert!(inv.arguments.is_null());
    }
}
