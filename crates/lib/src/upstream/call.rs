//! Remote operations and how each maps onto an HTTP route.

use reqwest::Method;
use serde_json::{Map, Value};

/// Path segment of the structured interface under a base URL.
pub const RPC_SEGMENT: &str = "rpc";

/// One remote action, named after the structured API's resource methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    SendMessage,
    ListChats,
    GetChat,
    GetChatMessages,
    GetAllMessages,
    GetContact,
    CreateGroup,
}

impl Operation {
    /// Resource method name on the structured interface (e.g. `chat.getChats`).
    pub fn resource_method(self) -> &'static str {
        match self {
            Operation::SendMessage => "message.send",
            Operation::ListChats => "chat.getChats",
            Operation::GetChat => "chat.getChatById",
            Operation::GetChatMessages => "chat.getChatMessages",
            Operation::GetAllMessages => "chat.getMessages",
            Operation::GetContact => "contact.getContactById",
            Operation::CreateGroup => "group.create",
        }
    }
}

/// An operation plus its (already normalized) parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiCall {
    pub operation: Operation,
    pub params: Map<String, Value>,
}

/// HTTP shape of a call: method, path segments under the base URL, query and JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub method: Method,
    pub segments: Vec<String>,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiCall {
    pub fn new(operation: Operation) -> Self {
        Self {
            operation,
            params: Map::new(),
        }
    }

    /// Builder-style parameter insert.
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.params.insert(key.to_string(), value.into());
        self
    }

    pub fn param_str(&self, key: &str) -> Option<&str> {
        self.params.get(key).and_then(Value::as_str)
    }

    pub fn param_u64(&self, key: &str) -> Option<u64> {
        self.params.get(key).and_then(Value::as_u64)
    }

    fn segment(&self, key: &str) -> String {
        self.param_str(key).unwrap_or_default().to_string()
    }

    /// Method-call form used by the structured adapter: one POST to `rpc` naming the resource method.
    pub fn rpc_route(&self) -> Route {
        let mut body = Map::new();
        body.insert("method".to_string(), Value::from(self.operation.resource_method()));
        body.insert("params".to_string(), Value::Object(self.params.clone()));
        Route {
            method: Method::POST,
            segments: vec![RPC_SEGMENT.to_string()],
            query: Vec::new(),
            body: Some(Value::Object(body)),
        }
    }

    /// Resource path used by the raw adapter. Path ids are pushed as segments so `@` and friends are escaped by the URL builder.
    pub fn route(&self) -> Route {
        let (method, segments, query, body) = match self.operation {
            Operation::SendMessage => (
                Method::POST,
                vec!["message".to_string(), "send".to_string()],
                Vec::new(),
                Some(Value::Object(self.params.clone())),
            ),
            Operation::ListChats => {
                let query = self
                    .param_str("chat_type")
                    .map(|t| vec![("chat_type".to_string(), t.to_string())])
                    .unwrap_or_default();
                (Method::GET, vec!["chats".to_string()], query, None)
            }
            Operation::GetChat => (
                Method::GET,
                vec!["chats".to_string(), self.segment("chat_id")],
                Vec::new(),
                None,
            ),
            Operation::GetChatMessages => {
                let query = self
                    .param_u64("limit")
                    .map(|l| vec![("limit".to_string(), l.to_string())])
                    .unwrap_or_default();
                (
                    Method::GET,
                    vec![
                        "chats".to_string(),
                        self.segment("chat_id"),
                        "messages".to_string(),
                    ],
                    query,
                    None,
                )
            }
            Operation::GetAllMessages => (Method::GET, vec!["messages".to_string()], Vec::new(), None),
            Operation::GetContact => (
                Method::GET,
                vec!["contacts".to_string(), self.segment("contact_id")],
                Vec::new(),
                None,
            ),
            Operation::CreateGroup => (
                Method::POST,
                vec!["chats".to_string(), "create".to_string()],
                Vec::new(),
                Some(Value::Object(self.params.clone())),
            ),
        };
        Route {
            method,
            segments,
            query,
            body,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn send_message_posts_params_as_body() {
        let call = ApiCall::new(Operation::SendMessage)
            .with("chat_id", "1@c.us")
            .with("message", "hi");
        let route = call.route();
        assert_eq!(route.method, Method::POST);
        assert_eq!(route.segments, vec!["message", "send"]);
        assert_eq!(route.body, Some(json!({"chat_id": "1@c.us", "message": "hi"})));
    }

    #[test]
    fn chat_messages_route_carries_id_and_limit() {
        let call = ApiCall::new(Operation::GetChatMessages)
            .with("chat_id", "x@c.us")
            .with("limit", 50u64);
        let route = call.route();
        assert_eq!(route.method, Method::GET);
        assert_eq!(route.segments, vec!["chats", "x@c.us", "messages"]);
        assert_eq!(route.query, vec![("limit".to_string(), "50".to_string())]);
        assert!(route.body.is_none());
    }

    #[test]
    fn list_chats_without_filter_has_no_query() {
        let route = ApiCall::new(Operation::ListChats).route();
        assert!(route.query.is_empty());
        let route = ApiCall::new(Operation::ListChats).with("chat_type", "group").route();
        assert_eq!(route.query, vec![("chat_type".to_string(), "group".to_string())]);
    }

    #[test]
    fn rpc_route_names_method_and_wraps_params() {
        let call = ApiCall::new(Operation::ListChats).with("chat_type", "group");
        let route = call.rpc_route();
        assert_eq!(route.method, Method::POST);
        assert_eq!(route.segments, vec!["rpc"]);
        assert!(route.query.is_empty());
        assert_eq!(
            route.body,
            Some(json!({"method": "chat.getChats", "params": {"chat_type": "group"}}))
        );
        assert_ne!(route, call.route());
    }

    #[test]
    fn resource_methods_match_structured_api() {
        assert_eq!(Operation::SendMessage.resource_method(), "message.send");
        assert_eq!(Operation::CreateGroup.resource_method(), "group.create");
        assert_eq!(Operation::GetChatMessages.resource_method(), "chat.getChatMessages");
    }
}
