//! Best-effort extraction of a canonical shape from upstream payloads.
//!
//! The API nests lists under different keys depending on version (`data.chats`, `chats`,
//! bare `data`, ...). Each shape has a fixed priority list of paths; the first match wins.
//! A miss is never an error: lists come back empty, singles come back unchanged.

use serde::Serialize;
use serde_json::Value;

/// Expected result shape for an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shape {
    ChatList,
    MessageList,
    Single,
}

const CHAT_LIST_PATHS: &[&[&str]] = &[&["data", "chats"], &["chats"], &["data", "data"], &["data"], &[]];
const MESSAGE_LIST_PATHS: &[&[&str]] = &[
    &["data", "messages"],
    &["messages"],
    &["data", "data"],
    &["data"],
    &[],
];
const SINGLE_PATHS: &[&[&str]] = &[
    &["data", "chat"],
    &["data", "contact"],
    &["chat"],
    &["contact"],
    &["data"],
];

impl Shape {
    /// Lookup paths in priority order. An empty path is the payload root.
    pub fn paths(self) -> &'static [&'static [&'static str]] {
        match self {
            Shape::ChatList => CHAT_LIST_PATHS,
            Shape::MessageList => MESSAGE_LIST_PATHS,
            Shape::Single => SINGLE_PATHS,
        }
    }
}

/// One page of a list result plus whatever pagination markers the upstream sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListPage {
    pub items: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<i64>,
}

impl ListPage {
    /// Number of items: the page length, or the upstream-reported total when the page is empty.
    pub fn count(&self) -> u64 {
        if self.items.is_empty() {
            self.total.unwrap_or(0)
        } else {
            self.items.len() as u64
        }
    }
}

fn lookup<'a>(payload: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(payload, |v, key| v.get(*key))
}

/// Extract a list for `ChatList` / `MessageList`. `Single` is treated as "no list".
pub fn extract_list(payload: &Value, shape: Shape) -> ListPage {
    if shape == Shape::Single {
        return ListPage::default();
    }
    for path in shape.paths() {
        if let Some(Value::Array(items)) = lookup(payload, path) {
            let container = if path.is_empty() {
                payload
            } else {
                lookup(payload, &path[..path.len() - 1]).unwrap_or(payload)
            };
            return ListPage {
                items: items.clone(),
                total: container
                    .get("count")
                    .or_else(|| container.get("total"))
                    .and_then(Value::as_u64),
                from: container.get("from").and_then(Value::as_i64),
                to: container.get("to").and_then(Value::as_i64),
            };
        }
    }
    let total = payload
        .get("data")
        .unwrap_or(payload)
        .get("count")
        .and_then(Value::as_u64);
    ListPage {
        total,
        ..ListPage::default()
    }
}

/// Extract a single object. Falls back to the raw payload when no known path holds an object.
pub fn extract_single(payload: &Value) -> Value {
    Shape::Single
        .paths()
        .iter()
        .find_map(|path| match lookup(payload, path) {
            Some(v @ Value::Object(_)) => Some(v.clone()),
            _ => None,
        })
        .unwrap_or_else(|| payload.clone())
}
