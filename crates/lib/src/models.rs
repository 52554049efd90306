//! Chat and message views parsed from normalized upstream items.
//!
//! Parsing is lenient: unknown or missing fields fall back to defaults, since the
//! upstream schema drifts between API versions.

use crate::chat_id::ChatId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Chat kind. The API calls one-to-one chats "user".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatType {
    #[serde(alias = "user")]
    Individual,
    Group,
}

impl ChatType {
    /// Parse a filter value: "user" / "individual" or "group" (case-insensitive).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" | "individual" => Some(ChatType::Individual),
            "group" => Some(ChatType::Group),
            _ => None,
        }
    }

    /// Value sent upstream as `chat_type`.
    pub fn as_api_str(self) -> &'static str {
        match self {
            ChatType::Individual => "user",
            ChatType::Group => "group",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub chat_id: ChatId,
    pub name: String,
    #[serde(rename = "type")]
    pub chat_type: ChatType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub member_count: Option<u64>,
}

impl Chat {
    /// Build from an upstream chat object. Returns None without a `chat_id`.
    pub fn from_value(v: &Value) -> Option<Self> {
        let chat_id = ChatId::normalize(v.get("chat_id").and_then(Value::as_str)?);
        let chat_type = v
            .get("chat_type")
            .and_then(Value::as_str)
            .and_then(ChatType::parse)
            .unwrap_or(if chat_id.is_group() {
                ChatType::Group
            } else {
                ChatType::Individual
            });
        Some(Self {
            name: v
                .get("chat_name")
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string(),
            member_count: v.get("member_count").and_then(Value::as_u64),
            chat_id,
            chat_type,
        })
    }

    /// One summary line, e.g. `- Team (123@g.us) - Type: group`.
    pub fn summary_line(&self) -> String {
        let kind = self.chat_type.as_api_str();
        match self.member_count {
            Some(n) => format!("- {} ({}) - Type: {}, {} members", self.name, self.chat_id, kind, n),
            None => format!("- {} ({}) - Type: {}", self.name, self.chat_id, kind),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub chat_id: Option<ChatId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender: Option<String>,
    /// None for media and other non-text payloads.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub body: Option<String>,
    pub is_from_self: bool,
    pub timestamp_millis: i64,
}

/// Placeholder rendered when a message has no text body.
pub const MEDIA_PLACEHOLDER: &str = "[Media]";

impl Message {
    pub fn from_value(v: &Value) -> Self {
        Self {
            chat_id: v.get("chat_id").and_then(Value::as_str).map(ChatId::normalize),
            sender: v
                .get("sender_phone")
                .or_else(|| v.get("author"))
                .and_then(Value::as_str)
                .map(str::to_string),
            body: v
                .get("body")
                .and_then(Value::as_str)
                .filter(|b| !b.is_empty())
                .map(str::to_string),
            is_from_self: v.get("from_me").and_then(Value::as_bool).unwrap_or(false),
            timestamp_millis: v.get("timestamp").map(parse_timestamp_millis).unwrap_or(0),
        }
    }

    pub fn body_or_placeholder(&self) -> &str {
        self.body.as_deref().unwrap_or(MEDIA_PLACEHOLDER)
    }

    /// `[2024-05-01 10:00:00 UTC] You: hello`
    pub fn summary_line(&self) -> String {
        let sender = if self.is_from_self {
            "You"
        } else {
            self.sender.as_deref().unwrap_or("Unknown")
        };
        let time = chrono::DateTime::from_timestamp_millis(self.timestamp_millis)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
            .unwrap_or_else(|| "unknown time".to_string());
        format!("[{}] {}: {}", time, sender, self.body_or_placeholder())
    }
}

/// Epoch millis, epoch seconds (values below 1e11), numeric strings, or RFC 3339.
fn parse_timestamp_millis(v: &Value) -> i64 {
    const SECONDS_CUTOFF: i64 = 100_000_000_000;
    // Out-of-range values collapse to 0 rather than overflow.
    let from_number = |n: i64| {
        if n < SECONDS_CUTOFF {
            n.checked_mul(1000).unwrap_or(0)
        } else {
            n
        }
    };
    match v {
        Value::Number(n) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f as i64))
            .map(from_number)
            .unwrap_or(0),
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(from_number)
            .ok()
            .or_else(|| {
                chrono::DateTime::parse_from_rfc3339(s.trim())
                    .ok()
                    .map(|t| t.timestamp_millis())
            })
            .unwrap_or(0),
        _ => 0,
    }
}
