//! Chat identifiers: canonical `<number>@c.us` (one-to-one) or `<id>@g.us` (group).
//!
//! Callers may pass a bare phone number; [`ChatId::normalize`] is the only way to build
//! a `ChatId`, so anything that reaches the gateway is already in suffixed form.

use serde::Serialize;
use std::fmt;

/// Suffix appended to bare phone numbers (one-to-one chat).
pub const USER_SUFFIX: &str = "@c.us";
/// Suffix used by group chats.
pub const GROUP_SUFFIX: &str = "@g.us";

/// Canonical chat identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ChatId(String);

impl ChatId {
    /// Canonicalize a phone number or chat id. Input containing `@` is kept as-is (trimmed);
    /// anything else gets the one-to-one suffix.
    pub fn normalize(raw: &str) -> Self {
        Self(normalize(raw))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True for `@g.us` identifiers.
    pub fn is_group(&self) -> bool {
        self.0.ends_with(GROUP_SUFFIX)
    }
}

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ChatId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// String form of [`ChatId::normalize`].
pub fn normalize(raw: &str) -> String {
    let s = raw.trim();
    if s.contains('@') {
        s.to_string()
    } else {
        format!("{}{}", s, USER_SUFFIX)
    }
}

/// Normalize every member of a group independently.
pub fn normalize_all<S: AsRef<str>>(raw: &[S]) -> Vec<ChatId> {
    raw.iter().map(|m| ChatId::normalize(m.as_ref())).collect()
}
