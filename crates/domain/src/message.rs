//! The persisted conversation model.
//!
//! A [`StoredMessage`] is what the local store keeps and what the transcript
//! cache mirrors. Tool messages start in-flight (`tool_result == None`) and
//! are completed exactly once through a [`MessagePatch`].

use chrono::{DateTime, Timelike, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The current time at the microsecond precision the store keeps, so a
/// timestamp reads back exactly as it was written.
pub fn timestamp_now() -> DateTime<Utc> {
    let now = Utc::now();
    now.with_nanosecond(now.nanosecond() / 1_000 * 1_000)
        .unwrap_or(now)
}

/// Status line shown for a tool message while the tool is running.
pub fn tool_pending_status(tool_name: &str) -> String {
    format!("Calling tool: {tool_name}")
}

/// Status line shown for a tool message once the result is recorded.
pub const TOOL_COMPLETED_STATUS: &str = "Tool result";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    Tool,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::Tool => "tool",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "user" => Some(MessageRole::User),
            "assistant" => Some(MessageRole::Assistant),
            "tool" => Some(MessageRole::Tool),
            _ => None,
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A message as persisted in the local store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredMessage {
    pub id: String,
    pub role: MessageRole,
    /// Free text (a JSON string) or any structured value.
    pub content: Value,
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub tool_args: Option<Value>,
    #[serde(default)]
    pub tool_result: Option<Value>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl StoredMessage {
    /// The content as plain text, if it is a string.
    pub fn text(&self) -> Option<&str> {
        self.content.as_str()
    }

    /// A tool message whose tool has not reported back yet.
    pub fn is_in_flight(&self) -> bool {
        self.role == MessageRole::Tool && self.tool_result.is_none()
    }

    /// Apply a field update in place, the same way the store does.
    pub fn apply(&mut self, patch: &MessagePatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(result) = &patch.tool_result {
            self.tool_result = Some(result.clone());
        }
        // Never before creation: the store may nudge `created_at` ahead of
        // the wall clock.
        self.updated_at = patch.updated_at.max(self.created_at);
    }
}

/// The fields supplied when creating a message. The store assigns the id
/// and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: MessageRole,
    pub content: Value,
    pub tool_name: Option<String>,
    pub tool_args: Option<Value>,
}

impl NewMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: Value::String(text.into()),
            tool_name: None,
            tool_args: None,
        }
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: Value::String(text.into()),
            tool_name: None,
            tool_args: None,
        }
    }

    /// An in-flight tool message.
    pub fn tool_call(tool_name: impl Into<String>, arguments: Value) -> Self {
        let tool_name = tool_name.into();
        Self {
            role: MessageRole::Tool,
            content: Value::String(tool_pending_status(&tool_name)),
            tool_name: Some(tool_name),
            tool_args: Some(arguments),
        }
    }
}

/// A partial update applied by id. `updated_at` is decided by the caller so
/// the store and the cache record the same instant.
#[derive(Debug, Clone, PartialEq)]
pub struct MessagePatch {
    pub content: Option<Value>,
    pub tool_result: Option<Value>,
    pub updated_at: DateTime<Utc>,
}

impl MessagePatch {
    /// Complete a tool message with its result (or error) payload.
    pub fn tool_completed(result: Value) -> Self {
        Self {
            content: Some(Value::String(TOOL_COMPLETED_STATUS.into())),
            tool_result: Some(result),
            updated_at: timestamp_now(),
        }
    }

    /// The structured error payload recorded for a failed tool.
    pub fn tool_failed(message: impl std::fmt::Display) -> Self {
        Self::tool_completed(serde_json::json!({ "error": message.to_string() }))
    }
}
