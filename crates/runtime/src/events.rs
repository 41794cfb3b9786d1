use serde::Serialize;
use serde_json::Value;

/// Events broadcast while a turn runs, for progressive display.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum TurnEvent {
    /// Incremental text from the assistant.
    #[serde(rename = "assistant_delta")]
    AssistantDelta { text: String },

    /// A tool is about to be invoked. Its in-flight message is already
    /// persisted under `message_id`.
    #[serde(rename = "tool_call")]
    ToolCall {
        call_id: String,
        tool_name: String,
        arguments: Value,
        message_id: String,
    },

    /// Tool execution result, as recorded on the tool message.
    #[serde(rename = "tool_result")]
    ToolResult {
        call_id: String,
        tool_name: String,
        content: Value,
        #[serde(skip_serializing_if = "std::ops::Not::not")]
        is_error: bool,
    },

    /// The final assistant message (full text).
    #[serde(rename = "final")]
    Final { content: String },

    /// The turn was stopped by a cancellation request.
    #[serde(rename = "stopped")]
    Stopped {
        /// Partial content accumulated before the stop.
        content: String,
    },

    #[serde(rename = "error")]
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnStatus {
    Completed,
    Cancelled,
}

impl TurnStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TurnStatus::Completed => "completed",
            TurnStatus::Cancelled => "cancelled",
        }
    }
}

/// How a turn ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TurnOutcome {
    pub status: TurnStatus,
    /// Everything the assistant said; partial when cancelled.
    pub text: String,
    /// Finalized tool calls that were recorded.
    pub tool_calls: usize,
    /// Id of the persisted assistant message, absent when the text was empty.
    pub message_id: Option<String>,
}

impl TurnOutcome {
    pub fn is_cancelled(&self) -> bool {
        self.status == TurnStatus::Cancelled
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_tag() {
        let json = serde_json::to_value(TurnEvent::AssistantDelta { text: "hi".into() }).unwrap();
        assert_eq!(json["type"], "assistant_delta");
        assert_eq!(json["text"], "hi");
    }

    #[test]
    fn successful_tool_result_omits_is_error() {
        let json = serde_json::to_value(TurnEvent::ToolResult {
            call_id: "c".into(),
            tool_name: "t".into(),
            content: serde_json::json!({"content": "ok"}),
            is_error: false,
        })
        .unwrap();
        assert!(json.get("is_error").is_none());
    }
}
