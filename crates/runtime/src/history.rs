//! Model history assembly from the transcript.

use serde_json::Value;

use lc_domain::message::{MessageRole, StoredMessage};
use lc_domain::tool::{Message, ToolCall};

/// The chat history for a new turn: the transcript without tool messages,
/// followed by the new user input.
pub fn build_history(transcript: &[StoredMessage], user_input: &str) -> Vec<Message> {
    transcript
        .iter()
        .filter_map(|msg| {
            let text = content_text(&msg.content);
            match msg.role {
                MessageRole::User => Some(Message::user(text)),
                MessageRole::Assistant => Some(Message::assistant(text)),
                MessageRole::Tool => None,
            }
        })
        .chain(std::iter::once(Message::user(user_input)))
        .collect()
}

/// The two turns that report one executed tool back to the model: the
/// assistant declaring the call, then the tool's result tagged by call id.
pub fn tool_result_pair(call: &ToolCall, result: &Value) -> [Message; 2] {
    [
        Message::assistant_tool_call(call),
        Message::tool_result(call.call_id.clone(), content_text(result)),
    ]
}

/// Strings verbatim, anything else as JSON text.
fn content_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
