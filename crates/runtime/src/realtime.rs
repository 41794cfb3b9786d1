//! Tool bridge for realtime (voice) sessions.
//!
//! Only the data-channel logic lives here: advertising the tools in the
//! realtime tool format, and answering the model's function calls with
//! the tool provider's output. Audio and session negotiation are the
//! caller's business.

use serde_json::{json, Value};

use lc_domain::error::{Error, Result};
use lc_domain::tool::{ToolDefinition, ToolProvider};

/// Transcription model requested for the caller's audio.
pub const INPUT_TRANSCRIPTION_MODEL: &str = "gpt-4o-mini-transcribe";

pub const DEFAULT_INSTRUCTIONS: &str = "You are a helpful assistant";

/// Body for creating a realtime session (the ephemeral-key request).
pub fn session_create_body(model: &str) -> Value {
    json!({
        "model": model,
        "instructions": DEFAULT_INSTRUCTIONS,
    })
}

/// A tool in the realtime session format.
pub fn realtime_tool(def: &ToolDefinition) -> Value {
    json!({
        "type": "function",
        "name": def.name,
        "description": def.description,
        "parameters": def.parameters,
    })
}

/// The `session.update` event sent once the data channel opens.
pub fn session_update_event(tools: &[ToolDefinition]) -> Value {
    json!({
        "type": "session.update",
        "session": {
            "tools": tools.iter().map(realtime_tool).collect::<Vec<_>>(),
            "tool_choice": "auto",
            "input_audio_transcription": { "model": INPUT_TRANSCRIPTION_MODEL },
        },
    })
}

/// Handle one server event from the data channel.
///
/// Returns the client events to send back, or `None` when the event needs
/// no answer. Only a `response.done` whose first output item is a
/// `function_call` is answered: the tool runs and its output is returned
/// followed by a `response.create` so the model speaks about it.
pub async fn handle_server_event(event: &Value, tools: &dyn ToolProvider) -> Option<Vec<Value>> {
    if event.get("type").and_then(Value::as_str) != Some("response.done") {
        return None;
    }
    let output = event.pointer("/response/output/0")?;
    if output.get("type").and_then(Value::as_str) != Some("function_call") {
        return None;
    }

    let call_id = output.get("call_id").and_then(Value::as_str).unwrap_or_default();
    let name = output.get("name").and_then(Value::as_str).unwrap_or_default();
    let raw_args = output.get("arguments").and_then(Value::as_str).unwrap_or("{}");

    let output_text = match call_realtime_tool(tools, call_id, name, raw_args).await {
        Ok(content) => content.to_string(),
        Err(e) => {
            tracing::warn!(tool = %name, %call_id, error = %e, "realtime tool call failed");
            json!({ "error": e.to_string() }).to_string()
        }
    };

    Some(vec![
        json!({
            "type": "conversation.item.create",
            "item": {
                "type": "function_call_output",
                "call_id": call_id,
                "output": output_text,
            },
        }),
        json!({ "type": "response.create" }),
    ])
}

/// Run the tool and return the `content` of its result.
async fn call_realtime_tool(
    tools: &dyn ToolProvider,
    call_id: &str,
    name: &str,
    raw_args: &str,
) -> Result<Value> {
    let args: Value = serde_json::from_str(raw_args).map_err(|source| Error::ArgumentParse {
        call_id: call_id.to_owned(),
        tool: name.to_owned(),
        source,
    })?;
    tracing::debug!(tool = %name, %call_id, "realtime tool call");
    let result = tools.call_tool(name, args).await?;
    Ok(result.get("content").cloned().unwrap_or(Value::Null))
}
