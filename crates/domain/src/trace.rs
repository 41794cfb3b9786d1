use serde::Serialize;

/// Structured trace events emitted across the localchat crates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event")]
pub enum TraceEvent {
    TurnStarted {
        turn_id: String,
        input_chars: usize,
        history_len: usize,
        tools_offered: usize,
    },
    LlmRequest {
        provider: String,
        model: String,
        /// 1 for the tool-capable stream, 2 for the follow-up stream.
        phase: u8,
        duration_ms: u64,
        prompt_tokens: Option<u32>,
        completion_tokens: Option<u32>,
    },
    ToolCallFinalized {
        turn_id: String,
        call_id: String,
        tool_name: String,
        arguments_chars: usize,
        parse_ok: bool,
    },
    ToolCompleted {
        turn_id: String,
        call_id: String,
        tool_name: String,
        success: bool,
        duration_ms: u64,
    },
    MessagePersisted {
        message_id: String,
        role: String,
    },
    TurnFinished {
        turn_id: String,
        outcome: String,
        text_chars: usize,
        tool_calls: usize,
        duration_ms: u64,
    },
    McpConnected {
        endpoint: String,
        server_name: Option<String>,
        tool_count: usize,
    },
}

impl TraceEvent {
    pub fn emit(&self) {
        let json = serde_json::to_string(self).unwrap_or_default();
        tracing::info!(trace_event = %json, "lc_event");
    }
}
