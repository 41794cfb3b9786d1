//! OpenAI-compatible streaming adapter.
//!
//! Works with OpenAI and any endpoint that follows the chat completions
//! contract (Ollama, vLLM, LM Studio, ...).

use crate::sse::sse_response_stream;
use crate::traits::{ChatRequest, LlmProvider};
use crate::util::{from_reqwest, resolve_api_key};
use lc_domain::config::LlmConfig;
use lc_domain::error::{Error, Result};
use lc_domain::stream::{BoxStream, StreamEvent, ToolCallFragment, Usage};
use lc_domain::tool::{ContentPart, Message, MessageContent, Role, ToolDefinition};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Adapter struct
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

pub struct OpenAiCompatProvider {
    id: String,
    base_url: String,
    api_key: String,
    auth_header: String,
    auth_prefix: String,
    default_model: String,
    client: reqwest::Client,
}

impl OpenAiCompatProvider {
    /// Build the provider from `[llm]`, resolving the API key.
    pub fn from_config(cfg: &LlmConfig) -> Result<Self> {
        let api_key = resolve_api_key(&cfg.auth)?;
        Self::with_api_key(cfg, api_key)
    }

    /// Build the provider with an already-resolved key.
    pub fn with_api_key(cfg: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(cfg.timeout_ms))
            .build()
            .map_err(from_reqwest)?;

        Ok(Self {
            id: "openai_compat".into(),
            base_url: cfg.base_url.trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            auth_header: cfg.auth.header.clone(),
            auth_prefix: cfg.auth.prefix.clone(),
            default_model: cfg.model.clone(),
            client,
        })
    }

    fn authed_post(&self, url: &str) -> reqwest::RequestBuilder {
        let header_value = format!("{}{}", self.auth_prefix, self.api_key);
        self.client
            .post(url)
            .header(&self.auth_header, &header_value)
            .header("Content-Type", "application/json")
            .header("Accept", "text/event-stream")
    }

    fn build_chat_body(&self, req: &ChatRequest) -> Value {
        let messages: Vec<Value> = req.messages.iter().map(msg_to_openai).collect();
        let model = req.model.as_deref().unwrap_or(&self.default_model);

        let mut body = serde_json::json!({
            "model": model,
            "messages": messages,
            "stream": true,
            "stream_options": {"include_usage": true},
        });

        if !req.tools.is_empty() {
            let tools: Vec<Value> = req.tools.iter().map(tool_to_openai).collect();
            body["tools"] = Value::Array(tools);
        }
        if let Some(temp) = req.temperature {
            body["temperature"] = serde_json::json!(temp);
        }
        if let Some(max) = req.max_tokens {
            body["max_tokens"] = serde_json::json!(max);
        }
        body
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Message serialization helpers
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn role_to_str(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User => "user",
        Role::Assistant => "assistant",
        Role::Tool => "tool",
    }
}

fn msg_to_openai(msg: &Message) -> Value {
    match msg.role {
        Role::Tool => tool_result_to_openai(msg),
        Role::Assistant => assistant_to_openai(msg),
        _ => serde_json::json!({
            "role": role_to_str(msg.role),
            "content": msg.content.extract_all_text(),
        }),
    }
}

/// Assistant turns carry text, declared tool calls, or both. Arguments go
/// over the wire as a JSON string.
fn assistant_to_openai(msg: &Message) -> Value {
    let mut text_parts: Vec<&str> = Vec::new();
    let mut tool_calls: Vec<Value> = Vec::new();

    match &msg.content {
        MessageContent::Text(t) => text_parts.push(t),
        MessageContent::Parts(parts) => {
            for part in parts {
                match part {
                    ContentPart::Text { text } => text_parts.push(text),
                    ContentPart::ToolUse { id, name, input } => {
                        tool_calls.push(serde_json::json!({
                            "id": id,
                            "type": "function",
                            "function": {
                                "name": name,
                                "arguments": input.to_string(),
                            }
                        }));
                    }
                    ContentPart::ToolResult { .. } => {}
                }
            }
        }
    }

    let mut obj = serde_json::json!({"role": "assistant"});
    obj["content"] = if text_parts.is_empty() {
        Value::Null
    } else {
        Value::String(text_parts.join("\n"))
    };
    if !tool_calls.is_empty() {
        obj["tool_calls"] = Value::Array(tool_calls);
    }
    obj
}

fn tool_result_to_openai(msg: &Message) -> Value {
    if let MessageContent::Parts(parts) = &msg.content {
        for part in parts {
            if let ContentPart::ToolResult {
                tool_use_id,
                content,
                ..
            } = part
            {
                return serde_json::json!({
                    "role": "tool",
                    "tool_call_id": tool_use_id,
                    "content": content,
                });
            }
        }
    }
    serde_json::json!({
        "role": "tool",
        "tool_call_id": "",
        "content": msg.content.extract_all_text(),
    })
}

fn tool_to_openai(tool: &ToolDefinition) -> Value {
    serde_json::json!({
        "type": "function",
        "function": {
            "name": tool.name,
            "description": tool.description,
            "parameters": tool.parameters,
        }
    })
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// SSE chunk parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

fn parse_openai_usage(v: &Value) -> Option<Usage> {
    Some(Usage {
        prompt_tokens: v.get("prompt_tokens")?.as_u64()? as u32,
        completion_tokens: v.get("completion_tokens")?.as_u64()? as u32,
        total_tokens: v.get("total_tokens")?.as_u64()? as u32,
    })
}

fn non_empty_str(v: Option<&Value>) -> Option<String> {
    v.and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(String::from)
}

/// `None` when the fragment has no usable `index`; without one it cannot
/// be told apart from the other calls in the response.
fn parse_tool_call_fragment(tc: &Value) -> Option<ToolCallFragment> {
    let index = tc
        .get("index")
        .and_then(|v| v.as_u64())
        .and_then(|i| u32::try_from(i).ok())?;
    let function = tc.get("function");
    Some(ToolCallFragment {
        index,
        id: non_empty_str(tc.get("id")),
        kind: non_empty_str(tc.get("type")),
        name: non_empty_str(function.and_then(|f| f.get("name"))),
        // Argument pieces are kept verbatim, empty ones included; the
        // accumulator decides what to do with them.
        arguments: function
            .and_then(|f| f.get("arguments"))
            .and_then(|v| v.as_str())
            .map(String::from),
    })
}

/// Parse one `data:` payload into zero or more events.
///
/// A single chunk can carry a content delta, several tool-call fragments
/// and a finish reason at once; they come out in that order.
pub(crate) fn parse_sse_data(data: &str) -> Vec<Result<StreamEvent>> {
    if data.trim() == "[DONE]" {
        return vec![Ok(StreamEvent::Done {
            usage: None,
            finish_reason: Some("stop".into()),
        })];
    }

    let v: Value = match serde_json::from_str(data) {
        Ok(v) => v,
        Err(e) => {
            return vec![Err(Error::Stream(format!(
                "malformed stream chunk: {e}"
            )))]
        }
    };

    if let Some(err) = v.get("error") {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .map(String::from)
            .unwrap_or_else(|| err.to_string());
        return vec![Ok(StreamEvent::Error { message })];
    }

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|a| a.first());

    let Some(choice) = choice else {
        // Usage-only chunk (stream_options.include_usage).
        return match v.get("usage").and_then(parse_openai_usage) {
            Some(usage) => vec![Ok(StreamEvent::Done {
                usage: Some(usage),
                finish_reason: None,
            })],
            None => Vec::new(),
        };
    };

    let mut events = Vec::new();
    let delta = choice.get("delta").unwrap_or(&Value::Null);

    if let Some(text) = delta.get("content").and_then(|v| v.as_str()) {
        if !text.is_empty() {
            events.push(Ok(StreamEvent::Token {
                text: text.to_string(),
            }));
        }
    }

    if let Some(tc_arr) = delta.get("tool_calls").and_then(|v| v.as_array()) {
        for tc in tc_arr {
            match parse_tool_call_fragment(tc) {
                Some(fragment) => events.push(Ok(StreamEvent::ToolCallDelta(fragment))),
                None => tracing::debug!(
                    fragment = %tc,
                    "skipping tool-call delta without a valid index"
                ),
            }
        }
    }

    if let Some(fr) = choice.get("finish_reason").and_then(|f| f.as_str()) {
        events.push(Ok(StreamEvent::Done {
            usage: v.get("usage").and_then(parse_openai_usage),
            finish_reason: Some(fr.to_string()),
        }));
    }

    events
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Trait implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[async_trait::async_trait]
impl LlmProvider for OpenAiCompatProvider {
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>> {
        let url = format!("{}/chat/completions", self.base_url);
        let body = self.build_chat_body(req);

        tracing::debug!(
            provider = %self.id,
            url = %url,
            messages = req.messages.len(),
            tools = req.tools.len(),
            "openai_compat stream request"
        );

        let resp = self
            .authed_post(&url)
            .json(&body)
            .send()
            .await
            .map_err(from_reqwest)?;

        let status = resp.status();
        if !status.is_success() {
            let err_text = resp.text().await.map_err(from_reqwest)?;
            return Err(Error::Provider {
                provider: self.id.clone(),
                message: format!("HTTP {} - {}", status.as_u16(), err_text),
            });
        }

        Ok(sse_response_stream(resp, parse_sse_data))
    }

    fn provider_id(&self) -> &str {
        &self.id
    }

    fn default_model(&self) -> &str {
        &self.default_model
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;
    use lc_domain::tool::ToolCall;

    fn provider() -> OpenAiCompatProvider {
        OpenAiCompatProvider::with_api_key(&LlmConfig::default(), "sk-test").unwrap()
    }

    fn ok_events(data: &str) -> Vec<StreamEvent> {
        parse_sse_data(data)
            .into_iter()
            .map(|e| e.unwrap())
            .collect()
    }

    #[test]
    fn content_delta_becomes_token() {
        let events = ok_events(r#"{"choices":[{"delta":{"content":"Hello"}}]}"#);
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], StreamEvent::Token { text } if text == "Hello"));
    }

    #[test]
    fn every_tool_call_entry_becomes_a_fragment() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[
            {"index":0,"id":"call_a","type":"function","function":{"name":"get_weather","arguments":""}},
            {"index":1,"function":{"arguments":"{\"ci"}}
        ]}}]}"#;
        let events = ok_events(data);
        assert_eq!(events.len(), 2);

        match &events[0] {
            StreamEvent::ToolCallDelta(f) => {
                assert_eq!(f.index, 0);
                assert_eq!(f.id.as_deref(), Some("call_a"));
                assert_eq!(f.kind.as_deref(), Some("function"));
                assert_eq!(f.name.as_deref(), Some("get_weather"));
                assert_eq!(f.arguments.as_deref(), Some(""));
            }
            other => panic!("expected fragment, got {other:?}"),
        }
        match &events[1] {
            StreamEvent::ToolCallDelta(f) => {
                assert_eq!(f.index, 1);
                assert!(f.id.is_none());
                assert!(f.name.is_none());
                assert_eq!(f.arguments.as_deref(), Some("{\"ci"));
            }
            other => panic!("expected fragment, got {other:?}"),
        }
    }

    #[test]
    fn empty_id_is_treated_as_absent() {
        let data = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"","function":{"name":""}}]}}]}"#;
        match &ok_events(data)[0] {
            StreamEvent::ToolCallDelta(f) => {
                assert!(f.id.is_none());
                assert!(f.name.is_none());
            }
            other => panic!("expected fragment, got {other:?}"),
        }
    }

    #[test]
    fn fragment_without_valid_index_is_skipped() {
        let data = r#"{"choices":[{"delta":{"content":"ok","tool_calls":[
            {"id":"call_x","function":{"name":"missing_index"}},
            {"index":4294967296,"id":"call_y","function":{"name":"too_big"}},
            {"index":2,"id":"call_z","function":{"name":"kept"}}
        ]}}]}"#;
        let events = ok_events(data);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Token { .. }));
        match &events[1] {
            StreamEvent::ToolCallDelta(f) => {
                assert_eq!(f.index, 2);
                assert_eq!(f.id.as_deref(), Some("call_z"));
            }
            other => panic!("expected fragment, got {other:?}"),
        }
    }

    #[test]
    fn finish_reason_follows_content_in_same_chunk() {
        let data = r#"{"choices":[{"delta":{"content":"!"},"finish_reason":"stop"}]}"#;
        let events = ok_events(data);
        assert_eq!(events.len(), 2);
        assert!(matches!(events[0], StreamEvent::Token { .. }));
        assert!(matches!(
            &events[1],
            StreamEvent::Done { finish_reason: Some(r), .. } if r == "stop"
        ));
    }

    #[test]
    fn usage_only_chunk_is_done_with_usage() {
        let data = r#"{"choices":[],"usage":{"prompt_tokens":10,"completion_tokens":5,"total_tokens":15}}"#;
        match &ok_events(data)[0] {
            StreamEvent::Done { usage: Some(u), .. } => assert_eq!(u.total_tokens, 15),
            other => panic!("expected done, got {other:?}"),
        }
    }

    #[test]
    fn done_sentinel() {
        assert!(matches!(ok_events("[DONE]")[0], StreamEvent::Done { .. }));
    }

    #[test]
    fn in_band_error_object() {
        let events = ok_events(r#"{"error":{"message":"rate limited"}}"#);
        assert!(matches!(&events[0], StreamEvent::Error { message } if message == "rate limited"));
    }

    #[test]
    fn malformed_chunk_is_stream_error() {
        let events = parse_sse_data("{not json");
        assert!(matches!(events[0], Err(Error::Stream(_))));
    }

    #[test]
    fn body_omits_tools_when_none_offered() {
        let req = ChatRequest {
            messages: vec![Message::user("hi")],
            ..Default::default()
        };
        let body = provider().build_chat_body(&req);
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["stream"], true);
        assert!(body.get("tools").is_none());
        assert!(body.get("temperature").is_none());
    }

    #[test]
    fn body_serializes_tool_call_pair() {
        let call = ToolCall {
            call_id: "call_1".into(),
            tool_name: "get_weather".into(),
            arguments: serde_json::json!({"city": "Paris"}),
        };
        let req = ChatRequest {
            messages: vec![
                Message::user("weather?"),
                Message::assistant_tool_call(&call),
                Message::tool_result("call_1", r#"{"temp":18}"#),
            ],
            tools: vec![ToolDefinition {
                name: "get_weather".into(),
                description: "Current weather".into(),
                parameters: serde_json::json!({"type": "object"}),
            }],
            temperature: Some(0.5),
            ..Default::default()
        };
        let body = provider().build_chat_body(&req);

        let assistant = &body["messages"][1];
        assert_eq!(assistant["content"], Value::Null);
        assert_eq!(assistant["tool_calls"][0]["id"], "call_1");
        assert_eq!(
            assistant["tool_calls"][0]["function"]["arguments"],
            r#"{"city":"Paris"}"#
        );

        let tool = &body["messages"][2];
        assert_eq!(tool["role"], "tool");
        assert_eq!(tool["tool_call_id"], "call_1");
        assert_eq!(tool["content"], r#"{"temp":18}"#);

        assert_eq!(body["tools"][0]["function"]["name"], "get_weather");
        assert_eq!(body["temperature"], serde_json::json!(0.5f32));
    }
}
