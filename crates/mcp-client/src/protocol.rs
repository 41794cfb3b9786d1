//! JSON-RPC 2.0 types for the MCP protocol.

use lc_domain::tool::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Protocol revision that defines the HTTP+SSE transport.
pub const PROTOCOL_VERSION: &str = "2024-11-05";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Requests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC 2.0 request (has an `id`, expects a response).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcRequest {
    pub jsonrpc: String,
    pub id: u64,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Option<Value>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 notification (no `id`, fire-and-forget).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcNotification {
    pub jsonrpc: String,
    pub method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub params: Option<Value>,
}

impl JsonRpcNotification {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            method: method.into(),
            params: None,
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Responses
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A JSON-RPC 2.0 response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcResponse {
    pub jsonrpc: String,
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<JsonRpcError>,
}

impl JsonRpcResponse {
    pub fn success(id: u64, result: Value) -> Self {
        Self {
            jsonrpc: "2.0".into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Extract the result value, returning an error if the response is an error.
    pub fn into_result(self) -> Result<Value, JsonRpcError> {
        if let Some(err) = self.error {
            Err(err)
        } else {
            Ok(self.result.unwrap_or(Value::Null))
        }
    }
}

/// A JSON-RPC 2.0 error object.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl std::fmt::Display for JsonRpcError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "JSON-RPC error {}: {}", self.code, self.message)
    }
}

impl std::error::Error for JsonRpcError {}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// MCP-specific payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Name and version exchanged during `initialize`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    #[serde(default)]
    pub version: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeParams {
    pub protocol_version: String,
    pub capabilities: Value,
    pub client_info: Implementation,
}

/// The parts of the `initialize` result the client looks at.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitializeResult {
    #[serde(default)]
    pub protocol_version: Option<String>,
    #[serde(default)]
    pub server_info: Option<Implementation>,
}

/// A single tool definition returned by `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct McpToolDef {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_schema")]
    pub input_schema: Value,
}

impl From<&McpToolDef> for ToolDefinition {
    fn from(def: &McpToolDef) -> Self {
        ToolDefinition {
            name: def.name.clone(),
            description: def.description.clone(),
            parameters: def.input_schema.clone(),
        }
    }
}

fn default_schema() -> Value {
    serde_json::json!({ "type": "object", "properties": {} })
}

/// The result payload from `tools/list`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsListResult {
    pub tools: Vec<McpToolDef>,
}

/// The result payload from `tools/call`.
///
/// `content` is kept as raw JSON: servers return a list of typed items
/// (text, image, resource) and the whole thing is handed to the model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ToolCallResult {
    #[serde(default)]
    pub content: Value,
    #[serde(default, rename = "isError", skip_serializing_if = "std::ops::Not::not")]
    pub is_error: bool,
}

impl ToolCallResult {
    /// Concatenated `text` items, for display.
    pub fn text(&self) -> String {
        self.content
            .as_array()
            .map(|items| {
                items
                    .iter()
                    .filter_map(|i| i.get("text").and_then(|t| t.as_str()))
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Helper constructors
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Build the `initialize` request parameters.
pub fn initialize_params(client_name: &str) -> InitializeParams {
    InitializeParams {
        protocol_version: PROTOCOL_VERSION.into(),
        capabilities: serde_json::json!({}),
        client_info: Implementation {
            name: client_name.into(),
            version: env!("CARGO_PKG_VERSION").into(),
        },
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialize_request_without_params() {
        let req = JsonRpcRequest::new(2, "tools/list", None);
        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":2"));
        assert!(!json.contains("params"));
    }

    #[test]
    fn serialize_notification() {
        let notif = JsonRpcNotification::new("notifications/initialized");
        let json = serde_json::to_string(&notif).unwrap();
        assert!(json.contains("\"method\":\"notifications/initialized\""));
        assert!(!json.contains("\"id\""));
    }

    #[test]
    fn deserialize_error_response() {
        let raw = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32601,"message":"Method not found"}}"#;
        let resp: JsonRpcResponse = serde_json::from_str(raw).unwrap();
        assert!(resp.is_error());
        let err = resp.into_result().unwrap_err();
        assert_eq!(err.to_string(), "JSON-RPC error -32601: Method not found");
    }

    #[test]
    fn notification_is_not_a_response() {
        let raw = r#"{"jsonrpc":"2.0","method":"notifications/progress","params":{}}"#;
        assert!(serde_json::from_str::<JsonRpcResponse>(raw).is_err());
    }

    #[test]
    fn tool_def_converts_to_definition() {
        let raw = r#"{ "tools": [
            { "name": "get_weather", "description": "Weather by city",
              "inputSchema": { "type": "object", "properties": { "city": { "type": "string" } } } },
            { "name": "ping" }
        ] }"#;
        let result: ToolsListResult = serde_json::from_str(raw).unwrap();
        let defs: Vec<ToolDefinition> = result.tools.iter().map(ToolDefinition::from).collect();
        assert_eq!(defs[0].name, "get_weather");
        assert_eq!(defs[0].parameters["properties"]["city"]["type"], "string");
        assert_eq!(defs[1].description, "");
        assert_eq!(defs[1].parameters["type"], "object");
    }

    #[test]
    fn tool_call_result_keeps_raw_content() {
        let raw = r#"{ "content": [
            { "type": "text", "text": "18C" },
            { "type": "text", "text": "sunny" }
        ] }"#;
        let result: ToolCallResult = serde_json::from_str(raw).unwrap();
        assert!(!result.is_error);
        assert_eq!(result.text(), "18C\nsunny");

        let back = serde_json::to_value(&result).unwrap();
        assert!(back.get("isError").is_none());
        assert_eq!(back["content"][1]["text"], "sunny");
    }

    #[test]
    fn is_error_flag_round_trips() {
        let raw = r#"{ "content": [{ "type": "text", "text": "not found" }], "isError": true }"#;
        let result: ToolCallResult = serde_json::from_str(raw).unwrap();
        assert!(result.is_error);
        assert_eq!(serde_json::to_value(&result).unwrap()["isError"], true);
    }

    #[test]
    fn initialize_params_carry_client_name() {
        let params = initialize_params("localchat");
        assert_eq!(params.protocol_version, PROTOCOL_VERSION);
        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["clientInfo"]["name"], "localchat");
    }
}
