//! MCP client: handshake, tool discovery and dispatch over one transport.

use std::time::Duration;

use serde_json::Value;

use lc_domain::config::McpConfig;
use lc_domain::error::{Error, Result};
use lc_domain::tool::{ToolDefinition, ToolProvider};
use lc_domain::trace::TraceEvent;

use crate::protocol::{self, InitializeResult, McpToolDef, ToolCallResult, ToolsListResult};
use crate::transport::{McpTransport, SseTransport, TransportError};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// McpClient
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A connection to one MCP server, or no server at all.
pub struct McpClient {
    endpoint: String,
    server_name: Option<String>,
    /// Tools discovered via `tools/list` during connect.
    tools: Vec<McpToolDef>,
    transport: Option<Box<dyn McpTransport>>,
}

impl McpClient {
    /// A client with no server: lists no tools, every call fails.
    pub fn empty() -> Self {
        Self {
            endpoint: String::new(),
            server_name: None,
            tools: Vec::new(),
            transport: None,
        }
    }

    /// Connect over HTTP+SSE, perform the handshake and discover tools.
    ///
    /// Returns an empty client when `[mcp] sse_url` is blank.
    pub async fn connect(config: &McpConfig) -> std::result::Result<Self, McpError> {
        if !config.is_enabled() {
            tracing::info!("no MCP endpoint configured, tools disabled");
            return Ok(Self::empty());
        }

        tracing::info!(sse_url = %config.sse_url, "connecting to MCP server");
        let timeout = Duration::from_millis(config.request_timeout_ms);
        let transport = SseTransport::connect(&config.sse_url, timeout).await?;
        Self::with_transport(Box::new(transport), &config.sse_url, &config.client_name).await
    }

    /// Like [`connect`](Self::connect), but a server that cannot be reached
    /// is logged and replaced by an empty client so chat still works.
    pub async fn connect_or_empty(config: &McpConfig) -> Self {
        match Self::connect(config).await {
            Ok(client) => client,
            Err(e) => {
                tracing::warn!(
                    sse_url = %config.sse_url,
                    error = %e,
                    "failed to initialize MCP client, continuing without tools"
                );
                Self::empty()
            }
        }
    }

    /// Run the handshake over an already-open transport.
    pub async fn with_transport(
        transport: Box<dyn McpTransport>,
        endpoint: &str,
        client_name: &str,
    ) -> std::result::Result<Self, McpError> {
        // Step 1: `initialize`.
        let params = serde_json::to_value(protocol::initialize_params(client_name))
            .map_err(|e| McpError::Protocol(format!("failed to serialize initialize params: {e}")))?;
        let init = transport
            .send_request("initialize", Some(params))
            .await?
            .into_result()
            .map_err(|e| McpError::Protocol(format!("initialize failed: {e}")))?;

        let init: InitializeResult = serde_json::from_value(init).unwrap_or(InitializeResult {
            protocol_version: None,
            server_info: None,
        });
        let server_name = init.server_info.map(|s| s.name);
        tracing::debug!(
            server = server_name.as_deref().unwrap_or("unknown"),
            protocol_version = init.protocol_version.as_deref().unwrap_or("unknown"),
            "MCP initialize response received"
        );

        // Step 2: `notifications/initialized`.
        transport
            .send_notification("notifications/initialized")
            .await?;

        // Step 3: `tools/list`. A failure here leaves the server connected
        // but toolless.
        let tools = match transport.send_request("tools/list", None).await?.into_result() {
            Ok(value) => match serde_json::from_value::<ToolsListResult>(value) {
                Ok(r) => r.tools,
                Err(e) => {
                    tracing::warn!(error = %e, "failed to parse tools/list result");
                    Vec::new()
                }
            },
            Err(e) => {
                tracing::warn!(error = %e, "tools/list returned error, server will have no tools");
                Vec::new()
            }
        };

        TraceEvent::McpConnected {
            endpoint: endpoint.to_string(),
            server_name: server_name.clone(),
            tool_count: tools.len(),
        }
        .emit();

        Ok(Self {
            endpoint: endpoint.to_string(),
            server_name,
            tools,
            transport: Some(transport),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn server_name(&self) -> Option<&str> {
        self.server_name.as_deref()
    }

    pub fn tools(&self) -> &[McpToolDef] {
        &self.tools
    }

    pub fn is_connected(&self) -> bool {
        self.transport.as_ref().is_some_and(|t| t.is_alive())
    }

    /// Call a tool via `tools/call`.
    pub async fn call(
        &self,
        tool_name: &str,
        arguments: Value,
    ) -> std::result::Result<ToolCallResult, McpError> {
        let transport = match &self.transport {
            Some(t) if t.is_alive() => t,
            _ => return Err(McpError::ServerDown(self.endpoint.clone())),
        };

        let params = serde_json::json!({
            "name": tool_name,
            "arguments": arguments,
        });

        let value = transport
            .send_request("tools/call", Some(params))
            .await?
            .into_result()
            .map_err(|e| McpError::Protocol(format!("tools/call failed: {e}")))?;

        serde_json::from_value::<ToolCallResult>(value)
            .map_err(|e| McpError::Protocol(format!("failed to parse tools/call result: {e}")))
    }

    pub async fn shutdown(&self) {
        if let Some(t) = &self.transport {
            tracing::info!(endpoint = %self.endpoint, "shutting down MCP client");
            t.shutdown().await;
        }
    }
}

#[async_trait::async_trait]
impl ToolProvider for McpClient {
    async fn list_tools(&self) -> Result<Vec<ToolDefinition>> {
        Ok(self.tools.iter().map(ToolDefinition::from).collect())
    }

    /// The whole `tools/call` result (`{content, isError?}`) is the payload;
    /// a server-side `isError` is still a successful round trip.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value> {
        let result = self.call(name, arguments).await.map_err(|e| Error::ToolExecution {
            tool: name.to_string(),
            message: e.to_string(),
        })?;
        Ok(serde_json::to_value(result)?)
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Errors specific to MCP operations.
#[derive(Debug, thiserror::Error)]
pub enum McpError {
    #[error("MCP transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("MCP protocol error: {0}")]
    Protocol(String),

    #[error("MCP server is not connected: {0}")]
    ServerDown(String),
}

impl From<McpError> for Error {
    fn from(e: McpError) -> Self {
        match e {
            McpError::Transport(TransportError::Timeout) => Error::Timeout(e.to_string()),
            other => Error::Other(other.to_string()),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
