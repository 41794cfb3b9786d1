//! `[mcp]` section: the tool-provider endpoint. The client itself lives in
//! the `lc-mcp-client` crate.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpConfig {
    /// SSE endpoint of the MCP server. Empty disables tools.
    #[serde(default = "d_sse_url")]
    pub sse_url: String,
    /// Per JSON-RPC request timeout.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Name reported in the `initialize` handshake.
    #[serde(default = "d_client_name")]
    pub client_name: String,
}

impl Default for McpConfig {
    fn default() -> Self {
        Self {
            sse_url: d_sse_url(),
            request_timeout_ms: d_request_timeout_ms(),
            client_name: d_client_name(),
        }
    }
}

impl McpConfig {
    pub fn is_enabled(&self) -> bool {
        !self.sse_url.trim().is_empty()
    }
}

fn d_sse_url() -> String {
    "http://localhost:3000/sse".into()
}
fn d_request_timeout_ms() -> u64 {
    30_000
}
fn d_client_name() -> String {
    "localchat".into()
}
