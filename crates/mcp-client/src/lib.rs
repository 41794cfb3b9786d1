//! `lc-mcp-client`: MCP (Model Context Protocol) client for localchat.
//!
//! This crate provides:
//! - JSON-RPC 2.0 protocol types for talking to an MCP server.
//! - An HTTP+SSE transport: one long-lived `GET` event stream carries
//!   responses, requests are `POST`ed to the endpoint the server announces.
//! - [`McpClient`], which performs the handshake, discovers tools and
//!   implements the domain `ToolProvider` trait.
//!
//! # Usage
//!
//! ```rust,ignore
//! use lc_mcp_client::McpClient;
//!
//! let client = McpClient::connect_or_empty(&config.mcp).await;
//! for tool in client.tools() {
//!     println!("{}", tool.name);
//! }
//! let result = client.call("get_weather", json!({"city": "Paris"})).await?;
//! ```

pub mod client;
pub mod protocol;
pub(crate) mod sse;
pub mod transport;

// Re-exports for convenience.
pub use client::{McpClient, McpError};
pub use lc_domain::config::McpConfig;
pub use protocol::{McpToolDef, ToolCallResult};
pub use transport::{McpTransport, SseTransport, TransportError};
