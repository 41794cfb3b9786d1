//! `localchat realtime`: the client events a voice session starts with.

use serde_json::{json, Value};

use lc_domain::config::Config;
use lc_domain::tool::ToolDefinition;
use lc_mcp_client::McpClient;
use lc_runtime::realtime::{session_create_body, session_update_event};

/// Print the session-creation body for the configured realtime model and
/// the `session.update` event carrying the MCP tools.
pub async fn session(config: &Config) -> anyhow::Result<()> {
    let mcp = McpClient::connect_or_empty(&config.mcp).await;
    let tools: Vec<ToolDefinition> = mcp.tools().iter().map(ToolDefinition::from).collect();
    mcp.shutdown().await;

    let out = session_events(config, &tools);
    println!("{}", serde_json::to_string_pretty(&out)?);
    Ok(())
}

fn session_events(config: &Config, tools: &[ToolDefinition]) -> Value {
    json!({
        "session": session_create_body(&config.llm.realtime_model),
        "session_update": session_update_event(tools),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_uses_configured_realtime_model() {
        let mut config = Config::default();
        config.llm.realtime_model = "voice-model".into();
        let tools = vec![ToolDefinition {
            name: "get_weather".into(),
            description: "Weather by city".into(),
            parameters: json!({"type": "object"}),
        }];

        let out = session_events(&config, &tools);
        assert_eq!(out["session"]["model"], "voice-model");
        assert_eq!(out["session_update"]["type"], "session.update");
        assert_eq!(out["session_update"]["session"]["tools"][0]["name"], "get_weather");
    }
}
