use lc_domain::config::Config;
use lc_mcp_client::McpClient;

/// List the tools the configured MCP server offers. Unlike chat, an
/// unreachable server is an error here.
pub async fn list(config: &Config) -> anyhow::Result<()> {
    if !config.mcp.is_enabled() {
        println!("No MCP server configured ([mcp] sse_url is empty).");
        return Ok(());
    }

    let client = McpClient::connect(&config.mcp).await?;
    let server = client.server_name().unwrap_or("unnamed server");
    println!("{} tool(s) from {server} ({})", client.tools().len(), client.endpoint());
    for tool in client.tools() {
        println!("  {:<24} {}", tool.name, tool.description);
    }
    client.shutdown().await;
    Ok(())
}
