//! End-to-end check of the HTTP+SSE transport against a minimal in-process
//! MCP server: one event-stream connection, then one connection per POST.

use lc_domain::config::McpConfig;
use lc_domain::tool::ToolProvider;
use lc_mcp_client::McpClient;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// Read one HTTP request; returns (request line, body).
async fn read_request(sock: &mut TcpStream) -> (String, String) {
    let mut raw = Vec::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = sock.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&buf[..n]);
        let text = String::from_utf8_lossy(&raw).to_string();
        if let Some(header_end) = text.find("\r\n\r\n") {
            let content_length = text[..header_end]
                .lines()
                .find_map(|l| {
                    let (k, v) = l.split_once(':')?;
                    k.eq_ignore_ascii_case("content-length")
                        .then(|| v.trim().parse::<usize>().ok())?
                })
                .unwrap_or(0);
            if raw.len() >= header_end + 4 + content_length {
                let request_line = text.lines().next().unwrap_or_default().to_string();
                let body = text[header_end + 4..].to_string();
                return (request_line, body);
            }
        }
    }
    (String::new(), String::new())
}

fn answer(msg: &Value, id: u64) -> Option<Value> {
    let result = match msg["method"].as_str().unwrap_or_default() {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "capabilities": { "tools": {} },
            "serverInfo": { "name": "test-weather", "version": "0.0.1" }
        }),
        "tools/list" => json!({ "tools": [{
            "name": "get_weather",
            "description": "Current weather for a city",
            "inputSchema": { "type": "object", "properties": { "city": { "type": "string" } } }
        }] }),
        // `slow_tool` never answers.
        "tools/call" if msg["params"]["name"] == "slow_tool" => return None,
        "tools/call" => json!({ "content": [{ "type": "text", "text": "18C, sunny" }] }),
        _ => return None,
    };
    Some(json!({ "jsonrpc": "2.0", "id": id, "result": result }))
}

/// Spawn the fake server; returns its SSE URL.
async fn spawn_server() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (mut events, _) = listener.accept().await.unwrap();
        let (request_line, _) = read_request(&mut events).await;
        assert!(request_line.starts_with("GET /sse"));
        events
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/event-stream\r\nConnection: close\r\n\r\n\
                  event: endpoint\ndata: /messages?sessionId=test\n\n",
            )
            .await
            .unwrap();

        loop {
            let Ok((mut post, _)) = listener.accept().await else {
                break;
            };
            let (request_line, body) = read_request(&mut post).await;
            assert!(request_line.starts_with("POST /messages?sessionId=test"));
            post.write_all(b"HTTP/1.1 202 Accepted\r\nContent-Length: 8\r\nConnection: close\r\n\r\nAccepted")
                .await
                .unwrap();
            let _ = post.shutdown().await;

            let msg: Value = serde_json::from_str(&body).unwrap();
            let Some(id) = msg.get("id").and_then(|v| v.as_u64()) else {
                continue; // notification
            };
            if let Some(reply) = answer(&msg, id) {
                let frame = format!("event: message\ndata: {reply}\n\n");
                if events.write_all(frame.as_bytes()).await.is_err() {
                    break;
                }
            }
        }
    });

    format!("http://{addr}/sse")
}

#[tokio::test]
async fn handshake_discovery_and_call_over_sse() {
    let config = McpConfig {
        sse_url: spawn_server().await,
        request_timeout_ms: 5_000,
        ..Default::default()
    };

    let client = McpClient::connect(&config).await.unwrap();
    assert!(client.is_connected());
    assert_eq!(client.server_name(), Some("test-weather"));

    let tools = client.list_tools().await.unwrap();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "get_weather");
    assert_eq!(tools[0].parameters["properties"]["city"]["type"], "string");

    let result = client
        .call_tool("get_weather", json!({ "city": "Paris" }))
        .await
        .unwrap();
    assert_eq!(result["content"][0]["text"], "18C, sunny");

    client.shutdown().await;
    assert!(!client.is_connected());
}

#[tokio::test]
async fn unanswered_request_times_out_as_tool_error() {
    let config = McpConfig {
        sse_url: spawn_server().await,
        request_timeout_ms: 300,
        ..Default::default()
    };
    let client = McpClient::connect(&config).await.unwrap();

    let err = client
        .call_tool("slow_tool", json!({}))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("timeout"), "{err}");

    // The session survives a timed-out request.
    let ok = client.call_tool("get_weather", json!({ "city": "Oslo" })).await;
    assert!(ok.is_ok());
}
