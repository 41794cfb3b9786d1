//! `localchat history` and `localchat clear`.

use lc_domain::config::Config;
use lc_domain::message::{MessageRole, StoredMessage};
use lc_store::MessageStore;

use crate::bootstrap;

pub async fn history(config: &Config, json: bool) -> anyhow::Result<()> {
    let store = bootstrap::open_store(config).await?;
    let messages = store.find_many().await?;
    store.close().await;

    if json {
        println!("{}", serde_json::to_string_pretty(&messages)?);
        return Ok(());
    }
    if messages.is_empty() {
        eprintln!("(no messages)");
    }
    for msg in &messages {
        println!("{}", render_message(msg));
    }
    Ok(())
}

pub async fn clear(config: &Config) -> anyhow::Result<()> {
    let store = bootstrap::open_store(config).await?;
    let count = store.find_many().await?.len();
    store.delete_all().await?;
    store.close().await;
    println!("Deleted {count} message(s).");
    Ok(())
}

/// One transcript line: `role: text`, with the tool name and result for
/// tool messages.
pub fn render_message(msg: &StoredMessage) -> String {
    let text = match &msg.content {
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    };
    match msg.role {
        MessageRole::Tool => {
            let name = msg.tool_name.as_deref().unwrap_or("?");
            match &msg.tool_result {
                Some(result) => format!("tool[{name}]: {text} {result}"),
                None => format!("tool[{name}]: {text}"),
            }
        }
        role => format!("{role}: {text}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lc_domain::message::{timestamp_now, MessagePatch, NewMessage};
    use serde_json::json;

    fn from_new(new: NewMessage) -> StoredMessage {
        let now = timestamp_now();
        StoredMessage {
            id: "m".into(),
            role: new.role,
            content: new.content,
            tool_name: new.tool_name,
            tool_args: new.tool_args,
            tool_result: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn renders_chat_messages() {
        assert_eq!(render_message(&from_new(NewMessage::user("hi"))), "user: hi");
        assert_eq!(
            render_message(&from_new(NewMessage::assistant("hello"))),
            "assistant: hello"
        );
    }

    #[test]
    fn renders_tool_messages_with_result() {
        let mut msg = from_new(NewMessage::tool_call("get_weather", json!({"city": "Paris"})));
        assert_eq!(render_message(&msg), "tool[get_weather]: Calling tool: get_weather");

        msg.apply(&MessagePatch::tool_completed(json!({"content": "18C"})));
        assert_eq!(
            render_message(&msg),
            "tool[get_weather]: Tool result {\"content\":\"18C\"}"
        );
    }
}
