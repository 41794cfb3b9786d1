//! Event framing for the MCP server's SSE stream.
//!
//! Unlike the model stream, the event name matters here: the server first
//! sends an `endpoint` event, then one `message` event per JSON-RPC message.

/// One dispatched SSE event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SseEvent {
    /// The `event:` field, `"message"` when absent.
    pub event: String,
    /// All `data:` lines of the event joined with `\n`.
    pub data: String,
}

/// Pull complete events out of `buffer`, leaving any partial event behind.
/// Events with no `data:` lines are dropped.
pub(crate) fn drain_events(buffer: &mut String) -> Vec<SseEvent> {
    if buffer.contains('\r') {
        *buffer = buffer.replace('\r', "");
    }

    let mut events = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos + 2).collect();

        let mut event = None;
        let mut data: Vec<&str> = Vec::new();
        for line in block.lines() {
            if line.starts_with(':') {
                continue;
            }
            let (field, value) = match line.split_once(':') {
                Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
                None => (line, ""),
            };
            match field {
                "event" => event = Some(value.to_string()),
                "data" => data.push(value),
                _ => {}
            }
        }

        if !data.is_empty() {
            events.push(SseEvent {
                event: event.unwrap_or_else(|| "message".into()),
                data: data.join("\n"),
            });
        }
    }

    events
}
