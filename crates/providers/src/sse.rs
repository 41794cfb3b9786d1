//! SSE framing for the chat completions stream.
//!
//! - [`drain_data_lines`] pulls complete `data:` payloads out of a buffer
//! - [`sse_response_stream`] turns a response body into a [`BoxStream`] of
//!   parsed events

use lc_domain::error::{Error, Result};
use lc_domain::stream::{BoxStream, StreamEvent};

/// Extract complete `data:` payloads from an SSE buffer.
///
/// Events are delimited by a blank line. Only `data:` lines are kept;
/// `event:`, `id:` and `retry:` lines and `:` comments are skipped. Carriage
/// returns are stripped so `\r\n` framing behaves like `\n`.
///
/// The buffer is drained in place; a trailing partial event stays behind
/// for the next call.
pub(crate) fn drain_data_lines(buffer: &mut String) -> Vec<String> {
    if buffer.contains('\r') {
        *buffer = buffer.replace('\r', "");
    }

    let mut data_lines = Vec::new();

    while let Some(pos) = buffer.find("\n\n") {
        let block: String = buffer.drain(..pos).collect();
        buffer.drain(..2);

        for line in block.lines() {
            if let Some(data) = line.trim().strip_prefix("data:") {
                let data = data.trim();
                if !data.is_empty() {
                    data_lines.push(data.to_string());
                }
            }
        }
    }

    data_lines
}

/// Build a [`BoxStream`] from an SSE response and a parser closure.
///
/// The closure receives each `data:` payload and returns zero or more
/// events. Transport failures after the response headers arrived are
/// reported as [`Error::Stream`]. If the parser never produced a `Done`
/// event, one is appended when the body closes.
pub(crate) fn sse_response_stream<F>(
    response: reqwest::Response,
    mut parse_data: F,
) -> BoxStream<'static, Result<StreamEvent>>
where
    F: FnMut(&str) -> Vec<Result<StreamEvent>> + Send + 'static,
{
    let stream = async_stream::stream! {
        let mut response = response;
        let mut buffer = String::new();
        let mut done_emitted = false;

        loop {
            let data_lines = match response.chunk().await {
                Ok(Some(bytes)) => {
                    buffer.push_str(&String::from_utf8_lossy(&bytes));
                    drain_data_lines(&mut buffer)
                }
                Ok(None) => {
                    if buffer.trim().is_empty() {
                        break;
                    }
                    buffer.push_str("\n\n");
                    let lines = drain_data_lines(&mut buffer);
                    buffer.clear();
                    lines
                }
                Err(e) => {
                    yield Err(Error::Stream(e.to_string()));
                    return;
                }
            };

            for data in data_lines {
                for event in parse_data(&data) {
                    if matches!(&event, Ok(StreamEvent::Done { .. })) {
                        done_emitted = true;
                    }
                    yield event;
                }
            }
        }

        if !done_emitted {
            yield Ok(StreamEvent::Done {
                usage: None,
                finish_reason: Some("stop".into()),
            });
        }
    };

    Box::pin(stream)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
