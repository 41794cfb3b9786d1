//! Reassembles streamed tool-call fragments into complete calls.
//!
//! Fragments are addressed by stream index. Different indices may be
//! interleaved; the fragments of one index arrive in order, and their
//! argument pieces are concatenated exactly as received.

use std::collections::HashMap;

use serde_json::Value;

use lc_domain::error::{Error, Result};
use lc_domain::stream::ToolCallFragment;
use lc_domain::tool::ToolCall;

/// A tool call still being streamed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingToolCall {
    pub index: u32,
    pub id: Option<String>,
    pub name: Option<String>,
    pub kind: Option<String>,
    pub arguments_text: String,
}

/// A call that survived finalization. `arguments` is the parsed argument
/// object, or the parse failure scoped to this call alone.
#[derive(Debug)]
pub struct FinalizedCall {
    pub call_id: String,
    pub tool_name: String,
    pub raw_arguments: String,
    pub arguments: Result<Value>,
}

impl FinalizedCall {
    /// The provider-agnostic call, if the arguments parsed.
    pub fn to_tool_call(&self) -> Option<ToolCall> {
        let arguments = self.arguments.as_ref().ok()?;
        Some(ToolCall {
            call_id: self.call_id.clone(),
            tool_name: self.tool_name.clone(),
            arguments: arguments.clone(),
        })
    }
}

#[derive(Debug, Default)]
pub struct ToolCallAccumulator {
    /// Pending calls in first-sighting order.
    calls: Vec<PendingToolCall>,
    positions: HashMap<u32, usize>,
}

impl ToolCallAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, fragment: &ToolCallFragment) {
        let pos = match self.positions.get(&fragment.index) {
            Some(&pos) => pos,
            None => {
                self.calls.push(PendingToolCall {
                    index: fragment.index,
                    ..Default::default()
                });
                let pos = self.calls.len() - 1;
                self.positions.insert(fragment.index, pos);
                pos
            }
        };
        let call = &mut self.calls[pos];

        overwrite_if_present(&mut call.id, &fragment.id);
        overwrite_if_present(&mut call.name, &fragment.name);
        overwrite_if_present(&mut call.kind, &fragment.kind);
        if let Some(args) = &fragment.arguments {
            call.arguments_text.push_str(args);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }

    pub fn pending(&self) -> &[PendingToolCall] {
        &self.calls
    }

    /// Finalize every pending call, in first-sighting order.
    ///
    /// Calls that never received an id or a name are dropped.
    pub fn finish(self) -> Vec<FinalizedCall> {
        self.calls
            .into_iter()
            .filter_map(|pending| {
                let (Some(call_id), Some(tool_name)) = (pending.id, pending.name) else {
                    tracing::debug!(
                        index = pending.index,
                        arguments_chars = pending.arguments_text.len(),
                        "dropping tool call without id or name"
                    );
                    return None;
                };
                let arguments = parse_arguments(&call_id, &tool_name, &pending.arguments_text);
                Some(FinalizedCall {
                    call_id,
                    tool_name,
                    raw_arguments: pending.arguments_text,
                    arguments,
                })
            })
            .collect()
    }
}

fn overwrite_if_present(slot: &mut Option<String>, value: &Option<String>) {
    if let Some(v) = value {
        if !v.is_empty() {
            *slot = Some(v.clone());
        }
    }
}

fn parse_arguments(call_id: &str, tool_name: &str, text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(text).map_err(|source| Error::ArgumentParse {
        call_id: call_id.to_owned(),
        tool: tool_name.to_owned(),
        source,
    })
}
