//! Turn execution: the orchestrator that streams the model response,
//! dispatches tool calls, and persists the transcript as it goes.
//!
//! A turn moves through `Streaming1 → (ExecutingTools → Streaming2)? →
//! Finalizing`. Every store write is mirrored into the transcript cache
//! before the next step runs.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use parking_lot::RwLock;
use serde_json::Value;
use tokio::sync::{broadcast, Mutex};
use tracing::Instrument;

use lc_domain::config::LlmConfig;
use lc_domain::error::{Error, Result};
use lc_domain::message::{MessagePatch, NewMessage, StoredMessage};
use lc_domain::stream::{StreamEvent, Usage};
use lc_domain::tool::{Message, ToolCall, ToolDefinition, ToolProvider};
use lc_domain::trace::TraceEvent;
use lc_providers::{ChatRequest, LlmProvider};
use lc_store::{CacheMutation, MessageStore, TranscriptCache};

use crate::accumulator::{FinalizedCall, ToolCallAccumulator};
use crate::cancel::{CancelSlot, CancelToken};
use crate::events::{TurnEvent, TurnOutcome, TurnStatus};
use crate::history::{build_history, tool_result_pair};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Construction
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The collaborators a turn talks to.
#[derive(Clone)]
pub struct OrchestratorDeps {
    pub provider: Arc<dyn LlmProvider>,
    pub tools: Arc<dyn ToolProvider>,
    pub store: Arc<dyn MessageStore>,
}

/// Per-request model settings. `None` lets the provider choose.
#[derive(Debug, Clone, Default)]
pub struct TurnOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl From<&LlmConfig> for TurnOptions {
    fn from(cfg: &LlmConfig) -> Self {
        Self {
            model: Some(cfg.model.clone()),
            temperature: cfg.temperature,
            max_tokens: cfg.max_tokens,
        }
    }
}

const EVENT_CHANNEL_CAPACITY: usize = 256;

pub struct TurnOrchestrator {
    provider: Arc<dyn LlmProvider>,
    tools: Arc<dyn ToolProvider>,
    store: Arc<dyn MessageStore>,
    cache: Arc<TranscriptCache>,
    options: TurnOptions,
    tool_defs: RwLock<Vec<ToolDefinition>>,
    cancel: CancelSlot,
    /// Held for the whole of a turn, and by `clear`. A cancelled turn keeps
    /// it until its partial text is persisted.
    turn_lock: Mutex<()>,
    live_text: RwLock<String>,
    event_tx: broadcast::Sender<TurnEvent>,
}

/// How a streaming phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PhaseEnd {
    Finished,
    Cancelled,
}

impl TurnOrchestrator {
    pub fn new(deps: OrchestratorDeps, cache: Arc<TranscriptCache>) -> Self {
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            provider: deps.provider,
            tools: deps.tools,
            store: deps.store,
            cache,
            options: TurnOptions::default(),
            tool_defs: RwLock::new(Vec::new()),
            cancel: CancelSlot::new(),
            turn_lock: Mutex::new(()),
            live_text: RwLock::new(String::new()),
            event_tx,
        }
    }

    pub fn with_options(mut self, options: TurnOptions) -> Self {
        self.options = options;
        self
    }

    /// Fetch the tool schemas offered on every first stream. A failing tool
    /// provider leaves the chat usable without tools.
    pub async fn load_tools(&self) -> usize {
        match self.tools.list_tools().await {
            Ok(defs) => {
                let count = defs.len();
                tracing::info!(count, "tools loaded");
                *self.tool_defs.write() = defs;
                count
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to list tools, continuing without tools");
                self.tool_defs.write().clear();
                0
            }
        }
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tool_defs.read().clone()
    }

    /// Load the stored transcript into the cache.
    pub async fn hydrate(&self) -> Result<usize> {
        let messages = self.store.find_many().await?;
        let count = messages.len();
        self.cache.apply(CacheMutation::Replace(messages));
        tracing::debug!(count, "transcript hydrated");
        Ok(count)
    }

    /// Empty the conversation: the cache first, then the store. A running
    /// turn is cancelled and allowed to finish writing before anything is
    /// deleted.
    pub async fn clear(&self) -> Result<()> {
        self.cancel.cancel();
        let _turn = self.turn_lock.lock().await;
        self.cache.apply(CacheMutation::Clear);
        self.store.delete_all().await?;
        tracing::info!("conversation cleared");
        Ok(())
    }

    /// Cancel the turn in flight. Returns false when none is running.
    pub fn cancel(&self) -> bool {
        self.cancel.cancel()
    }

    pub fn is_running(&self) -> bool {
        self.cancel.is_running()
    }

    /// The assistant text streamed so far in the current turn.
    pub fn live_text(&self) -> String {
        self.live_text.read().clone()
    }

    pub fn cache(&self) -> &Arc<TranscriptCache> {
        &self.cache
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.event_tx.subscribe()
    }

    fn emit(&self, event: TurnEvent) {
        let _ = self.event_tx.send(event);
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // send: one turn
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Run one turn for `user_input`.
    ///
    /// A cancelled turn is not an error: it returns a
    /// [`TurnStatus::Cancelled`] outcome with the partial text persisted.
    /// A turn already in flight is cancelled, and this one starts only
    /// after it has finalized.
    pub async fn send(&self, user_input: &str) -> Result<TurnOutcome> {
        let (generation, token) = self.cancel.register();
        let _turn = self.turn_lock.lock().await;
        let turn_id = uuid::Uuid::new_v4().to_string();
        let started = Instant::now();
        self.live_text.write().clear();

        let span = tracing::info_span!("turn", %turn_id);
        let result = self
            .run_turn(&turn_id, user_input, &token)
            .instrument(span)
            .await;

        self.cancel.finish(generation);
        self.live_text.write().clear();

        let duration_ms = started.elapsed().as_millis() as u64;
        match &result {
            Ok(outcome) => {
                TraceEvent::TurnFinished {
                    turn_id: turn_id.clone(),
                    outcome: outcome.status.as_str().into(),
                    text_chars: outcome.text.len(),
                    tool_calls: outcome.tool_calls,
                    duration_ms,
                }
                .emit();
                self.emit(match outcome.status {
                    TurnStatus::Completed => TurnEvent::Final {
                        content: outcome.text.clone(),
                    },
                    TurnStatus::Cancelled => TurnEvent::Stopped {
                        content: outcome.text.clone(),
                    },
                });
            }
            Err(e) => {
                tracing::warn!(%turn_id, error = %e, "turn failed");
                TraceEvent::TurnFinished {
                    turn_id: turn_id.clone(),
                    outcome: "failed".into(),
                    text_chars: 0,
                    tool_calls: 0,
                    duration_ms,
                }
                .emit();
                self.emit(TurnEvent::Error {
                    message: e.to_string(),
                });
            }
        }
        result
    }

    async fn run_turn(
        &self,
        turn_id: &str,
        user_input: &str,
        token: &CancelToken,
    ) -> Result<TurnOutcome> {
        // The history is taken before the user message lands in the cache,
        // so the input appears exactly once, last.
        let prior = self.cache.snapshot();
        self.persist(NewMessage::user(user_input)).await?;
        let history = build_history(&prior, user_input);
        let tools = self.tool_definitions();

        TraceEvent::TurnStarted {
            turn_id: turn_id.to_owned(),
            input_chars: user_input.len(),
            history_len: history.len(),
            tools_offered: tools.len(),
        }
        .emit();

        // ── Streaming1 ──────────────────────────────────────────────
        let mut text = String::new();
        let mut accumulator = ToolCallAccumulator::new();
        let end = self
            .stream_phase(1, history.clone(), tools, Some(token), &mut text, Some(&mut accumulator))
            .await?;
        if end == PhaseEnd::Cancelled {
            return self.finalize(text, TurnStatus::Cancelled, 0).await;
        }

        let calls = accumulator.finish();
        if calls.is_empty() {
            return self.finalize(text, TurnStatus::Completed, 0).await;
        }

        // ── ExecutingTools ──────────────────────────────────────────
        let mut follow_up = history;
        let mut executed = 0;
        let mut pairs = 0;
        for call in calls {
            if token.is_cancelled() {
                tracing::debug!(executed, "cancelled between tool calls");
                return self.finalize(text, TurnStatus::Cancelled, executed).await;
            }
            let pair = self.execute_call(turn_id, call).await?;
            executed += 1;
            if let Some(pair) = pair {
                follow_up.extend(pair);
                pairs += 1;
            }
        }
        if token.is_cancelled() {
            return self.finalize(text, TurnStatus::Cancelled, executed).await;
        }

        // ── Streaming2 ──────────────────────────────────────────────
        if pairs > 0 {
            self.stream_phase(2, follow_up, Vec::new(), None, &mut text, None)
                .await?;
        } else {
            tracing::debug!("no tool results to report, skipping follow-up stream");
        }

        self.finalize(text, TurnStatus::Completed, executed).await
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Streaming
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Stream one model response into `text`. Only a phase given a token
    /// can be cancelled; only a phase given an accumulator collects tool
    /// calls.
    async fn stream_phase(
        &self,
        phase: u8,
        messages: Vec<Message>,
        tools: Vec<ToolDefinition>,
        cancel: Option<&CancelToken>,
        text: &mut String,
        accumulator: Option<&mut ToolCallAccumulator>,
    ) -> Result<PhaseEnd> {
        let req = ChatRequest {
            messages,
            tools,
            temperature: self.options.temperature,
            max_tokens: self.options.max_tokens,
            model: self.options.model.clone(),
        };
        let model = req
            .model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_owned());

        let span = tracing::info_span!(
            "llm.call",
            provider = %self.provider.provider_id(),
            model = %model,
            phase,
            input_tokens = tracing::field::Empty,
            output_tokens = tracing::field::Empty,
        );
        let started = Instant::now();
        let (end, usage) = self
            .consume_stream(&req, cancel, text, accumulator)
            .instrument(span.clone())
            .await?;

        if let Some(u) = &usage {
            span.record("input_tokens", u.prompt_tokens);
            span.record("output_tokens", u.completion_tokens);
        }
        TraceEvent::LlmRequest {
            provider: self.provider.provider_id().to_owned(),
            model,
            phase,
            duration_ms: started.elapsed().as_millis() as u64,
            prompt_tokens: usage.as_ref().map(|u| u.prompt_tokens),
            completion_tokens: usage.as_ref().map(|u| u.completion_tokens),
        }
        .emit();
        Ok(end)
    }

    async fn consume_stream(
        &self,
        req: &ChatRequest,
        cancel: Option<&CancelToken>,
        text: &mut String,
        mut accumulator: Option<&mut ToolCallAccumulator>,
    ) -> Result<(PhaseEnd, Option<Usage>)> {
        let mut stream = match cancel {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => return Ok((PhaseEnd::Cancelled, None)),
                opened = self.provider.chat_stream(req) => opened?,
            },
            None => self.provider.chat_stream(req).await?,
        };

        let mut usage: Option<Usage> = None;
        loop {
            let next = match cancel {
                Some(token) => tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        tracing::debug!(chars = text.len(), "stream cancelled");
                        return Ok((PhaseEnd::Cancelled, usage));
                    }
                    next = stream.next() => next,
                },
                None => stream.next().await,
            };
            let Some(event) = next else { break };

            match event? {
                StreamEvent::Token { text: delta } => {
                    text.push_str(&delta);
                    self.live_text.write().push_str(&delta);
                    self.emit(TurnEvent::AssistantDelta { text: delta });
                }
                StreamEvent::ToolCallDelta(fragment) => match accumulator.as_mut() {
                    Some(acc) => acc.push(&fragment),
                    None => tracing::debug!(
                        index = fragment.index,
                        "ignoring tool-call fragment in follow-up stream"
                    ),
                },
                StreamEvent::Done {
                    usage: done_usage,
                    finish_reason,
                } => {
                    tracing::debug!(?finish_reason, "stream done");
                    if done_usage.is_some() {
                        usage = done_usage;
                    }
                }
                StreamEvent::Error { message } => return Err(Error::Stream(message)),
            }
        }
        Ok((PhaseEnd::Finished, usage))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Tool execution
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    /// Record and run one finalized call. Returns the history pair to send
    /// back to the model when the tool succeeded.
    async fn execute_call(&self, turn_id: &str, call: FinalizedCall) -> Result<Option<[Message; 2]>> {
        let FinalizedCall {
            call_id,
            tool_name,
            raw_arguments,
            arguments,
        } = call;

        TraceEvent::ToolCallFinalized {
            turn_id: turn_id.to_owned(),
            call_id: call_id.clone(),
            tool_name: tool_name.clone(),
            arguments_chars: raw_arguments.len(),
            parse_ok: arguments.is_ok(),
        }
        .emit();

        // Unparseable arguments are recorded as the raw text.
        let recorded_args = match &arguments {
            Ok(value) => value.clone(),
            Err(_) => Value::String(raw_arguments),
        };
        let pending = self
            .persist(NewMessage::tool_call(tool_name.clone(), recorded_args.clone()))
            .await?;
        self.emit(TurnEvent::ToolCall {
            call_id: call_id.clone(),
            tool_name: tool_name.clone(),
            arguments: recorded_args,
            message_id: pending.id.clone(),
        });

        let started = Instant::now();
        let outcome = match arguments {
            Ok(args) => {
                let span = tracing::info_span!("tool.call", tool = %tool_name, %call_id);
                self.tools.call_tool(&tool_name, args).instrument(span).await
            }
            Err(e) => Err(e),
        };
        let success = outcome.is_ok();
        let patch = match &outcome {
            Ok(result) => MessagePatch::tool_completed(result.clone()),
            Err(e) => {
                tracing::warn!(tool = %tool_name, %call_id, error = %e, "tool call failed");
                MessagePatch::tool_failed(e)
            }
        };
        self.update(&pending.id, patch).await?;

        TraceEvent::ToolCompleted {
            turn_id: turn_id.to_owned(),
            call_id: call_id.clone(),
            tool_name: tool_name.clone(),
            success,
            duration_ms: started.elapsed().as_millis() as u64,
        }
        .emit();

        let stored = self
            .store
            .find_by_id(&pending.id)
            .await?
            .ok_or_else(|| {
                Error::Persistence(format!("tool message {} missing after update", pending.id))
            })?;
        let result = stored.tool_result.clone().unwrap_or(Value::Null);
        self.emit(TurnEvent::ToolResult {
            call_id: call_id.clone(),
            tool_name: tool_name.clone(),
            content: result.clone(),
            is_error: !success,
        });

        if !success || stored.tool_result.is_none() {
            return Ok(None);
        }
        let declared = ToolCall {
            call_id,
            tool_name: stored.tool_name.unwrap_or(tool_name),
            arguments: stored
                .tool_args
                .unwrap_or_else(|| Value::Object(Default::default())),
        };
        Ok(Some(tool_result_pair(&declared, &result)))
    }

    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
    // Persistence (store write, then cache mirror)
    // ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

    async fn persist(&self, message: NewMessage) -> Result<StoredMessage> {
        let stored = self.store.insert(message).await?;
        self.cache.apply(CacheMutation::Append(stored.clone()));
        Ok(stored)
    }

    async fn update(&self, id: &str, patch: MessagePatch) -> Result<()> {
        self.store.update_by_id(id, &patch).await?;
        if !self.cache.apply(CacheMutation::Patch {
            id: id.to_owned(),
            patch,
        }) {
            tracing::warn!(message_id = %id, "updated message is not in the transcript cache");
        }
        Ok(())
    }

    async fn finalize(
        &self,
        text: String,
        status: TurnStatus,
        tool_calls: usize,
    ) -> Result<TurnOutcome> {
        let message_id = if text.is_empty() {
            None
        } else {
            Some(self.persist(NewMessage::assistant(text.clone())).await?.id)
        };
        Ok(TurnOutcome {
            status,
            text,
            tool_calls,
            message_id,
        })
    }
}
