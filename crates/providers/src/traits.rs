use lc_domain::error::Result;
use lc_domain::stream::{BoxStream, StreamEvent};
use lc_domain::tool::{Message, ToolDefinition};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A provider-agnostic streaming chat request.
#[derive(Debug, Clone, Default)]
pub struct ChatRequest {
    /// The conversation messages to send.
    pub messages: Vec<Message>,
    /// Tool definitions the model may invoke. Empty means no tools are
    /// offered and the field is omitted from the wire request.
    pub tools: Vec<ToolDefinition>,
    /// Sampling temperature (0.0 to 2.0). `None` lets the provider choose.
    pub temperature: Option<f32>,
    /// Maximum tokens in the response. `None` lets the provider choose.
    pub max_tokens: Option<u32>,
    /// Model identifier override. When `None`, the provider uses its default.
    pub model: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Core provider trait
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// A model endpoint that streams chat completions.
///
/// The returned stream is lazy: nothing is read until it is polled, and
/// dropping it closes the underlying connection. That is what makes
/// cancellation work without any provider cooperation.
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Open a streaming chat completion.
    ///
    /// Errors returned here happened before the first fragment (connect,
    /// auth, non-2xx status). Failures after that arrive as `Err` items.
    async fn chat_stream(
        &self,
        req: &ChatRequest,
    ) -> Result<BoxStream<'static, Result<StreamEvent>>>;

    /// A unique identifier for this provider instance.
    fn provider_id(&self) -> &str;

    /// The model used when a request does not name one.
    fn default_model(&self) -> &str;
}
