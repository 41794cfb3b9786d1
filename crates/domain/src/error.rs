/// Shared error type used across all localchat crates.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("IO: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP: {0}")]
    Http(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("provider {provider}: {message}")]
    Provider { provider: String, message: String },

    /// The model stream failed after it was opened.
    #[error("stream: {0}")]
    Stream(String),

    #[error("tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    /// Accumulated tool-call arguments were not valid JSON.
    #[error("invalid arguments for tool call {call_id} ({tool}): {source}")]
    ArgumentParse {
        call_id: String,
        tool: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("persistence: {0}")]
    Persistence(String),

    #[error("config: {0}")]
    Config(String),

    #[error("auth: {0}")]
    Auth(String),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
