use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Model endpoint
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// The OpenAI-compatible chat endpoint used for both streams of a turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "d_base_url")]
    pub base_url: String,
    #[serde(default = "d_model")]
    pub model: String,
    #[serde(default)]
    pub temperature: Option<f32>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Whole-request timeout, including the time spent streaming.
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Model advertised in realtime (voice) sessions.
    #[serde(default = "d_realtime_model")]
    pub realtime_model: String,
    #[serde(default)]
    pub auth: AuthConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: d_base_url(),
            model: d_model(),
            temperature: None,
            max_tokens: None,
            timeout_ms: d_timeout_ms(),
            realtime_model: d_realtime_model(),
            auth: AuthConfig::default(),
        }
    }
}

/// Where the API key comes from. Resolution order: `key`, then the
/// keychain entry (`service` + `account`), then the `env` variable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Header name (e.g. "Authorization", "api-key").
    #[serde(default = "d_header")]
    pub header: String,
    /// Header value prefix (e.g. "Bearer ").
    #[serde(default = "d_prefix")]
    pub prefix: String,
    /// Env var containing the key.
    #[serde(default = "d_env")]
    pub env: Option<String>,
    /// Direct key (for config-only setups; prefer env or the keychain).
    #[serde(default)]
    pub key: Option<String>,
    /// Keychain service name (e.g., "localchat").
    #[serde(default)]
    pub service: Option<String>,
    /// Keychain account name (e.g., "openai-api-key").
    #[serde(default)]
    pub account: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            header: d_header(),
            prefix: d_prefix(),
            env: d_env(),
            key: None,
            service: None,
            account: None,
        }
    }
}

// ── serde default helpers ───────────────────────────────────────────

fn d_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn d_model() -> String {
    "gpt-4o-mini".into()
}
fn d_timeout_ms() -> u64 {
    120_000
}
fn d_realtime_model() -> String {
    "gpt-4o-mini-realtime-preview".into()
}
fn d_header() -> String {
    "Authorization".into()
}
fn d_prefix() -> String {
    "Bearer ".into()
}
fn d_env() -> Option<String> {
    Some("OPENAI_API_KEY".into())
}
