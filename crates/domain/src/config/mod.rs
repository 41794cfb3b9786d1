mod llm;
mod logging;
mod mcp;
mod store;

pub use llm::*;
pub use logging::*;
pub use mcp::*;
pub use store::*;

use serde::{Deserialize, Serialize};
use std::fmt;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Top-level config
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub mcp: McpConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Config validation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigError {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl ConfigError {
    fn error(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Error,
            field: field.into(),
            message: message.into(),
        }
    }

    fn warning(field: &str, message: impl Into<String>) -> Self {
        Self {
            severity: ConfigSeverity::Warning,
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues.
    ///
    /// Returns an empty vec when everything looks good.
    pub fn validate(&self) -> Vec<ConfigError> {
        let mut errors = Vec::new();

        if self.llm.base_url.is_empty() {
            errors.push(ConfigError::error("llm.base_url", "base_url must not be empty"));
        } else if !is_http_url(&self.llm.base_url) {
            errors.push(ConfigError::error(
                "llm.base_url",
                "base_url must start with http:// or https://",
            ));
        }

        if self.llm.model.is_empty() {
            errors.push(ConfigError::error("llm.model", "model must not be empty"));
        }

        if let Some(t) = self.llm.temperature {
            if !(0.0..=2.0).contains(&t) {
                errors.push(ConfigError::error(
                    "llm.temperature",
                    format!("temperature {t} is outside 0.0..=2.0"),
                ));
            }
        }

        if self.llm.max_tokens == Some(0) {
            errors.push(ConfigError::error(
                "llm.max_tokens",
                "max_tokens must be greater than 0",
            ));
        }

        if self.llm.timeout_ms == 0 {
            errors.push(ConfigError::error(
                "llm.timeout_ms",
                "timeout_ms must be greater than 0",
            ));
        }

        if self.llm.auth.key.is_some() {
            errors.push(ConfigError::warning(
                "llm.auth.key",
                "plaintext API key in config; prefer `env` or a keychain entry",
            ));
        }

        if self.mcp.sse_url.is_empty() {
            errors.push(ConfigError::warning(
                "mcp.sse_url",
                "no tool endpoint configured; chat runs without tools",
            ));
        } else if !is_http_url(&self.mcp.sse_url) {
            errors.push(ConfigError::error(
                "mcp.sse_url",
                "sse_url must start with http:// or https://",
            ));
        }

        if self.mcp.request_timeout_ms == 0 {
            errors.push(ConfigError::error(
                "mcp.request_timeout_ms",
                "request_timeout_ms must be greater than 0",
            ));
        }

        if self.store.path.is_empty() {
            errors.push(ConfigError::error("store.path", "path must not be empty"));
        } else if self.store.is_in_memory() {
            errors.push(ConfigError::warning(
                "store.path",
                "in-memory store; history is lost on exit",
            ));
        }

        errors
    }

    /// True when `validate()` reports at least one error (warnings excluded).
    pub fn has_errors(&self) -> bool {
        self.validate()
            .iter()
            .any(|e| e.severity == ConfigSeverity::Error)
    }
}

fn is_http_url(s: &str) -> bool {
    s.starts_with("http://") || s.starts_with("https://")
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let config = Config::default();
        assert!(!config.has_errors(), "{:?}", config.validate());
    }

    #[test]
    fn empty_model_is_an_error() {
        let mut config = Config::default();
        config.llm.model.clear();
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|e| e.field == "llm.model" && e.severity == ConfigSeverity::Error));
    }

    #[test]
    fn empty_sse_url_only_warns() {
        let mut config = Config::default();
        config.mcp.sse_url.clear();
        let issues = config.validate();
        let issue = issues.iter().find(|e| e.field == "mcp.sse_url").unwrap();
        assert_eq!(issue.severity, ConfigSeverity::Warning);
        assert!(!config.has_errors());
    }

    #[test]
    fn out_of_range_temperature_is_an_error() {
        let mut config = Config::default();
        config.llm.temperature = Some(3.5);
        assert!(config.has_errors());
    }

    #[test]
    fn display_includes_severity_tag() {
        let e = ConfigError::warning("store.path", "in-memory store");
        assert_eq!(e.to_string(), "[WARN] store.path: in-memory store");
    }
}
