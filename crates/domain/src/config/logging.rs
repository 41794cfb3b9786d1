use serde::{Deserialize, Serialize};

/// Filter used when neither `RUST_LOG` nor `[logging] filter` is set.
pub const DEFAULT_LOG_FILTER: &str = "info,lc_runtime=debug";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive string. `RUST_LOG` takes precedence.
    #[serde(default)]
    pub filter: Option<String>,
    /// Emit JSON lines instead of the human-readable format.
    #[serde(default)]
    pub json: bool,
}

impl LoggingConfig {
    pub fn effective_filter(&self) -> &str {
        self.filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER)
    }
}
