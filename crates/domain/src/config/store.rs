use serde::{Deserialize, Serialize};

/// Path used to request a store that lives only for the process lifetime.
pub const IN_MEMORY_STORE: &str = ":memory:";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database file, or `:memory:`.
    #[serde(default = "d_path")]
    pub path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { path: d_path() }
    }
}

impl StoreConfig {
    pub fn is_in_memory(&self) -> bool {
        self.path == IN_MEMORY_STORE
    }
}

fn d_path() -> String {
    "localchat.db".into()
}
