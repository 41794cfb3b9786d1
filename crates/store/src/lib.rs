//! Local conversation storage.
//!
//! - [`MessageStore`]: the durable, ordered record store contract
//! - [`SqliteMessageStore`]: its SQLite implementation
//! - [`TranscriptCache`]: the in-memory mirror the UI reads from

pub mod cache;
pub mod sqlite;
pub mod store;

pub use cache::{CacheChange, CacheMutation, TranscriptCache};
pub use sqlite::SqliteMessageStore;
pub use store::MessageStore;
