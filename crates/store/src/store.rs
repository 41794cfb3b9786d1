use async_trait::async_trait;
use lc_domain::error::Result;
use lc_domain::message::{MessagePatch, NewMessage, StoredMessage};

/// Durable, ordered message storage.
///
/// Implementations assign ids and timestamps on insert; `created_at` is
/// strictly increasing across inserts and defines the order `find_many`
/// returns. Every failure is an `Error::Persistence`.
#[async_trait]
pub trait MessageStore: Send + Sync {
    async fn insert(&self, message: NewMessage) -> Result<StoredMessage>;

    /// Apply `patch` to the message with `id`. Recording a tool result on a
    /// message that already has one is rejected.
    async fn update_by_id(&self, id: &str, patch: &MessagePatch) -> Result<()>;

    async fn find_many(&self) -> Result<Vec<StoredMessage>>;

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredMessage>>;

    async fn delete_all(&self) -> Result<()>;
}
