//! In-memory mirror of the persisted transcript.
//!
//! Readers take snapshots; the orchestrator mutates through [`apply`]
//! right after the matching store write, so a snapshot never shows a state
//! the store has not reached.
//!
//! [`apply`]: TranscriptCache::apply

use lc_domain::message::{MessagePatch, StoredMessage};
use parking_lot::RwLock;
use tokio::sync::broadcast;

/// A change to the cached transcript.
#[derive(Debug, Clone)]
pub enum CacheMutation {
    /// Replace everything, e.g. after loading from the store.
    Replace(Vec<StoredMessage>),
    /// A freshly inserted message; goes to the end.
    Append(StoredMessage),
    /// An update by id; the message keeps its position.
    Patch { id: String, patch: MessagePatch },
    Clear,
}

/// What subscribers are told after a mutation was applied.
#[derive(Debug, Clone)]
pub enum CacheChange {
    Replaced { len: usize },
    Appended(StoredMessage),
    Updated(StoredMessage),
    Cleared,
}

pub struct TranscriptCache {
    messages: RwLock<Vec<StoredMessage>>,
    event_tx: broadcast::Sender<CacheChange>,
}

impl Default for TranscriptCache {
    fn default() -> Self {
        Self::new()
    }
}

impl TranscriptCache {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(128);
        Self {
            messages: RwLock::new(Vec::new()),
            event_tx,
        }
    }

    /// Apply one mutation. Returns `false` (and changes nothing) when a
    /// patch names an id the cache does not hold.
    pub fn apply(&self, mutation: CacheMutation) -> bool {
        let change = {
            let mut messages = self.messages.write();
            match mutation {
                CacheMutation::Replace(all) => {
                    *messages = all;
                    CacheChange::Replaced {
                        len: messages.len(),
                    }
                }
                CacheMutation::Append(msg) => {
                    messages.push(msg.clone());
                    CacheChange::Appended(msg)
                }
                CacheMutation::Patch { id, patch } => {
                    let Some(msg) = messages.iter_mut().find(|m| m.id == id) else {
                        tracing::warn!(message_id = %id, "cache patch for unknown message");
                        return false;
                    };
                    msg.apply(&patch);
                    CacheChange::Updated(msg.clone())
                }
                CacheMutation::Clear => {
                    messages.clear();
                    CacheChange::Cleared
                }
            }
        };

        // No subscribers is fine.
        let _ = self.event_tx.send(change);
        true
    }

    pub fn snapshot(&self) -> Vec<StoredMessage> {
        self.messages.read().clone()
    }

    pub fn get(&self, id: &str) -> Option<StoredMessage> {
        self.messages.read().iter().find(|m| m.id == id).cloned()
    }

    pub fn last(&self) -> Option<StoredMessage> {
        self.messages.read().last().cloned()
    }

    pub fn len(&self) -> usize {
        self.messages.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.read().is_empty()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CacheChange> {
        self.event_tx.subscribe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use lc_domain::message::{timestamp_now, MessageRole, TOOL_COMPLETED_STATUS};
    use serde_json::json;

    fn msg(id: &str, role: MessageRole, offset_us: i64) -> StoredMessage {
        let ts = timestamp_now() + Duration::microseconds(offset_us);
        StoredMessage {
            id: id.into(),
            role,
            content: json!(id),
            tool_name: None,
            tool_args: None,
            tool_result: None,
            created_at: ts,
            updated_at: ts,
        }
    }

    #[test]
    fn patch_keeps_position() {
        let cache = TranscriptCache::new();
        cache.apply(CacheMutation::Append(msg("u1", MessageRole::User, 0)));
        cache.apply(CacheMutation::Append(msg("t1", MessageRole::Tool, 1)));
        cache.apply(CacheMutation::Append(msg("a1", MessageRole::Assistant, 2)));

        let applied = cache.apply(CacheMutation::Patch {
            id: "t1".into(),
            patch: MessagePatch::tool_completed(json!({"content": "ok"})),
        });
        assert!(applied);

        let ids: Vec<_> = cache.snapshot().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["u1", "t1", "a1"]);

        let t1 = cache.get("t1").unwrap();
        assert_eq!(t1.content, json!(TOOL_COMPLETED_STATUS));
        assert_eq!(t1.tool_result, Some(json!({"content": "ok"})));
    }

    #[test]
    fn patch_for_unknown_id_is_rejected() {
        let cache = TranscriptCache::new();
        cache.apply(CacheMutation::Append(msg("u1", MessageRole::User, 0)));
        let applied = cache.apply(CacheMutation::Patch {
            id: "missing".into(),
            patch: MessagePatch::tool_failed("boom"),
        });
        assert!(!applied);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn replace_and_clear() {
        let cache = TranscriptCache::new();
        cache.apply(CacheMutation::Replace(vec![
            msg("a", MessageRole::User, 0),
            msg("b", MessageRole::Assistant, 1),
        ]));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.last().unwrap().id, "b");

        cache.apply(CacheMutation::Clear);
        assert!(cache.is_empty());
    }

    #[tokio::test]
    async fn subscribers_see_changes_in_order() {
        let cache = TranscriptCache::new();
        let mut rx = cache.subscribe();

        cache.apply(CacheMutation::Append(msg("u1", MessageRole::User, 0)));
        cache.apply(CacheMutation::Patch {
            id: "u1".into(),
            patch: MessagePatch {
                content: Some(json!("edited")),
                tool_result: None,
                updated_at: timestamp_now(),
            },
        });
        cache.apply(CacheMutation::Clear);

        assert!(matches!(rx.recv().await.unwrap(), CacheChange::Appended(m) if m.id == "u1"));
        assert!(matches!(rx.recv().await.unwrap(), CacheChange::Updated(m) if m.content == json!("edited")));
        assert!(matches!(rx.recv().await.unwrap(), CacheChange::Cleared));
    }
}
