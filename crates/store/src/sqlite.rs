//! SQLite-backed message store.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use serde_json::Value;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

use lc_domain::config::IN_MEMORY_STORE;
use lc_domain::error::{Error, Result};
use lc_domain::message::{timestamp_now, MessagePatch, MessageRole, NewMessage, StoredMessage};
use lc_domain::trace::TraceEvent;

use crate::store::MessageStore;

const SELECT_COLUMNS: &str =
    "SELECT id, role, content, tool_name, tool_args, tool_result, created_at, updated_at FROM messages";

fn db_err(e: sqlx::Error) -> Error {
    Error::Persistence(e.to_string())
}

/// Timestamps are stored as fixed-width RFC 3339 text (microseconds, `Z`),
/// so string order is time order.
fn format_ts(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Persistence(format!("bad timestamp {s:?}: {e}")))
}

fn parse_json(column: &str, s: &str) -> Result<Value> {
    serde_json::from_str(s).map_err(|e| Error::Persistence(format!("bad JSON in {column}: {e}")))
}

pub struct SqliteMessageStore {
    pool: SqlitePool,
    /// Last `created_at` handed out; inserts never go backwards from it.
    last_created: Mutex<Option<DateTime<Utc>>>,
}

impl SqliteMessageStore {
    /// Open or create the store at `path`. `:memory:` gives a store that
    /// lives as long as this value.
    pub async fn open(path: &str) -> Result<Self> {
        let pool = if path == IN_MEMORY_STORE {
            let options = SqliteConnectOptions::from_str("sqlite::memory:").map_err(db_err)?;
            // Every connection to `:memory:` is its own database: keep
            // exactly one and never let it be recycled.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await
                .map_err(db_err)?
        } else {
            let options = SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true);
            SqlitePoolOptions::new()
                .max_connections(4)
                .connect_with(options)
                .await
                .map_err(db_err)?
        };

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                id TEXT NOT NULL UNIQUE,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                tool_name TEXT,
                tool_args TEXT,
                tool_result TEXT,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await
        .map_err(db_err)?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_created ON messages(created_at)")
            .execute(&pool)
            .await
            .map_err(db_err)?;

        let last: Option<String> = sqlx::query_scalar("SELECT MAX(created_at) FROM messages")
            .fetch_one(&pool)
            .await
            .map_err(db_err)?;
        let last_created = last.as_deref().map(parse_ts).transpose()?;

        tracing::debug!(path, "message store opened");

        Ok(Self {
            pool,
            last_created: Mutex::new(last_created),
        })
    }

    pub async fn open_in_memory() -> Result<Self> {
        Self::open(IN_MEMORY_STORE).await
    }

    /// Next creation timestamp: now, or one microsecond past the previous
    /// one if the clock has not moved (or moved backwards).
    fn next_created_at(&self) -> DateTime<Utc> {
        let mut last = self.last_created.lock();
        let mut ts = timestamp_now();
        if let Some(prev) = *last {
            if ts <= prev {
                ts = prev + Duration::microseconds(1);
            }
        }
        *last = Some(ts);
        ts
    }

    async fn exists(&self, id: &str) -> Result<bool> {
        let n: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
        Ok(n > 0)
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }
}

#[async_trait]
impl MessageStore for SqliteMessageStore {
    async fn insert(&self, message: NewMessage) -> Result<StoredMessage> {
        let created_at = self.next_created_at();
        let stored = StoredMessage {
            id: uuid::Uuid::new_v4().to_string(),
            role: message.role,
            content: message.content,
            tool_name: message.tool_name,
            tool_args: message.tool_args,
            tool_result: None,
            created_at,
            updated_at: created_at,
        };

        sqlx::query(
            "INSERT INTO messages (id, role, content, tool_name, tool_args, tool_result, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, NULL, ?, ?)",
        )
        .bind(&stored.id)
        .bind(stored.role.as_str())
        .bind(stored.content.to_string())
        .bind(stored.tool_name.as_deref())
        .bind(stored.tool_args.as_ref().map(Value::to_string))
        .bind(format_ts(&stored.created_at))
        .bind(format_ts(&stored.updated_at))
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        TraceEvent::MessagePersisted {
            message_id: stored.id.clone(),
            role: stored.role.to_string(),
        }
        .emit();

        Ok(stored)
    }

    async fn update_by_id(&self, id: &str, patch: &MessagePatch) -> Result<()> {
        let content = patch.content.as_ref().map(Value::to_string);
        let updated_at = format_ts(&patch.updated_at);

        let result = match &patch.tool_result {
            Some(tool_result) => sqlx::query(
                "UPDATE messages SET content = COALESCE(?, content), tool_result = ?, \
                 updated_at = MAX(?, created_at) \
                 WHERE id = ? AND tool_result IS NULL",
            )
            .bind(content)
            .bind(tool_result.to_string())
            .bind(&updated_at)
            .bind(id),
            None => sqlx::query(
                "UPDATE messages SET content = COALESCE(?, content), updated_at = MAX(?, created_at) \
                 WHERE id = ?",
            )
            .bind(content)
            .bind(&updated_at)
            .bind(id),
        }
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(if self.exists(id).await? {
                Error::Persistence(format!("tool result already recorded for message {id}"))
            } else {
                Error::Persistence(format!("no message with id {id}"))
            });
        }
        Ok(())
    }

    async fn find_many(&self) -> Result<Vec<StoredMessage>> {
        let rows = sqlx::query_as::<_, MessageRow>(&format!(
            "{SELECT_COLUMNS} ORDER BY created_at ASC, seq ASC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter().map(StoredMessage::try_from).collect()
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<StoredMessage>> {
        let row = sqlx::query_as::<_, MessageRow>(&format!("{SELECT_COLUMNS} WHERE id = ?"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?;

        row.map(StoredMessage::try_from).transpose()
    }

    async fn delete_all(&self) -> Result<()> {
        let result = sqlx::query("DELETE FROM messages")
            .execute(&self.pool)
            .await
            .map_err(db_err)?;
        tracing::debug!(deleted = result.rows_affected(), "message store cleared");
        Ok(())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Row mapping
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(sqlx::FromRow)]
struct MessageRow {
    id: String,
    role: String,
    content: String,
    tool_name: Option<String>,
    tool_args: Option<String>,
    tool_result: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<MessageRow> for StoredMessage {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        let role = MessageRole::parse(&row.role)
            .ok_or_else(|| Error::Persistence(format!("unknown role {:?}", row.role)))?;
        Ok(StoredMessage {
            id: row.id,
            role,
            content: parse_json("content", &row.content)?,
            tool_name: row.tool_name,
            tool_args: row
                .tool_args
                .as_deref()
                .map(|s| parse_json("tool_args", s))
                .transpose()?,
            tool_result: row
                .tool_result
                .as_deref()
                .map(|s| parse_json("tool_result", s))
                .transpose()?,
            created_at: parse_ts(&row.created_at)?,
            updated_at: parse_ts(&row.updated_at)?,
        })
    }
}
