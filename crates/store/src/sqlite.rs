//! SQLite backend.
//!
//! One table, `messages`, holds every message of every conversation. The
//! autoincrement `iid` column fixes append order; the message itself is
//! stored as a JSON payload so tool calls survive a round trip unchanged.

use std::str::FromStr;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use toolchat_core::error::StoreError;
use toolchat_core::message::{Conversation, ConversationId, Message};
use toolchat_core::store::ConversationStore;
use tracing::{debug, info};

/// A file-backed conversation store.
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the database at `path`.
    ///
    /// Pass `":memory:"` for an ephemeral database.
    pub async fn new(path: &str) -> Result<Self, StoreError> {
        let in_memory = path == ":memory:" || path == "sqlite::memory:";
        let options = SqliteConnectOptions::from_str(path)
            .map_err(|e| StoreError::Storage(format!("Invalid SQLite path: {e}")))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        // Every connection to ":memory:" would see its own empty database.
        let max_connections = if in_memory { 1 } else { 4 };
        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StoreError::Storage(format!("Failed to open SQLite: {e}")))?;

        let store = Self { pool };
        store.run_migrations().await?;
        info!("SQLite conversation store initialized at {path}");
        Ok(store)
    }

    async fn run_migrations(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                iid         INTEGER PRIMARY KEY AUTOINCREMENT,
                thread_id   TEXT NOT NULL,
                message_id  TEXT NOT NULL UNIQUE,
                role        TEXT NOT NULL,
                payload     TEXT NOT NULL,
                created_at  TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::MigrationFailed(format!("messages table: {e}")))?;

        sqlx::query("CREATE INDEX IF NOT EXISTS idx_messages_thread ON messages(thread_id, iid)")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::MigrationFailed(format!("thread index: {e}")))?;

        debug!("SQLite migrations complete");
        Ok(())
    }

    fn row_to_message(row: &sqlx::sqlite::SqliteRow) -> Result<Message, StoreError> {
        let payload: String = row
            .try_get("payload")
            .map_err(|e| StoreError::QueryFailed(format!("payload column: {e}")))?;
        serde_json::from_str(&payload).map_err(|e| StoreError::Corrupt(e.to_string()))
    }

    async fn insert<'e, E>(
        executor: E,
        id: &ConversationId,
        message: &Message,
    ) -> Result<(), StoreError>
    where
        E: sqlx::Executor<'e, Database = sqlx::Sqlite>,
    {
        let payload =
            serde_json::to_string(message).map_err(|e| StoreError::Storage(e.to_string()))?;
        sqlx::query(
            "INSERT INTO messages (thread_id, message_id, role, payload, created_at) \
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(id.as_str())
        .bind(&message.id)
        .bind(message.role.as_str())
        .bind(payload)
        .bind(Utc::now().to_rfc3339())
        .execute(executor)
        .await
        .map_err(|e| StoreError::QueryFailed(format!("insert message: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ConversationStore for SqliteStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn append(&self, id: &ConversationId, message: &Message) -> Result<(), StoreError> {
        Self::insert(&self.pool, id, message).await?;
        debug!(thread_id = %id, role = message.role.as_str(), "Message stored");
        Ok(())
    }

    async fn append_all(
        &self,
        id: &ConversationId,
        messages: &[Message],
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Storage(format!("begin transaction: {e}")))?;
        for message in messages {
            Self::insert(&mut *tx, id, message).await?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Storage(format!("commit: {e}")))?;
        debug!(thread_id = %id, count = messages.len(), "Messages stored");
        Ok(())
    }

    async fn load(&self, id: &ConversationId) -> Result<Conversation, StoreError> {
        let rows = sqlx::query("SELECT payload FROM messages WHERE thread_id = ? ORDER BY iid ASC")
            .bind(id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("load: {e}")))?;

        let messages = rows
            .iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Conversation {
            id: id.clone(),
            messages,
        })
    }

    async fn count(&self, id: &ConversationId) -> Result<usize, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) as cnt FROM messages WHERE thread_id = ?")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("count: {e}")))?;
        let count: i64 = row
            .try_get("cnt")
            .map_err(|e| StoreError::QueryFailed(format!("count column: {e}")))?;
        Ok(count as usize)
    }

    async fn conversation_ids(&self) -> Result<Vec<ConversationId>, StoreError> {
        let rows = sqlx::query("SELECT DISTINCT thread_id FROM messages ORDER BY thread_id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StoreError::QueryFailed(format!("conversation ids: {e}")))?;
        rows.iter()
            .map(|row| {
                row.try_get::<String, _>("thread_id")
                    .map(ConversationId::from)
                    .map_err(|e| StoreError::QueryFailed(format!("thread_id column: {e}")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use toolchat_core::message::{Role, ToolCall};

    async fn memory_store() -> SqliteStore {
        SqliteStore::new(":memory:").await.unwrap()
    }

    #[tokio::test]
    async fn append_and_load_preserves_order() {
        let store = memory_store().await;
        let id = ConversationId::from("t1");
        store.append(&id, &Message::user("one")).await.unwrap();
        store.append(&id, &Message::assistant("two")).await.unwrap();
        store.append(&id, &Message::user("three")).await.unwrap();

        let conv = store.load(&id).await.unwrap();
        let contents: Vec<_> = conv.messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three"]);
        assert_eq!(store.count(&id).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn tool_calls_survive_round_trip() {
        let store = memory_store().await;
        let id = ConversationId::from("t1");
        let call = ToolCall::new("call_1", "calculator", json!({"a": 2, "b": 3, "operation": "add"}));
        let request = Message::tool_request(vec![call]);
        let result = Message::tool_result("call_1", "calculator", r#"{"result":5.0}"#);
        store
            .append_all(&id, &[request.clone(), result.clone()])
            .await
            .unwrap();

        let conv = store.load(&id).await.unwrap();
        assert_eq!(conv.messages, vec![request, result]);
        assert_eq!(conv.messages[1].role, Role::Tool);
        assert_eq!(conv.messages[1].tool_call_id.as_deref(), Some("call_1"));
    }

    #[tokio::test]
    async fn sessions_are_isolated() {
        let store = memory_store().await;
        store
            .append(&ConversationId::from("a"), &Message::user("for a"))
            .await
            .unwrap();
        store
            .append(&ConversationId::from("b"), &Message::user("for b"))
            .await
            .unwrap();

        let a = store.load(&ConversationId::from("a")).await.unwrap();
        assert_eq!(a.messages.len(), 1);
        assert_eq!(a.messages[0].content, "for a");
        assert!(
            store
                .load(&ConversationId::from("missing"))
                .await
                .unwrap()
                .messages
                .is_empty()
        );
        assert_eq!(
            store.conversation_ids().await.unwrap(),
            vec![ConversationId::from("a"), ConversationId::from("b")]
        );
    }

    #[tokio::test]
    async fn failed_batch_leaves_nothing_behind() {
        let store = memory_store().await;
        let id = ConversationId::from("t1");
        let first = Message::user("kept");
        store.append(&id, &first).await.unwrap();

        // Re-inserting the same message id violates the unique constraint.
        let fresh = Message::assistant("never stored");
        let err = store.append_all(&id, &[fresh, first.clone()]).await;
        assert!(err.is_err());
        assert_eq!(store.count(&id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn history_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolchat.db");
        let path = path.to_str().unwrap();
        let id = ConversationId::from("persist");

        {
            let store = SqliteStore::new(path).await.unwrap();
            store.append(&id, &Message::user("remember me")).await.unwrap();
            store.pool.close().await;
        }

        let store = SqliteStore::new(path).await.unwrap();
        let conv = store.load(&id).await.unwrap();
        assert_eq!(conv.messages.len(), 1);
        assert_eq!(conv.messages[0].content, "remember me");
    }

    #[tokio::test]
    async fn corrupt_payload_is_reported() {
        let store = memory_store().await;
        sqlx::query(
            "INSERT INTO messages (thread_id, message_id, role, payload, created_at) \
             VALUES ('bad', 'm1', 'user', 'not json', '2024-01-01T00:00:00Z')",
        )
        .execute(&store.pool)
        .await
        .unwrap();

        let err = store.load(&ConversationId::from("bad")).await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt(_)));
    }
}
