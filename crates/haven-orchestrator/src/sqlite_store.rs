//! Relational conversation store
//!
//! Schema per the platform's persisted-state layout: `conversations`,
//! `messages` keyed by sequence, and the compact
//! `conversation_last_retrieved` mapping. Messages reference retrieval
//! turns by id only; there are no object-graph cycles.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use haven_types::{Message, Role};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Row, SqlitePool};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use crate::conversation::{ConversationSnapshot, ConversationStore, RetrievedRef};
use crate::{OrchestratorError, Result};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS conversations (
    user_id TEXT NOT NULL,
    conversation_id TEXT NOT NULL,
    created_at TEXT NOT NULL,
    last_active_at TEXT NOT NULL,
    PRIMARY KEY (user_id, conversation_id)
);
CREATE TABLE IF NOT EXISTS messages (
    conversation_id TEXT NOT NULL,
    seq INTEGER NOT NULL,
    role TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata_json TEXT,
    created_at TEXT NOT NULL,
    PRIMARY KEY (conversation_id, seq)
);
CREATE TABLE IF NOT EXISTS conversation_last_retrieved (
    conversation_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    property_id TEXT NOT NULL,
    title TEXT NOT NULL,
    turn_id TEXT NOT NULL,
    PRIMARY KEY (conversation_id, position)
);
"#;

/// SQLite-backed store
pub struct SqliteConversationStore {
    pool: SqlitePool,
    /// Per-conversation write locks; reads go straight to the pool.
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl SqliteConversationStore {
    /// Connect and run the schema. `min_connections`/`max_connections`
    /// bound the pool (platform defaults 10/100).
    pub async fn connect(
        url: &str,
        min_connections: u32,
        max_connections: u32,
    ) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| OrchestratorError::Store(format!("bad database url: {e}")))?
            .create_if_missing(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(min_connections)
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(|e| OrchestratorError::Store(format!("connect: {e}")))?;

        sqlx::raw_sql(SCHEMA)
            .execute(&pool)
            .await
            .map_err(|e| OrchestratorError::Store(format!("schema: {e}")))?;

        info!(url, "conversation store ready");
        Ok(Self {
            pool,
            locks: DashMap::new(),
        })
    }

    fn lock_for(&self, conversation_id: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(conversation_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn store_error(e: sqlx::Error) -> OrchestratorError {
        OrchestratorError::Store(e.to_string())
    }
}

#[async_trait]
impl ConversationStore for SqliteConversationStore {
    async fn load_or_create(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationSnapshot> {
        let now = Utc::now();
        sqlx::query(
            "INSERT OR IGNORE INTO conversations \
             (user_id, conversation_id, created_at, last_active_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(now.to_rfc3339())
        .bind(now.to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(Self::store_error)?;

        let row = sqlx::query(
            "SELECT created_at, last_active_at FROM conversations \
             WHERE user_id = ? AND conversation_id = ?",
        )
        .bind(user_id)
        .bind(conversation_id)
        .fetch_one(&self.pool)
        .await
        .map_err(Self::store_error)?;

        let created_at = chrono::DateTime::parse_from_rfc3339(row.get::<String, _>(0).as_str())
            .map(|t| t.with_timezone(&Utc))
            .unwrap_or(now);
        let last_active_at =
            chrono::DateTime::parse_from_rfc3339(row.get::<String, _>(1).as_str())
                .map(|t| t.with_timezone(&Utc))
                .unwrap_or(now);

        let message_rows = sqlx::query(
            "SELECT role, content FROM messages WHERE conversation_id = ? ORDER BY seq ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_error)?;

        let history = message_rows
            .iter()
            .filter_map(|row| {
                let role: Role = row.get::<String, _>(0).parse().ok()?;
                Some(Message {
                    role,
                    content: row.get::<String, _>(1),
                    name: None,
                    tool_calls: None,
                })
            })
            .collect();

        let retrieved_rows = sqlx::query(
            "SELECT position, property_id, title, turn_id \
             FROM conversation_last_retrieved WHERE conversation_id = ? ORDER BY position ASC",
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Self::store_error)?;

        let last_retrieved = retrieved_rows
            .iter()
            .map(|row| RetrievedRef {
                position: row.get::<i64, _>(0) as u32,
                property_id: row.get::<String, _>(1),
                title: row.get::<String, _>(2),
                turn_id: Uuid::parse_str(row.get::<String, _>(3).as_str())
                    .unwrap_or_else(|_| Uuid::nil()),
            })
            .collect();

        Ok(ConversationSnapshot {
            history,
            last_retrieved,
            created_at,
            last_active_at,
        })
    }

    async fn append_turn(
        &self,
        user_id: &str,
        conversation_id: &str,
        user_message: Message,
        assistant_message: Message,
        last_retrieved: Option<Vec<RetrievedRef>>,
        history_window: usize,
    ) -> Result<()> {
        let lock = self.lock_for(conversation_id);
        let _guard = lock.lock().await;

        let mut tx = self.pool.begin().await.map_err(Self::store_error)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            "INSERT OR IGNORE INTO conversations \
             (user_id, conversation_id, created_at, last_active_at) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(conversation_id)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(Self::store_error)?;

        let next_seq: i64 = sqlx::query(
            "SELECT COALESCE(MAX(seq), 0) + 1 FROM messages WHERE conversation_id = ?",
        )
        .bind(conversation_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(Self::store_error)?
        .get(0);

        for (offset, message) in [user_message, assistant_message].iter().enumerate() {
            sqlx::query(
                "INSERT INTO messages \
                 (conversation_id, seq, role, content, metadata_json, created_at) \
                 VALUES (?, ?, ?, ?, NULL, ?)",
            )
            .bind(conversation_id)
            .bind(next_seq + offset as i64)
            .bind(message.role.as_str())
            .bind(&message.content)
            .bind(&now)
            .execute(&mut *tx)
            .await
            .map_err(Self::store_error)?;
        }

        // FIFO eviction beyond the window
        sqlx::query(
            "DELETE FROM messages WHERE conversation_id = ? AND seq <= \
             (SELECT MAX(seq) FROM messages WHERE conversation_id = ?) - ?",
        )
        .bind(conversation_id)
        .bind(conversation_id)
        .bind(history_window as i64)
        .execute(&mut *tx)
        .await
        .map_err(Self::store_error)?;

        if let Some(retrieved) = last_retrieved {
            sqlx::query("DELETE FROM conversation_last_retrieved WHERE conversation_id = ?")
                .bind(conversation_id)
                .execute(&mut *tx)
                .await
                .map_err(Self::store_error)?;

            for entry in retrieved {
                sqlx::query(
                    "INSERT INTO conversation_last_retrieved \
                     (conversation_id, position, property_id, title, turn_id) \
                     VALUES (?, ?, ?, ?, ?)",
                )
                .bind(conversation_id)
                .bind(entry.position as i64)
                .bind(&entry.property_id)
                .bind(&entry.title)
                .bind(entry.turn_id.to_string())
                .execute(&mut *tx)
                .await
                .map_err(Self::store_error)?;
            }
        }

        sqlx::query(
            "UPDATE conversations SET last_active_at = ? \
             WHERE user_id = ? AND conversation_id = ?",
        )
        .bind(&now)
        .bind(user_id)
        .bind(conversation_id)
        .execute(&mut *tx)
        .await
        .map_err(Self::store_error)?;

        tx.commit().await.map_err(Self::store_error)
    }
}
