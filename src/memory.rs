//! Append-only per-user conversation log.
//!
//! Each user owns one sqlite database (`chat.sqlite` inside the user
//! directory) with a single `messages` table. Ids are assigned by sqlite
//! and increase monotonically; rows are never updated or deleted.

use chrono::{DateTime, Utc};
use sqlx::{Row, SqlitePool};
use std::path::Path;

use crate::db;
use crate::error::{Error, Result};
use crate::models::{Message, Role};

const DB_FILE: &str = "chat.sqlite";

pub struct ConversationLog {
    pool: SqlitePool,
}

impl ConversationLog {
    /// Open (creating if absent) the message log inside `user_dir`.
    pub async fn open(user_dir: &Path) -> Result<Self> {
        let pool = db::connect(&user_dir.join(DB_FILE)).await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS messages (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                timestamp TEXT NOT NULL
            )
            "#,
        )
        .execute(&pool)
        .await?;

        Ok(Self { pool })
    }

    /// Append a message with a server-assigned id and the current UTC time.
    pub async fn append(&self, role: Role, content: &str) -> Result<()> {
        sqlx::query("INSERT INTO messages (role, content, timestamp) VALUES (?, ?, ?)")
            .bind(role.as_str())
            .bind(content)
            .bind(Utc::now().to_rfc3339())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    /// The most recent `limit` messages in chronological (oldest-first)
    /// order.
    pub async fn recent(&self, limit: usize) -> Result<Vec<Message>> {
        let rows = sqlx::query(
            "SELECT id, role, content, timestamp FROM messages ORDER BY id DESC LIMIT ?",
        )
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let role: String = row.get("role");
            let timestamp: String = row.get("timestamp");
            messages.push(Message {
                id: row.get("id"),
                role: Role::parse(&role)?,
                content: row.get("content"),
                timestamp: DateTime::parse_from_rfc3339(&timestamp)
                    .map(|dt| dt.with_timezone(&Utc))
                    .map_err(|e| Error::Storage(format!("bad message timestamp: {}", e)))?,
            });
        }

        messages.reverse();
        Ok(messages)
    }

    /// Total number of stored messages.
    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    pub async fn close(self) {
        self.pool.close().await;
    }
}
