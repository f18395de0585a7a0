// src/core/repositories/messages.rs
use anyhow::Result;
use chrono::Utc;
use sqlx::SqlitePool;

use crate::core::models::Message;
use crate::pagination::PageParams;

pub struct MessageRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> MessageRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(
        &self,
        sender_id: i64,
        recipient_id: i64,
        application_id: Option<i64>,
        body: &str,
    ) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (sender_id, recipient_id, application_id, body, read_at, created_at)
            VALUES (?, ?, ?, ?, NULL, ?)
            RETURNING *
            "#,
        )
        .bind(sender_id)
        .bind(recipient_id)
        .bind(application_id)
        .bind(body)
        .bind(Utc::now())
        .fetch_one(self.pool)
        .await?;
        Ok(message)
    }

    pub async fn find(&self, id: i64) -> Result<Option<Message>> {
        let message = sqlx::query_as::<_, Message>("SELECT * FROM messages WHERE id = ?")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(message)
    }

    /// Received messages, newest first.
    pub async fn inbox(
        &self,
        recipient_id: i64,
        unread_only: bool,
        params: &PageParams,
    ) -> Result<(Vec<Message>, i64)> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE recipient_id = ?1 AND (?2 = 0 OR read_at IS NULL)
            ORDER BY created_at DESC, id DESC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(recipient_id)
        .bind(unread_only)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ?1 AND (?2 = 0 OR read_at IS NULL)",
        )
        .bind(recipient_id)
        .bind(unread_only)
        .fetch_one(self.pool)
        .await?;

        Ok((messages, total))
    }

    /// Both directions between two users, oldest first.
    pub async fn conversation(
        &self,
        user_id: i64,
        other_id: i64,
        params: &PageParams,
    ) -> Result<(Vec<Message>, i64)> {
        let messages = sqlx::query_as::<_, Message>(
            r#"
            SELECT * FROM messages
            WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)
            ORDER BY created_at ASC, id ASC
            LIMIT ?3 OFFSET ?4
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .bind(params.limit())
        .bind(params.offset())
        .fetch_all(self.pool)
        .await?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*) FROM messages
            WHERE (sender_id = ?1 AND recipient_id = ?2) OR (sender_id = ?2 AND recipient_id = ?1)
            "#,
        )
        .bind(user_id)
        .bind(other_id)
        .fetch_one(self.pool)
        .await?;

        Ok((messages, total))
    }

    /// Sets `read_at` the first time only.
    pub async fn mark_read(&self, id: i64) -> Result<Message> {
        let message = sqlx::query_as::<_, Message>(
            "UPDATE messages SET read_at = COALESCE(read_at, ?) WHERE id = ? RETURNING *",
        )
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool)
        .await?;
        Ok(message)
    }

    pub async fn unread_count(&self, recipient_id: i64) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM messages WHERE recipient_id = ? AND read_at IS NULL",
        )
        .bind(recipient_id)
        .fetch_one(self.pool)
        .await?;
        Ok(count)
    }
}
