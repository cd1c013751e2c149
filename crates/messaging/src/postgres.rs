//! PostgreSQL queue transport.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Row, postgres::PgPoolOptions, postgres::PgRow};
use tokio::time::Instant;

use crate::error::{MessagingError, Result};
use crate::queue::{QueueClient, QueueMessage, QueueSettings, parse_receipt_handle, receipt_handle};

/// PostgreSQL-backed queue using a pgmq-style `queue_messages` table.
///
/// Messages are claimed with `FOR UPDATE SKIP LOCKED`, so several consumer
/// instances can poll the same queue URL concurrently. Deletes match both
/// `msg_id` and `read_ct`, so a receipt from an earlier delivery cannot
/// remove a message another consumer is now processing.
#[derive(Clone)]
pub struct PgQueueClient {
    pool: PgPool,
    settings: QueueSettings,
}

impl PgQueueClient {
    /// Creates a new PostgreSQL queue client.
    pub fn new(pool: PgPool, settings: QueueSettings) -> Self {
        Self { pool, settings }
    }

    /// Connects to `database_url` with a small connection pool.
    pub async fn connect(database_url: &str, settings: QueueSettings) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await?;
        Ok(Self::new(pool, settings))
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }

    /// Claims up to `max_messages` visible messages, hiding them for the visibility timeout.
    async fn claim(&self, queue_url: &str) -> Result<Vec<QueueMessage>> {
        let rows = sqlx::query(
            r#"
            UPDATE queue_messages
            SET read_ct = read_ct + 1,
                vt = now() + make_interval(secs => $3)
            WHERE msg_id IN (
                SELECT msg_id FROM queue_messages
                WHERE queue_url = $1 AND vt <= now()
                ORDER BY msg_id
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            )
            RETURNING msg_id, read_ct, enqueued_at, message
            "#,
        )
        .bind(queue_url)
        .bind(self.settings.max_messages as i64)
        .bind(self.settings.visibility_timeout.as_secs_f64())
        .fetch_all(&self.pool)
        .await?;

        let mut messages = rows
            .into_iter()
            .map(Self::row_to_message)
            .collect::<Result<Vec<_>>>()?;
        messages.sort_by_key(|m| m.message_id);
        Ok(messages)
    }

    fn row_to_message(row: PgRow) -> Result<QueueMessage> {
        let message_id: i64 = row.try_get("msg_id")?;
        let read_ct: i32 = row.try_get("read_ct")?;
        let enqueued_at: DateTime<Utc> = row.try_get("enqueued_at")?;
        let receive_count = u32::try_from(read_ct).unwrap_or_default();

        Ok(QueueMessage {
            message_id,
            receipt_handle: receipt_handle(message_id, receive_count),
            body: row.try_get("message")?,
            receive_count,
            enqueued_at,
        })
    }
}

#[async_trait]
impl QueueClient for PgQueueClient {
    #[tracing::instrument(skip(self, body))]
    async fn send(&self, queue_url: &str, body: &str) -> Result<i64> {
        let message_id: i64 = sqlx::query_scalar(
            "INSERT INTO queue_messages (queue_url, message) VALUES ($1, $2) RETURNING msg_id",
        )
        .bind(queue_url)
        .bind(body)
        .fetch_one(&self.pool)
        .await?;

        tracing::debug!(message_id, "message enqueued");
        Ok(message_id)
    }

    async fn receive(&self, queue_url: &str) -> Result<Vec<QueueMessage>> {
        let deadline = Instant::now() + self.settings.wait_time;

        loop {
            let messages = self.claim(queue_url).await?;
            let now = Instant::now();
            if !messages.is_empty() || now >= deadline {
                return Ok(messages);
            }
            tokio::time::sleep(self.settings.poll_interval.min(deadline - now)).await;
        }
    }

    #[tracing::instrument(skip(self))]
    async fn delete(&self, queue_url: &str, receipt: &str) -> Result<()> {
        let (message_id, receive_count) = parse_receipt_handle(receipt)?;

        let result = sqlx::query(
            "DELETE FROM queue_messages WHERE queue_url = $1 AND msg_id = $2 AND read_ct = $3",
        )
        .bind(queue_url)
        .bind(message_id)
        .bind(receive_count as i32)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MessagingError::ReceiptNotFound(receipt.to_string()));
        }
        Ok(())
    }
}
