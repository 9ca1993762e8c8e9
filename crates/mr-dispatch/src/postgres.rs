use async_trait::async_trait;
use mr_common::{HistoryRecord, QueueRecord};
use crate::repository::{HistoryRepository, QueueRepository};
use anyhow::Result;
use sqlx::{PgPool, Row};

pub struct PostgresMailStore {
    pool: PgPool,
}

impl PostgresMailStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        // Postgres prepared statements take a single command each
        for statement in [
            r#"
            CREATE TABLE IF NOT EXISTS email_history (
                id BIGSERIAL PRIMARY KEY,
                sender TEXT NOT NULL,
                reply_to TEXT,
                to_recipients TEXT NOT NULL,
                cc_recipients TEXT NOT NULL,
                bcc_recipients TEXT NOT NULL,
                subject TEXT NOT NULL,
                text TEXT NOT NULL,
                content_type TEXT NOT NULL,
                provider TEXT NOT NULL,
                response_id TEXT,
                response_message TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
            r#"
            CREATE TABLE IF NOT EXISTS email_queue (
                id BIGSERIAL PRIMARY KEY,
                sender TEXT NOT NULL,
                reply_to TEXT,
                to_recipients TEXT NOT NULL,
                cc_recipients TEXT NOT NULL,
                bcc_recipients TEXT NOT NULL,
                subject TEXT NOT NULL,
                text TEXT NOT NULL,
                content_type TEXT NOT NULL,
                reason TEXT NOT NULL,
                created_at BIGINT NOT NULL,
                updated_at BIGINT NOT NULL
            )
            "#,
            "CREATE INDEX IF NOT EXISTS idx_email_queue_created ON email_queue(created_at)",
        ] {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for PostgresMailStore {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO email_history
                (sender, reply_to, to_recipients, cc_recipients, bcc_recipients, subject, text,
                 content_type, provider, response_id, response_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING id
            "#
        )
        .bind(&record.sender)
        .bind(&record.reply_to)
        .bind(&record.to_recipients)
        .bind(&record.cc_recipients)
        .bind(&record.bcc_recipients)
        .bind(&record.subject)
        .bind(&record.text)
        .bind(&record.content_type)
        .bind(&record.provider)
        .bind(&record.response_id)
        .bind(&record.response_message)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }
}

#[async_trait]
impl QueueRepository for PostgresMailStore {
    async fn insert_queue(&self, record: &QueueRecord) -> Result<i64> {
        let row = sqlx::query(
            r#"
            INSERT INTO email_queue
                (sender, reply_to, to_recipients, cc_recipients, bcc_recipients, subject, text,
                 content_type, reason, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING id
            "#
        )
        .bind(&record.sender)
        .bind(&record.reply_to)
        .bind(&record.to_recipients)
        .bind(&record.cc_recipients)
        .bind(&record.bcc_recipients)
        .bind(&record.subject)
        .bind(&record.text)
        .bind(&record.content_type)
        .bind(&record.reason)
        .bind(record.created_at.timestamp_millis())
        .bind(record.updated_at.timestamp_millis())
        .fetch_one(&self.pool)
        .await?;
        Ok(row.get("id"))
    }
}
