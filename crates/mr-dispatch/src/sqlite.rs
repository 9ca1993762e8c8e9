use async_trait::async_trait;
use mr_common::{HistoryRecord, QueueRecord};
use crate::repository::{HistoryRepository, QueueRepository};
use anyhow::Result;
use sqlx::SqlitePool;

pub struct SqliteMailStore {
    pool: SqlitePool,
}

impl SqliteMailStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn init_schema(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS email_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
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
            );
            CREATE TABLE IF NOT EXISTS email_queue (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
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
            );
            CREATE INDEX IF NOT EXISTS idx_email_queue_created ON email_queue(created_at);
            "#
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl HistoryRepository for SqliteMailStore {
    async fn insert_history(&self, record: &HistoryRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO email_history
                (sender, reply_to, to_recipients, cc_recipients, bcc_recipients, subject, text,
                 content_type, provider, response_id, response_message, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}

#[async_trait]
impl QueueRepository for SqliteMailStore {
    async fn insert_queue(&self, record: &QueueRecord) -> Result<i64> {
        let result = sqlx::query(
            r#"
            INSERT INTO email_queue
                (sender, reply_to, to_recipients, cc_recipients, bcc_recipients, subject, text,
                 content_type, reason, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
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
        .execute(&self.pool)
        .await?;
        Ok(result.last_insert_rowid())
    }
}
