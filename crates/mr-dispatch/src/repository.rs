use async_trait::async_trait;
use mr_common::{HistoryRecord, QueueRecord};
use anyhow::Result;

/// Storage for messages a provider accepted
#[async_trait]
pub trait HistoryRepository: Send + Sync {
    /// Insert a record, returning its assigned id
    async fn insert_history(&self, record: &HistoryRecord) -> Result<i64>;
}

/// Storage for messages awaiting another delivery attempt
#[async_trait]
pub trait QueueRepository: Send + Sync {
    /// Insert a record, returning its assigned id
    async fn insert_queue(&self, record: &QueueRecord) -> Result<i64>;
}
