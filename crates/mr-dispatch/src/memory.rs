//! In-memory store for tests and `db_type = "memory"`

use async_trait::async_trait;
use mr_common::{HistoryRecord, QueueRecord};
use parking_lot::Mutex;

use crate::repository::{HistoryRepository, QueueRepository};

#[derive(Default)]
pub struct InMemoryMailStore {
    history: Mutex<Vec<HistoryRecord>>,
    queue: Mutex<Vec<QueueRecord>>,
}

impl InMemoryMailStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn history(&self) -> Vec<HistoryRecord> {
        self.history.lock().clone()
    }

    pub fn queue(&self) -> Vec<QueueRecord> {
        self.queue.lock().clone()
    }
}

#[async_trait]
impl HistoryRepository for InMemoryMailStore {
    async fn insert_history(&self, record: &HistoryRecord) -> anyhow::Result<i64> {
        let mut history = self.history.lock();
        let id = history.len() as i64 + 1;
        let mut stored = record.clone();
        stored.id = Some(id);
        history.push(stored);
        Ok(id)
    }
}

#[async_trait]
impl QueueRepository for InMemoryMailStore {
    async fn insert_queue(&self, record: &QueueRecord) -> anyhow::Result<i64> {
        let mut queue = self.queue.lock();
        let id = queue.len() as i64 + 1;
        let mut stored = record.clone();
        stored.id = Some(id);
        queue.push(stored);
        Ok(id)
    }
}
