//! Background persistence of dispatch results
//!
//! Each record is written on its own task. The dispatcher never waits for
//! the write and a failed write is only logged.

use std::sync::Arc;

use mr_common::{HistoryRecord, QueueRecord};
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::repository::{HistoryRepository, QueueRepository};

#[derive(Clone)]
pub struct MailRecorder {
    history: Arc<dyn HistoryRepository>,
    queue: Arc<dyn QueueRepository>,
}

impl MailRecorder {
    pub fn new(history: Arc<dyn HistoryRepository>, queue: Arc<dyn QueueRepository>) -> Self {
        Self { history, queue }
    }

    /// Spawn a history insert. The handle may be dropped.
    pub fn record_history(&self, record: HistoryRecord) -> JoinHandle<()> {
        let history = self.history.clone();
        tokio::spawn(async move {
            match history.insert_history(&record).await {
                Ok(id) => debug!(id, provider = %record.provider, "Saved email history"),
                Err(e) => error!(
                    error = %e,
                    sender = %record.sender,
                    provider = %record.provider,
                    "Failed to save email history"
                ),
            }
        })
    }

    /// Spawn a queue insert. The handle may be dropped.
    pub fn record_queue(&self, record: QueueRecord) -> JoinHandle<()> {
        let queue = self.queue.clone();
        tokio::spawn(async move {
            match queue.insert_queue(&record).await {
                Ok(id) => debug!(id, reason = %record.reason, "Saved email to queue"),
                Err(e) => error!(
                    error = %e,
                    sender = %record.sender,
                    reason = %record.reason,
                    "Failed to save email to queue"
                ),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::InMemoryMailStore;
    use async_trait::async_trait;
    use mr_common::MailMessage;

    struct FailingStore;

    #[async_trait]
    impl HistoryRepository for FailingStore {
        async fn insert_history(&self, _record: &HistoryRecord) -> anyhow::Result<i64> {
            anyhow::bail!("disk full")
        }
    }

    #[async_trait]
    impl QueueRepository for FailingStore {
        async fn insert_queue(&self, _record: &QueueRecord) -> anyhow::Result<i64> {
            anyhow::bail!("disk full")
        }
    }

    fn message() -> MailMessage {
        MailMessage::new("a@example.org", vec!["b@example.org".to_string()], "s", "t")
    }

    #[tokio::test]
    async fn test_records_are_written() {
        let store = Arc::new(InMemoryMailStore::new());
        let recorder = MailRecorder::new(store.clone(), store.clone());

        recorder
            .record_history(HistoryRecord::new(&message(), "SendGrid", None, ""))
            .await
            .unwrap();
        recorder
            .record_queue(QueueRecord::new(&message(), "down"))
            .await
            .unwrap();

        assert_eq!(store.history().len(), 1);
        assert_eq!(store.history()[0].id, Some(1));
        assert_eq!(store.queue()[0].reason, "down");
    }

    #[tokio::test]
    async fn test_failures_do_not_panic() {
        let store = Arc::new(FailingStore);
        let recorder = MailRecorder::new(store.clone(), store);

        assert!(recorder
            .record_history(HistoryRecord::new(&message(), "MailGun", None, ""))
            .await
            .is_ok());
        assert!(recorder.record_queue(QueueRecord::new(&message(), "x")).await.is_ok());
    }
}
