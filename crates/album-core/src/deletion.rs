//! Delayed cleanup of published messages.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::repository::Repository;
use crate::transport::Transport;

/// Deletes published messages once their visibility window ends.
///
/// Deletion is best-effort: a message that is already gone or cannot be
/// removed is logged and skipped.
pub struct DeletionScheduler {
    transport: Arc<dyn Transport>,
    repo: Arc<dyn Repository>,
}

impl DeletionScheduler {
    pub fn new(transport: Arc<dyn Transport>, repo: Arc<dyn Repository>) -> Self {
        Self { transport, repo }
    }

    /// Delete `message_ids` from `destination` after `delay`.
    pub fn schedule(
        &self,
        destination: i64,
        message_ids: Vec<i32>,
        delay: Duration,
    ) -> JoinHandle<()> {
        self.spawn(destination, message_ids, delay, None)
    }

    /// Like [`schedule`](Self::schedule), then marks the stored publication done.
    pub fn schedule_recorded(
        &self,
        publication_id: i64,
        destination: i64,
        message_ids: Vec<i32>,
        delay: Duration,
    ) -> JoinHandle<()> {
        self.spawn(destination, message_ids, delay, Some(publication_id))
    }

    /// Re-schedule deletions that were pending when the process last stopped.
    ///
    /// Overdue publications are deleted right away. Returns how many were scheduled.
    pub async fn resume_pending(&self) -> usize {
        let pending = match self.repo.pending_publications().await {
            Ok(pending) => pending,
            Err(e) => {
                warn!("Could not load pending deletions: {}", e);
                return 0;
            }
        };

        let now = Utc::now();
        for record in &pending {
            let delay = (record.delete_at - now).to_std().unwrap_or(Duration::ZERO);
            debug!(
                key = %record.key,
                delay_secs = delay.as_secs(),
                "Resuming scheduled deletion"
            );
            self.schedule_recorded(
                record.id,
                record.destination,
                record.message_ids.clone(),
                delay,
            );
        }

        if !pending.is_empty() {
            info!(count = pending.len(), "Resumed pending deletions");
        }
        pending.len()
    }

    fn spawn(
        &self,
        destination: i64,
        message_ids: Vec<i32>,
        delay: Duration,
        publication_id: Option<i64>,
    ) -> JoinHandle<()> {
        let transport = Arc::clone(&self.transport);
        let repo = Arc::clone(&self.repo);

        tokio::spawn(async move {
            tokio::time::sleep(delay).await;

            let mut deleted = 0;
            for message_id in &message_ids {
                match transport.delete_message(destination, *message_id).await {
                    Ok(()) => deleted += 1,
                    Err(e) => debug!(message_id, "Failed to delete message: {}", e),
                }
            }
            debug!(
                destination,
                deleted,
                total = message_ids.len(),
                "Scheduled deletion finished"
            );

            if let Some(id) = publication_id {
                if let Err(e) = repo.complete_publication(id).await {
                    warn!(publication_id = id, "Failed to mark publication deleted: {}", e);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockTransport;
    use crate::repository::MemoryRepository;

    #[tokio::test(start_paused = true)]
    async fn test_deletes_after_delay_not_before() {
        let transport = Arc::new(MockTransport::new());
        let scheduler = DeletionScheduler::new(transport.clone(), Arc::new(MemoryRepository::new()));

        let handle = scheduler.schedule(-100, vec![4, 5, 6], Duration::from_secs(30));

        tokio::time::sleep(Duration::from_secs(29)).await;
        assert!(transport.deleted().is_empty());

        handle.await.unwrap();
        assert_eq!(transport.deleted(), vec![(-100, 4), (-100, 5), (-100, 6)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_failures_are_swallowed() {
        let transport = Arc::new(MockTransport::new());
        transport.fail_deletes();
        let scheduler = DeletionScheduler::new(transport.clone(), Arc::new(MemoryRepository::new()));

        let handle = scheduler.schedule(-100, vec![1], Duration::from_secs(1));
        assert!(handle.await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_resume_pending_marks_done() {
        let transport = Arc::new(MockTransport::new());
        let repo = Arc::new(MemoryRepository::new());
        let past = Utc::now() - chrono::Duration::seconds(60);
        repo.record_publication("k", -100, &[9], past, past).await.unwrap();

        let scheduler = DeletionScheduler::new(transport.clone(), repo.clone());
        assert_eq!(scheduler.resume_pending().await, 1);

        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(transport.deleted(), vec![(-100, 9)]);
        assert!(repo.pending_publications().await.unwrap().is_empty());
    }
}
