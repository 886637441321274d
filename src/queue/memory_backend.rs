//! In-memory queue backend using DashMap.
//!
//! Entries are lost on service restart; intended for tests and single-node
//! development.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use uuid::Uuid;

use crate::metrics::{QUEUE_CANCELLED_TOTAL, QUEUE_ENQUEUED_TOTAL};
use crate::storage::StoreResult;

use super::backend::{QueueBackend, QueueEntry, QueueStats, QueueStatus};

/// In-memory queue backend keyed by notification id
#[derive(Default)]
pub struct MemoryQueueBackend {
    entries: DashMap<Uuid, QueueEntry>,
}

impl MemoryQueueBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueBackend for MemoryQueueBackend {
    async fn enqueue(&self, entry: QueueEntry) -> StoreResult<()> {
        tracing::debug!(
            notification_id = %entry.notification_id,
            priority = entry.priority,
            process_after = %entry.process_after,
            "Notification enqueued"
        );
        self.entries.insert(entry.notification_id, entry);
        QUEUE_ENQUEUED_TOTAL.inc();
        Ok(())
    }

    async fn cancel(&self, notification_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        let mut cancelled = Vec::new();

        for id in notification_ids {
            if let Some(mut entry) = self.entries.get_mut(id) {
                if entry.status == QueueStatus::Pending {
                    entry.status = QueueStatus::Cancelled;
                    cancelled.push(*id);
                }
            }
        }

        QUEUE_CANCELLED_TOTAL.inc_by(cancelled.len() as u64);
        Ok(cancelled)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<QueueEntry>> {
        let mut due: Vec<QueueEntry> = self
            .entries
            .iter()
            .filter(|e| e.is_due(now))
            .map(|e| e.value().clone())
            .collect();

        due.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.process_after.cmp(&b.process_after))
                .then(a.created_at.cmp(&b.created_at))
        });

        let mut claimed = Vec::with_capacity(limit.min(due.len()));
        for candidate in due {
            if claimed.len() >= limit {
                break;
            }
            // Re-check under the shard lock; a concurrent cancel may have won
            if let Some(mut entry) = self.entries.get_mut(&candidate.notification_id) {
                if entry.is_due(now) {
                    entry.status = QueueStatus::Claimed;
                    claimed.push(entry.clone());
                }
            }
        }

        Ok(claimed)
    }

    async fn get(&self, notification_id: Uuid) -> StoreResult<Option<QueueEntry>> {
        Ok(self.entries.get(&notification_id).map(|e| e.value().clone()))
    }

    async fn stats(&self) -> QueueStats {
        let mut stats = QueueStats {
            backend_type: "memory".to_string(),
            ..Default::default()
        };

        for entry in self.entries.iter() {
            match entry.status {
                QueueStatus::Pending => stats.pending += 1,
                QueueStatus::Claimed => stats.claimed += 1,
                QueueStatus::Cancelled => stats.cancelled += 1,
            }
        }

        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_enqueue_and_get() {
        let backend = MemoryQueueBackend::new();
        let id = Uuid::new_v4();

        backend.enqueue(QueueEntry::new(id, 5, Utc::now())).await.unwrap();

        let entry = backend.get(id).await.unwrap().unwrap();
        assert_eq!(entry.priority, 5);
        assert_eq!(entry.status, QueueStatus::Pending);
    }

    #[tokio::test]
    async fn test_claim_orders_by_priority_then_process_after() {
        let backend = MemoryQueueBackend::new();
        let now = Utc::now();

        let low_early = Uuid::new_v4();
        let urgent_late = Uuid::new_v4();
        let urgent_early = Uuid::new_v4();

        backend
            .enqueue(QueueEntry::new(low_early, 5, now - Duration::minutes(30)))
            .await
            .unwrap();
        backend
            .enqueue(QueueEntry::new(urgent_late, 2, now - Duration::minutes(1)))
            .await
            .unwrap();
        backend
            .enqueue(QueueEntry::new(urgent_early, 2, now - Duration::minutes(10)))
            .await
            .unwrap();

        let claimed = backend.claim_due(now, 10).await.unwrap();
        let order: Vec<Uuid> = claimed.iter().map(|e| e.notification_id).collect();
        assert_eq!(order, vec![urgent_early, urgent_late, low_early]);
        assert!(claimed.iter().all(|e| e.status == QueueStatus::Claimed));
    }

    #[tokio::test]
    async fn test_claim_skips_future_and_respects_limit() {
        let backend = MemoryQueueBackend::new();
        let now = Utc::now();

        backend
            .enqueue(QueueEntry::new(Uuid::new_v4(), 1, now + Duration::hours(1)))
            .await
            .unwrap();
        for _ in 0..3 {
            backend
                .enqueue(QueueEntry::new(Uuid::new_v4(), 5, now))
                .await
                .unwrap();
        }

        assert_eq!(backend.claim_due(now, 2).await.unwrap().len(), 2);
        assert_eq!(backend.claim_due(now, 10).await.unwrap().len(), 1);
        assert!(backend.claim_due(now, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_cancel_leaves_claimed_entries() {
        let backend = MemoryQueueBackend::new();
        let now = Utc::now();
        let claimed_id = Uuid::new_v4();
        let pending_id = Uuid::new_v4();

        backend.enqueue(QueueEntry::new(claimed_id, 1, now)).await.unwrap();
        backend
            .enqueue(QueueEntry::new(pending_id, 1, now + Duration::hours(2)))
            .await
            .unwrap();
        backend.claim_due(now, 10).await.unwrap();

        let cancelled = backend
            .cancel(&[claimed_id, pending_id, Uuid::new_v4()])
            .await
            .unwrap();
        assert_eq!(cancelled, vec![pending_id]);

        let claimed = backend.get(claimed_id).await.unwrap().unwrap();
        assert_eq!(claimed.status, QueueStatus::Claimed);
        let pending = backend.get(pending_id).await.unwrap().unwrap();
        assert_eq!(pending.status, QueueStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_stats() {
        let backend = MemoryQueueBackend::new();
        let now = Utc::now();
        let a = Uuid::new_v4();

        backend.enqueue(QueueEntry::new(a, 1, now)).await.unwrap();
        backend
            .enqueue(QueueEntry::new(Uuid::new_v4(), 1, now))
            .await
            .unwrap();
        backend.cancel(&[a]).await.unwrap();

        let stats = backend.stats().await;
        assert_eq!(stats.backend_type, "memory");
        assert_eq!(stats.pending, 1);
        assert_eq!(stats.cancelled, 1);
        assert_eq!(stats.claimed, 0);
    }
}
