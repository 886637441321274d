//! In-memory history backend using DashMap.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::{DeliveryUpdate, NotificationInstance, NotificationStatus};
use crate::storage::{StoreError, StoreResult};

use super::backend::HistoryBackend;

struct Row {
    /// Insertion sequence, breaks `created_at` ties for newest-first ordering
    seq: u64,
    instance: NotificationInstance,
}

#[derive(Default)]
pub struct MemoryHistoryBackend {
    rows: DashMap<Uuid, Row>,
    next_seq: AtomicU64,
}

impl MemoryHistoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl HistoryBackend for MemoryHistoryBackend {
    async fn create(&self, instance: NotificationInstance) -> StoreResult<Uuid> {
        let id = instance.id;
        let seq = self.next_seq.fetch_add(1, Ordering::Relaxed);
        self.rows.insert(id, Row { seq, instance });
        Ok(id)
    }

    async fn find_pending(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
        Ok(self
            .rows
            .iter()
            .filter(|r| {
                r.instance.correlation_id == correlation_id && r.instance.status.is_cancellable()
            })
            .map(|r| r.instance.clone())
            .collect())
    }

    async fn mark_failed(&self, ids: &[Uuid], reason: &str) -> StoreResult<usize> {
        let mut updated = 0;

        for id in ids {
            if let Some(mut row) = self.rows.get_mut(id) {
                if row.instance.status.is_cancellable() {
                    row.instance.status = NotificationStatus::Failed;
                    row.instance.error_message = Some(reason.to_string());
                    updated += 1;
                }
            }
        }

        Ok(updated)
    }

    async fn record_delivery(
        &self,
        id: Uuid,
        update: DeliveryUpdate,
    ) -> StoreResult<NotificationInstance> {
        let mut row = self.rows.get_mut(&id).ok_or(StoreError::NotFound(id))?;
        let current = row.instance.status;

        if !current.can_transition_to(update.status) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: update.status,
            });
        }

        let instance = &mut row.instance;
        instance.status = update.status;
        if update.provider.is_some() {
            instance.provider = update.provider;
        }
        if update.provider_message_id.is_some() {
            instance.provider_message_id = update.provider_message_id;
        }
        if update.error_message.is_some() {
            instance.error_message = update.error_message;
        }
        if update.sent_at.is_some() {
            instance.sent_at = update.sent_at;
        }

        Ok(instance.clone())
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<NotificationInstance>> {
        Ok(self.rows.get(&id).map(|r| r.instance.clone()))
    }

    async fn list(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
        let mut rows: Vec<(u64, NotificationInstance)> = self
            .rows
            .iter()
            .filter(|r| r.instance.correlation_id == correlation_id)
            .map(|r| (r.seq, r.instance.clone()))
            .collect();

        rows.sort_by(|(seq_a, a), (seq_b, b)| {
            b.created_at.cmp(&a.created_at).then(seq_b.cmp(seq_a))
        });

        Ok(rows.into_iter().map(|(_, instance)| instance).collect())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::notification::{Channel, RenderedMessage};

    fn instance(correlation_id: Uuid, channel: Channel) -> NotificationInstance {
        NotificationInstance::pending(
            correlation_id,
            "reservation_confirmed",
            channel,
            "guest@example.com",
            "Guest",
            RenderedMessage {
                body: "Hello".to_string(),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    fn update(status: NotificationStatus) -> DeliveryUpdate {
        DeliveryUpdate {
            status,
            provider: None,
            provider_message_id: None,
            error_message: None,
            sent_at: None,
        }
    }

    #[tokio::test]
    async fn test_list_newest_first() {
        let backend = MemoryHistoryBackend::new();
        let correlation = Uuid::new_v4();

        let first = backend.create(instance(correlation, Channel::Email)).await.unwrap();
        let second = backend.create(instance(correlation, Channel::Sms)).await.unwrap();
        backend
            .create(instance(Uuid::new_v4(), Channel::Sms))
            .await
            .unwrap();

        let ids: Vec<Uuid> = backend
            .list(correlation)
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec![second, first]);
    }

    #[tokio::test]
    async fn test_mark_failed_only_touches_cancellable_rows() {
        let backend = MemoryHistoryBackend::new();
        let correlation = Uuid::new_v4();

        let pending = backend.create(instance(correlation, Channel::Email)).await.unwrap();
        let sent = backend.create(instance(correlation, Channel::Sms)).await.unwrap();
        backend
            .record_delivery(sent, update(NotificationStatus::Sent))
            .await
            .unwrap();

        let updated = backend
            .mark_failed(&[pending, sent], "Cancelled")
            .await
            .unwrap();
        assert_eq!(updated, 1);

        let pending = backend.get(pending).await.unwrap().unwrap();
        assert_eq!(pending.status, NotificationStatus::Failed);
        assert_eq!(pending.error_message.as_deref(), Some("Cancelled"));

        let sent = backend.get(sent).await.unwrap().unwrap();
        assert_eq!(sent.status, NotificationStatus::Sent);
    }

    #[tokio::test]
    async fn test_find_pending_includes_queued() {
        let backend = MemoryHistoryBackend::new();
        let correlation = Uuid::new_v4();

        let queued = backend.create(instance(correlation, Channel::Email)).await.unwrap();
        backend
            .record_delivery(queued, update(NotificationStatus::Queued))
            .await
            .unwrap();
        let delivered = backend.create(instance(correlation, Channel::Push)).await.unwrap();
        backend
            .record_delivery(delivered, update(NotificationStatus::Sent))
            .await
            .unwrap();

        let pending = backend.find_pending(correlation).await.unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, queued);
    }

    #[tokio::test]
    async fn test_record_delivery_sets_provider_fields() {
        let backend = MemoryHistoryBackend::new();
        let id = backend
            .create(instance(Uuid::new_v4(), Channel::Whatsapp))
            .await
            .unwrap();
        let sent_at = Utc::now();

        let updated = backend
            .record_delivery(
                id,
                DeliveryUpdate {
                    status: NotificationStatus::Sent,
                    provider: Some("twilio".to_string()),
                    provider_message_id: Some("SM123".to_string()),
                    error_message: None,
                    sent_at: Some(sent_at),
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.status, NotificationStatus::Sent);
        assert_eq!(updated.provider.as_deref(), Some("twilio"));
        assert_eq!(updated.provider_message_id.as_deref(), Some("SM123"));
        assert_eq!(updated.sent_at, Some(sent_at));
    }

    #[tokio::test]
    async fn test_record_delivery_rejects_illegal_transition() {
        let backend = MemoryHistoryBackend::new();
        let id = backend
            .create(instance(Uuid::new_v4(), Channel::Email))
            .await
            .unwrap();
        backend.mark_failed(&[id], "Cancelled").await.unwrap();

        let result = backend
            .record_delivery(id, update(NotificationStatus::Sent))
            .await;
        assert!(matches!(
            result,
            Err(StoreError::InvalidTransition {
                from: NotificationStatus::Failed,
                to: NotificationStatus::Sent
            })
        ));
    }

    #[tokio::test]
    async fn test_record_delivery_unknown_id() {
        let backend = MemoryHistoryBackend::new();
        let result = backend
            .record_delivery(Uuid::new_v4(), update(NotificationStatus::Sent))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }
}
