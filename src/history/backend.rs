//! Backend trait for the notification history log.

use async_trait::async_trait;
use uuid::Uuid;

use crate::notification::{DeliveryUpdate, NotificationInstance};
use crate::storage::StoreResult;

#[async_trait]
pub trait HistoryBackend: Send + Sync {
    /// Append a new instance; returns its id.
    async fn create(&self, instance: NotificationInstance) -> StoreResult<Uuid>;

    /// Instances for a correlation id that are still `pending` or `queued`.
    async fn find_pending(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>>;

    /// Move the given rows to `failed` with `reason`.
    ///
    /// Only rows still `pending` or `queued` change, so a row a worker has
    /// meanwhile sent keeps its delivery status. Returns the number updated.
    async fn mark_failed(&self, ids: &[Uuid], reason: &str) -> StoreResult<usize>;

    /// Apply a Delivery Worker write-back, rejecting illegal transitions.
    async fn record_delivery(
        &self,
        id: Uuid,
        update: DeliveryUpdate,
    ) -> StoreResult<NotificationInstance>;

    async fn get(&self, id: Uuid) -> StoreResult<Option<NotificationInstance>>;

    /// Every instance for a correlation id, newest first.
    async fn list(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>>;
}
