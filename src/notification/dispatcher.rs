use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::Serialize;
use uuid::Uuid;

use crate::config::DispatchConfig;
use crate::history::HistoryBackend;
use crate::metrics::DispatchMetrics;
use crate::preference::{PreferenceResolver, Preferences};
use crate::queue::{QueueBackend, QueueEntry};
use crate::reservation::{Reservation, ReservationStore};
use crate::storage::{Backends, StoreResult};
use crate::template::TemplateResolver;

use super::error::DispatchError;
use super::recipient::RecipientResolver;
use super::types::{
    Channel, DeliveryUpdate, DispatchEvent, DispatchResult, NotificationInstance,
};
use super::variables::TemplateVariables;

/// Statistics for the dispatch coordinator
#[derive(Debug, Default)]
pub struct DispatcherStats {
    /// Total dispatch calls
    pub total_dispatches: AtomicU64,
    /// Notification instances queued across all channels
    pub total_queued: AtomicU64,
    /// Per-channel failures
    pub total_channel_errors: AtomicU64,
    /// Calls that referenced an unknown or unreadable reservation
    pub events_not_found: AtomicU64,
}

impl DispatcherStats {
    pub fn snapshot(&self) -> DispatcherStatsSnapshot {
        DispatcherStatsSnapshot {
            total_dispatches: self.total_dispatches.load(Ordering::Relaxed),
            total_queued: self.total_queued.load(Ordering::Relaxed),
            total_channel_errors: self.total_channel_errors.load(Ordering::Relaxed),
            events_not_found: self.events_not_found.load(Ordering::Relaxed),
        }
    }
}

/// Snapshot of dispatcher statistics
#[derive(Debug, Clone, Serialize)]
pub struct DispatcherStatsSnapshot {
    pub total_dispatches: u64,
    pub total_queued: u64,
    pub total_channel_errors: u64,
    pub events_not_found: u64,
}

/// Everything a single channel task reads; shared by reference across tasks
struct ChannelContext<'a> {
    event: &'a DispatchEvent,
    reservation: &'a Reservation,
    prefs: Option<&'a Preferences>,
    variables: &'a serde_json::Value,
    locale: &'a str,
    scheduled_for: DateTime<Utc>,
    priority: i32,
}

/// Turns dispatch events into rendered, persisted and queued notifications
pub struct DispatchCoordinator {
    reservations: Arc<dyn ReservationStore>,
    templates: TemplateResolver,
    preferences: PreferenceResolver,
    history: Arc<dyn HistoryBackend>,
    queue: Arc<dyn QueueBackend>,
    config: DispatchConfig,
    stats: DispatcherStats,
}

impl DispatchCoordinator {
    pub fn new(backends: &Backends, config: DispatchConfig) -> Self {
        Self {
            reservations: backends.reservations.clone(),
            templates: TemplateResolver::new(
                backends.templates.clone(),
                config.fallback_locale.clone(),
            ),
            preferences: PreferenceResolver::new(backends.preferences.clone()),
            history: backends.history.clone(),
            queue: backends.queue.clone(),
            config,
            stats: DispatcherStats::default(),
        }
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    pub fn preferences(&self) -> &PreferenceResolver {
        &self.preferences
    }

    pub fn history_backend(&self) -> &Arc<dyn HistoryBackend> {
        &self.history
    }

    pub fn queue_backend(&self) -> &Arc<dyn QueueBackend> {
        &self.queue
    }

    pub fn stats(&self) -> DispatcherStatsSnapshot {
        self.stats.snapshot()
    }

    /// Resolve channels, render and persist one notification per channel.
    ///
    /// Only an unknown reservation fails the whole call. Every other failure
    /// is recorded against its channel and the remaining channels proceed.
    #[tracing::instrument(
        name = "dispatch",
        skip(self, event),
        fields(correlation_id = %event.correlation_id, type_code = %event.type_code)
    )]
    pub async fn dispatch(&self, event: DispatchEvent) -> DispatchResult {
        let started = Instant::now();
        self.stats.total_dispatches.fetch_add(1, Ordering::Relaxed);

        let result = self.dispatch_event(&event).await;

        self.stats
            .total_queued
            .fetch_add(result.queued_ids.len() as u64, Ordering::Relaxed);
        DispatchMetrics::record_result(&result, started.elapsed().as_secs_f64());

        tracing::info!(
            success = result.success,
            queued = result.queued_ids.len(),
            errors = result.errors.len(),
            "Dispatch completed"
        );

        result
    }

    async fn dispatch_event(&self, event: &DispatchEvent) -> DispatchResult {
        let reservation = match self.reservations.find(event.correlation_id).await {
            Ok(Some(reservation)) => reservation,
            Ok(None) => {
                tracing::warn!("Reservation not found, nothing dispatched");
                return self.fail_call(DispatchError::EventNotFound(event.correlation_id));
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to load reservation");
                return self.fail_call(DispatchError::Persistence(e));
            }
        };

        let variables = TemplateVariables::from_reservation(&reservation, &self.config).to_json();

        let resolved = self
            .preferences
            .resolve(
                reservation.account_id,
                reservation.merchant_id(),
                &self.config.default_channels,
            )
            .await;
        let prefs = resolved.row.as_ref();

        let channels = self.effective_channels(event, &reservation, &resolved.channels);
        let locale = self.effective_locale(event, &reservation, prefs);

        tracing::debug!(channels = ?channels, locale = %locale, "Resolved dispatch targets");

        let ctx = ChannelContext {
            event,
            reservation: &reservation,
            prefs,
            variables: &variables,
            locale: &locale,
            scheduled_for: event.scheduled_for.unwrap_or_else(Utc::now),
            priority: event.priority.unwrap_or(self.config.default_priority),
        };

        let outcomes = join_all(
            channels
                .iter()
                .map(|&channel| self.dispatch_channel(channel, &ctx)),
        )
        .await;

        let mut result = DispatchResult::default();
        for (channel, outcome) in channels.into_iter().zip(outcomes) {
            match outcome {
                Ok(id) => {
                    DispatchMetrics::record_queued(channel);
                    result.queued_ids.push(id);
                }
                Err(e) => {
                    tracing::warn!(channel = %channel, error = %e, "Channel dispatch failed");
                    DispatchMetrics::record_error(Some(channel), e.code());
                    self.stats
                        .total_channel_errors
                        .fetch_add(1, Ordering::Relaxed);
                    result.errors.push(e.into_failure(Some(channel)));
                }
            }
        }

        result.success = !result.queued_ids.is_empty();
        result
    }

    async fn dispatch_channel(
        &self,
        channel: Channel,
        ctx: &ChannelContext<'_>,
    ) -> Result<Uuid, DispatchError> {
        let recipient = RecipientResolver::resolve(channel, ctx.reservation, ctx.prefs)?;

        let template = self
            .templates
            .lookup(
                ctx.reservation.merchant_id(),
                &ctx.event.type_code,
                channel,
                ctx.locale,
            )
            .await
            .ok_or_else(|| DispatchError::Configuration {
                type_code: ctx.event.type_code.clone(),
                channel,
                locale: ctx.locale.to_string(),
            })?;

        let content = template.render(ctx.variables)?;

        let instance = NotificationInstance::pending(
            ctx.reservation.id,
            &ctx.event.type_code,
            channel,
            recipient,
            &ctx.reservation.guest_name,
            content,
            ctx.scheduled_for,
        );
        let id = self.history.create(instance).await?;

        let entry = QueueEntry::new(id, ctx.priority, ctx.scheduled_for);
        if let Err(e) = self.queue.enqueue(entry).await {
            // Keep history consistent with the queue: no pending row without an entry
            let reason = format!("Queue write failed: {}", e);
            if let Err(mark_err) = self.history.mark_failed(&[id], &reason).await {
                tracing::error!(
                    notification_id = %id,
                    error = %mark_err,
                    "Failed to mark unqueued notification as failed"
                );
            }
            return Err(e.into());
        }

        tracing::debug!(
            notification_id = %id,
            channel = %channel,
            priority = ctx.priority,
            process_after = %ctx.scheduled_for,
            "Notification queued"
        );

        Ok(id)
    }

    fn fail_call(&self, error: DispatchError) -> DispatchResult {
        self.stats.events_not_found.fetch_add(1, Ordering::Relaxed);
        DispatchMetrics::record_error(None, error.code());
        DispatchResult::failed(error.into_failure(None))
    }

    fn effective_channels(
        &self,
        event: &DispatchEvent,
        reservation: &Reservation,
        account_channels: &[Channel],
    ) -> Vec<Channel> {
        let channels = match event.channels.as_deref() {
            Some(explicit) if !explicit.is_empty() => explicit.to_vec(),
            _ if reservation.account_id.is_none() => {
                let mut channels = self.config.guest_channels.clone();
                if self.config.guest_sms_when_phone && reservation.has_phone() {
                    channels.push(Channel::Sms);
                }
                channels
            }
            _ => account_channels.to_vec(),
        };

        dedup_channels(channels)
    }

    fn effective_locale(
        &self,
        event: &DispatchEvent,
        reservation: &Reservation,
        prefs: Option<&Preferences>,
    ) -> String {
        [
            event.locale.as_deref(),
            reservation.guest_locale.as_deref(),
            prefs.and_then(|p| p.preferred_locale.as_deref()),
        ]
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or(self.config.default_locale.as_str())
        .to_string()
    }

    /// Audit trail for a reservation, newest first
    pub async fn history(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
        self.history.list(correlation_id).await
    }

    /// Delivery Worker write-back
    #[tracing::instrument(skip(self, update), fields(status = %update.status))]
    pub async fn record_delivery(
        &self,
        id: Uuid,
        update: DeliveryUpdate,
    ) -> StoreResult<NotificationInstance> {
        self.history.record_delivery(id, update).await
    }
}

/// Remove repeated channels, keeping first occurrence order
fn dedup_channels(channels: Vec<Channel>) -> Vec<Channel> {
    let mut seen = Vec::with_capacity(channels.len());
    for channel in channels {
        if !seen.contains(&channel) {
            seen.push(channel);
        }
    }
    seen
}

#[cfg(test)]
mod tests {
    use chrono::{NaiveDate, NaiveTime};

    use async_trait::async_trait;

    use super::*;
    use crate::history::MemoryHistoryBackend;
    use crate::notification::NotificationStatus;
    use crate::preference::PreferenceStore;
    use crate::queue::{MemoryQueueBackend, QueueStats};
    use crate::reservation::{Location, MemoryReservationStore};
    use crate::storage::StoreError;
    use crate::template::{MemoryTemplateStore, Template, TemplateStore};

    struct Fixture {
        coordinator: DispatchCoordinator,
        reservations: Arc<MemoryReservationStore>,
        templates: Arc<MemoryTemplateStore>,
        backends: Backends,
    }

    fn fixture() -> Fixture {
        let reservations = Arc::new(MemoryReservationStore::new());
        let templates = Arc::new(MemoryTemplateStore::new());
        let mut backends = Backends::memory();
        backends.reservations = reservations.clone();
        backends.templates = templates.clone();

        Fixture {
            coordinator: DispatchCoordinator::new(&backends, DispatchConfig::default()),
            reservations,
            templates,
            backends,
        }
    }

    fn reservation(account_id: Option<Uuid>, phone: Option<&str>) -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            guest_name: "Hoa".to_string(),
            guest_email: Some("hoa@example.com".to_string()),
            guest_phone: phone.map(str::to_string),
            guest_locale: None,
            account_id,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            party_size: 3,
            reservation_code: "RSV-9".to_string(),
            special_requests: None,
            section: None,
            location: Some(Location {
                id: Uuid::new_v4(),
                name: "Bun Cha House".to_string(),
                merchant_id: None,
            }),
        }
    }

    #[test]
    fn test_dedup_preserves_order() {
        assert_eq!(
            dedup_channels(vec![Channel::Sms, Channel::Email, Channel::Sms, Channel::Push]),
            vec![Channel::Sms, Channel::Email, Channel::Push]
        );
    }

    #[tokio::test]
    async fn test_unknown_reservation_fails_call() {
        let f = fixture();
        let result = f
            .coordinator
            .dispatch(DispatchEvent::new(Uuid::new_v4(), "reservation_confirmed"))
            .await;

        assert!(!result.success);
        assert!(result.queued_ids.is_empty());
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].channel, None);
        assert_eq!(result.errors[0].code, "EVENT_NOT_FOUND");
    }

    #[tokio::test]
    async fn test_guest_with_phone_gets_email_and_sms() {
        let f = fixture();
        let r = reservation(None, Some("+84900000000"));
        f.reservations.insert(r.clone());
        for channel in [Channel::Email, Channel::Sms] {
            f.templates
                .upsert(Template::new(
                    None,
                    "reservation_confirmed",
                    channel,
                    "en",
                    "See you at {{restaurant_name}}, {{time}}",
                ))
                .await
                .unwrap();
        }

        let result = f
            .coordinator
            .dispatch(DispatchEvent::new(r.id, "reservation_confirmed"))
            .await;

        assert!(result.success);
        assert_eq!(result.queued_ids.len(), 2);

        let history = f.coordinator.history(r.id).await.unwrap();
        assert!(history.iter().all(|n| n.status == NotificationStatus::Pending));
        assert!(history
            .iter()
            .all(|n| n.content.body == "See you at Bun Cha House, 18:00"));
    }

    #[tokio::test]
    async fn test_effective_locale_order() {
        let f = fixture();
        let account = Uuid::new_v4();
        let mut r = reservation(Some(account), None);
        let mut prefs = Preferences::new(account, None);
        prefs.preferred_locale = Some("vi".to_string());

        let event = DispatchEvent::new(r.id, "no_show");
        assert_eq!(f.coordinator.effective_locale(&event, &r, Some(&prefs)), "vi");

        r.guest_locale = Some("it".to_string());
        assert_eq!(f.coordinator.effective_locale(&event, &r, Some(&prefs)), "it");

        let event = event.locale("fr");
        assert_eq!(f.coordinator.effective_locale(&event, &r, Some(&prefs)), "fr");

        r.guest_locale = None;
        let event = DispatchEvent::new(r.id, "no_show");
        assert_eq!(f.coordinator.effective_locale(&event, &r, None), "en");
    }

    #[tokio::test]
    async fn test_account_without_prefs_uses_defaults() {
        let f = fixture();
        let r = reservation(Some(Uuid::new_v4()), Some("+84900000000"));

        let resolved = f
            .coordinator
            .preferences()
            .resolve(r.account_id, r.merchant_id(), &f.coordinator.config().default_channels)
            .await;
        assert!(resolved.row.is_none());

        let channels = f.coordinator.effective_channels(
            &DispatchEvent::new(r.id, "table_ready"),
            &r,
            &resolved.channels,
        );
        assert_eq!(channels, vec![Channel::Email, Channel::Push]);
    }

    #[tokio::test]
    async fn test_unreachable_preferences_fall_back_on_dispatch() {
        let f = fixture();
        let account = Uuid::new_v4();
        let r = reservation(Some(account), None);
        f.reservations.insert(r.clone());

        // Telegram without a chat id is not reachable
        let mut prefs = Preferences::new(account, None);
        prefs.telegram_enabled = true;
        prefs.preferred_locale = Some("vi".to_string());
        f.backends.preferences.upsert(prefs).await.unwrap();

        for channel in [Channel::Email, Channel::Push] {
            f.templates
                .upsert(Template::new(None, "table_ready", channel, "vi", "Ban da san sang"))
                .await
                .unwrap();
        }

        let result = f
            .coordinator
            .dispatch(DispatchEvent::new(r.id, "table_ready"))
            .await;

        assert!(result.success);
        assert_eq!(result.queued_ids.len(), 2);
        let rows = f.coordinator.history(r.id).await.unwrap();
        assert!(rows.iter().all(|n| n.channel != Channel::Telegram));
    }

    #[tokio::test]
    async fn test_explicit_channels_win() {
        let f = fixture();
        let r = reservation(None, None);
        let event = DispatchEvent::new(r.id, "table_ready")
            .channels(vec![Channel::Push, Channel::Push, Channel::Email]);

        assert_eq!(
            f.coordinator.effective_channels(&event, &r, &[]),
            vec![Channel::Push, Channel::Email]
        );

        let empty = DispatchEvent::new(r.id, "table_ready").channels(vec![]);
        assert_eq!(
            f.coordinator.effective_channels(&empty, &r, &[]),
            vec![Channel::Email]
        );
    }

    #[tokio::test]
    async fn test_queue_entry_uses_priority_and_schedule() {
        let f = fixture();
        let r = reservation(None, None);
        f.reservations.insert(r.clone());
        f.templates
            .upsert(Template::new(None, "reminder_2h", Channel::Email, "en", "Soon"))
            .await
            .unwrap();
        let at = Utc::now() + chrono::Duration::hours(3);

        let result = f
            .coordinator
            .dispatch(
                DispatchEvent::new(r.id, "reminder_2h")
                    .scheduled_for(at)
                    .priority(2),
            )
            .await;

        let entry = f
            .backends
            .queue
            .get(result.queued_ids[0])
            .await
            .unwrap()
            .unwrap();
        assert_eq!(entry.priority, 2);
        assert_eq!(entry.process_after, at);
    }

    /// Queue that refuses SMS entries, looking the channel up in history
    struct SmsRefusingQueue {
        inner: MemoryQueueBackend,
        history: Arc<MemoryHistoryBackend>,
    }

    #[async_trait]
    impl QueueBackend for SmsRefusingQueue {
        async fn enqueue(&self, entry: QueueEntry) -> StoreResult<()> {
            let row = self.history.get(entry.notification_id).await?;
            if row.is_some_and(|n| n.channel == Channel::Sms) {
                return Err(StoreError::InvalidData("queue unavailable".to_string()));
            }
            self.inner.enqueue(entry).await
        }

        async fn cancel(&self, notification_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
            self.inner.cancel(notification_ids).await
        }

        async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<QueueEntry>> {
            self.inner.claim_due(now, limit).await
        }

        async fn get(&self, notification_id: Uuid) -> StoreResult<Option<QueueEntry>> {
            self.inner.get(notification_id).await
        }

        async fn stats(&self) -> QueueStats {
            self.inner.stats().await
        }
    }

    /// History log whose inserts fail for SMS rows
    struct SmsRefusingHistory {
        inner: MemoryHistoryBackend,
    }

    #[async_trait]
    impl HistoryBackend for SmsRefusingHistory {
        async fn create(&self, instance: NotificationInstance) -> StoreResult<Uuid> {
            if instance.channel == Channel::Sms {
                return Err(StoreError::InvalidData("history unavailable".to_string()));
            }
            self.inner.create(instance).await
        }

        async fn find_pending(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
            self.inner.find_pending(correlation_id).await
        }

        async fn mark_failed(&self, ids: &[Uuid], reason: &str) -> StoreResult<usize> {
            self.inner.mark_failed(ids, reason).await
        }

        async fn record_delivery(
            &self,
            id: Uuid,
            update: DeliveryUpdate,
        ) -> StoreResult<NotificationInstance> {
            self.inner.record_delivery(id, update).await
        }

        async fn get(&self, id: Uuid) -> StoreResult<Option<NotificationInstance>> {
            self.inner.get(id).await
        }

        async fn list(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
            self.inner.list(correlation_id).await
        }
    }

    async fn seed_email_and_sms(f: &Fixture) -> Reservation {
        let r = reservation(None, Some("+84911111111"));
        f.reservations.insert(r.clone());
        for channel in [Channel::Email, Channel::Sms] {
            f.templates
                .upsert(Template::new(None, "reservation_confirmed", channel, "en", "Hi {{guest_name}}"))
                .await
                .unwrap();
        }
        r
    }

    #[tokio::test]
    async fn test_queue_failure_marks_row_failed() {
        let f = fixture();
        let r = seed_email_and_sms(&f).await;

        let history = Arc::new(MemoryHistoryBackend::new());
        let mut backends = f.backends.clone();
        backends.history = history.clone();
        backends.queue = Arc::new(SmsRefusingQueue {
            inner: MemoryQueueBackend::new(),
            history: history.clone(),
        });
        let coordinator = DispatchCoordinator::new(&backends, DispatchConfig::default());

        let result = coordinator
            .dispatch(DispatchEvent::new(r.id, "reservation_confirmed"))
            .await;

        assert!(result.success);
        assert_eq!(result.queued_ids.len(), 1);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].channel, Some(Channel::Sms));
        assert_eq!(result.errors[0].code, "PERSISTENCE_ERROR");

        let rows = coordinator.history(r.id).await.unwrap();
        assert_eq!(rows.len(), 2);
        let sms = rows.iter().find(|n| n.channel == Channel::Sms).unwrap();
        assert_eq!(sms.status, NotificationStatus::Failed);
        assert!(sms
            .error_message
            .as_deref()
            .is_some_and(|m| m.starts_with("Queue write failed:")));
        assert_eq!(history.find_pending(r.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_history_failure_skips_channel() {
        let f = fixture();
        let r = seed_email_and_sms(&f).await;

        let mut backends = f.backends.clone();
        backends.history = Arc::new(SmsRefusingHistory {
            inner: MemoryHistoryBackend::new(),
        });
        let coordinator = DispatchCoordinator::new(&backends, DispatchConfig::default());

        let result = coordinator
            .dispatch(DispatchEvent::new(r.id, "reservation_confirmed"))
            .await;

        assert!(result.success);
        assert_eq!(result.queued_ids.len(), 1);
        assert_eq!(result.errors[0].code, "PERSISTENCE_ERROR");

        let rows = coordinator.history(r.id).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].channel, Channel::Email);
        assert_eq!(backends.queue.stats().await.pending, 1);
    }
}
