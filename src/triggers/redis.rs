use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::config::RedisConfig;
use crate::metrics::LifecycleMetrics;
use crate::notification::{type_codes, DispatchCoordinator, DispatchEvent, DispatchResult};
use crate::reservation::ReservationStore;
use crate::scheduler::{CancelReport, ReminderReport, RescheduleReport, Scheduler};
use crate::storage::StoreError;

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Message format published by the reservation service
#[derive(Debug, Deserialize)]
pub struct LifecycleMessage {
    /// e.g. `reservation.confirmed`
    pub event: String,
    pub reservation_id: Uuid,
    /// New start time; when absent it is read from the reservation
    #[serde(default)]
    pub starts_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub locale: Option<String>,
}

/// Reservation lifecycle events that produce notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleEvent {
    Confirmed,
    Updated,
    Cancelled,
    NoShow,
    TableReady,
}

impl LifecycleEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleEvent::Confirmed => "reservation.confirmed",
            LifecycleEvent::Updated => "reservation.updated",
            LifecycleEvent::Cancelled => "reservation.cancelled",
            LifecycleEvent::NoShow => "reservation.no_show",
            LifecycleEvent::TableReady => "reservation.table_ready",
        }
    }

    /// Notification type dispatched for this event
    pub fn type_code(&self) -> &'static str {
        match self {
            LifecycleEvent::Confirmed => type_codes::RESERVATION_CONFIRMED,
            LifecycleEvent::Updated => type_codes::RESERVATION_UPDATED,
            LifecycleEvent::Cancelled => type_codes::RESERVATION_CANCELLED,
            LifecycleEvent::NoShow => type_codes::NO_SHOW,
            LifecycleEvent::TableReady => type_codes::TABLE_READY,
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleEvent {
    type Err = LifecycleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reservation.confirmed" => Ok(LifecycleEvent::Confirmed),
            "reservation.updated" => Ok(LifecycleEvent::Updated),
            "reservation.cancelled" => Ok(LifecycleEvent::Cancelled),
            "reservation.no_show" => Ok(LifecycleEvent::NoShow),
            "reservation.table_ready" => Ok(LifecycleEvent::TableReady),
            other => Err(LifecycleError::UnknownEvent(other.to_string())),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    #[error("Invalid lifecycle payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),

    #[error("Unknown lifecycle event: {0}")]
    UnknownEvent(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// What one lifecycle message caused
#[derive(Debug, Clone, Serialize)]
pub struct LifecycleOutcome {
    pub event: LifecycleEvent,
    pub dispatch: DispatchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reminders: Option<ReminderReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rescheduled: Option<RescheduleReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancelled: Option<CancelReport>,
}

impl LifecycleOutcome {
    fn dispatched(event: LifecycleEvent, dispatch: DispatchResult) -> Self {
        Self {
            event,
            dispatch,
            reminders: None,
            rescheduled: None,
            cancelled: None,
        }
    }
}

/// Maps lifecycle messages onto dispatch and scheduler calls
pub struct LifecycleHandler {
    coordinator: Arc<DispatchCoordinator>,
    scheduler: Arc<Scheduler>,
    reservations: Arc<dyn ReservationStore>,
}

impl LifecycleHandler {
    pub fn new(
        coordinator: Arc<DispatchCoordinator>,
        scheduler: Arc<Scheduler>,
        reservations: Arc<dyn ReservationStore>,
    ) -> Self {
        Self {
            coordinator,
            scheduler,
            reservations,
        }
    }

    /// Parse and handle a raw pub/sub payload
    pub async fn handle_payload(&self, payload: &str) -> Result<LifecycleOutcome, LifecycleError> {
        let message: LifecycleMessage = serde_json::from_str(payload)?;
        self.handle(message).await
    }

    #[tracing::instrument(
        name = "lifecycle.handle",
        skip(self, message),
        fields(event = %message.event, reservation_id = %message.reservation_id)
    )]
    pub async fn handle(&self, message: LifecycleMessage) -> Result<LifecycleOutcome, LifecycleError> {
        let event: LifecycleEvent = message.event.parse()?;
        let id = message.reservation_id;

        let mut dispatch_event = DispatchEvent::new(id, event.type_code());
        if let Some(locale) = message.locale.clone() {
            dispatch_event = dispatch_event.locale(locale);
        }

        let outcome = match event {
            LifecycleEvent::Confirmed => {
                let dispatch = self.coordinator.dispatch(dispatch_event).await;
                let mut outcome = LifecycleOutcome::dispatched(event, dispatch);
                if let Some(starts_at) = self.event_time(&message).await? {
                    outcome.reminders =
                        Some(self.scheduler.schedule_default_reminders(id, starts_at).await);
                }
                outcome
            }
            LifecycleEvent::Updated => {
                let dispatch = self.coordinator.dispatch(dispatch_event).await;
                let mut outcome = LifecycleOutcome::dispatched(event, dispatch);
                if let Some(starts_at) = self.event_time(&message).await? {
                    outcome.rescheduled = Some(self.scheduler.reschedule(id, starts_at).await?);
                }
                outcome
            }
            LifecycleEvent::Cancelled => {
                // Cancel first so the cancellation notice itself survives.
                // The guest is told even when cancelling leftovers fails.
                let cancelled = match self.scheduler.cancel_all(id).await {
                    Ok(report) => Some(report),
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to cancel pending notifications");
                        None
                    }
                };
                let dispatch = self.coordinator.dispatch(dispatch_event).await;
                let mut outcome = LifecycleOutcome::dispatched(event, dispatch);
                outcome.cancelled = cancelled;
                outcome
            }
            LifecycleEvent::NoShow | LifecycleEvent::TableReady => {
                let dispatch = self.coordinator.dispatch(dispatch_event).await;
                LifecycleOutcome::dispatched(event, dispatch)
            }
        };

        tracing::info!(
            success = outcome.dispatch.success,
            queued = outcome.dispatch.queued_ids.len(),
            "Lifecycle event handled"
        );

        Ok(outcome)
    }

    async fn event_time(
        &self,
        message: &LifecycleMessage,
    ) -> Result<Option<DateTime<Utc>>, LifecycleError> {
        if let Some(starts_at) = message.starts_at {
            return Ok(Some(starts_at));
        }

        let starts_at = self
            .reservations
            .find(message.reservation_id)
            .await?
            .map(|r| r.starts_at());
        if starts_at.is_none() {
            tracing::warn!("Reservation not found, no reminders scheduled");
        }
        Ok(starts_at)
    }
}

/// Redis Pub/Sub subscriber for reservation lifecycle events
pub struct LifecycleSubscriber {
    config: RedisConfig,
    handler: Arc<LifecycleHandler>,
    shutdown: broadcast::Sender<()>,
}

impl LifecycleSubscriber {
    pub fn new(config: RedisConfig, handler: Arc<LifecycleHandler>) -> Self {
        let (shutdown, _) = broadcast::channel(1);
        Self {
            config,
            handler,
            shutdown,
        }
    }

    /// Get a shutdown signal sender
    pub fn shutdown_signal(&self) -> broadcast::Sender<()> {
        self.shutdown.clone()
    }

    /// Run until the shutdown signal fires, reconnecting after errors
    pub async fn start(&self) -> anyhow::Result<()> {
        if self.config.channels.is_empty() {
            tracing::info!("No Redis channels configured, skipping lifecycle subscriber");
            return Ok(());
        }

        tracing::info!(channels = ?self.config.channels, "Starting lifecycle subscriber");
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            match self.run_subscription_loop(&self.config.channels).await {
                Ok(()) => {
                    tracing::info!("Lifecycle subscriber stopped gracefully");
                    break;
                }
                Err(e) => {
                    LifecycleMetrics::set_connected(false);
                    tracing::error!(error = %e, "Redis subscription error, reconnecting in 5 seconds...");
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }

        LifecycleMetrics::set_connected(false);
        Ok(())
    }

    async fn run_subscription_loop(&self, channels: &[String]) -> anyhow::Result<()> {
        let client = redis::Client::open(self.config.url.as_str())?;
        let mut pubsub = client.get_async_pubsub().await?;

        for channel in channels {
            if channel.contains('*') || channel.contains('?') || channel.contains('[') {
                pubsub.psubscribe(channel).await?;
                tracing::debug!(pattern = %channel, "Subscribed to pattern");
            } else {
                pubsub.subscribe(channel).await?;
                tracing::debug!(channel = %channel, "Subscribed to channel");
            }
        }

        LifecycleMetrics::set_connected(true);
        tracing::info!("Redis subscription established");

        let mut message_stream = pubsub.on_message();
        let mut shutdown_rx = self.shutdown.subscribe();

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    tracing::info!("Received shutdown signal");
                    return Ok(());
                }
                msg = message_stream.next() => {
                    let Some(msg) = msg else {
                        anyhow::bail!("Redis message stream ended");
                    };
                    let channel = msg.get_channel_name().to_string();
                    let payload: String = match msg.get_payload() {
                        Ok(p) => p,
                        Err(e) => {
                            tracing::warn!(error = %e, "Failed to get message payload");
                            LifecycleMetrics::record_invalid();
                            continue;
                        }
                    };

                    self.handle_message(&channel, &payload).await;
                }
            }
        }
    }

    async fn handle_message(&self, channel: &str, payload: &str) {
        tracing::debug!(channel = %channel, "Received lifecycle message");

        match self.handler.handle_payload(payload).await {
            Ok(_) => LifecycleMetrics::record_handled(),
            Err(LifecycleError::UnknownEvent(event)) => {
                tracing::debug!(channel = %channel, event = %event, "Ignoring lifecycle event");
                LifecycleMetrics::record_ignored();
            }
            Err(e @ LifecycleError::InvalidPayload(_)) => {
                tracing::warn!(
                    error = %e,
                    channel = %channel,
                    payload = %payload,
                    "Failed to parse lifecycle message"
                );
                LifecycleMetrics::record_invalid();
            }
            Err(e) => {
                tracing::error!(error = %e, channel = %channel, "Lifecycle event failed");
                LifecycleMetrics::record_failed();
            }
        }
    }
}
