//! Time-offset reminders and cancellation of pending notifications.
//!
//! Reminders are ordinary dispatches with a future `scheduled_for`; the queue
//! holds them until their `process_after` is reached. Cancelling walks the
//! history log for rows that are still `pending` or `queued`, cancels their
//! queue entries and marks `failed` only the rows whose entry was cancelled.
//!
//! An entry a Delivery Worker has already claimed is not cancelled. It will be
//! sent, so its history row is left for the worker's write-back.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::config::SchedulerConfig;
use crate::metrics::SchedulerMetrics;
use crate::notification::{DispatchCoordinator, DispatchEvent, DispatchResult};
use crate::storage::StoreResult;

/// Type code prefix shared by every reminder
pub const REMINDER_TYPE_PREFIX: &str = "reminder_";

/// Type code for a reminder `offset` away from the event.
///
/// Whole hours read `reminder_24h`; anything else falls back to minutes,
/// e.g. `reminder_90m`.
pub fn reminder_type_for(offset: Duration) -> String {
    let minutes = offset.num_minutes().abs();
    if minutes % 60 == 0 {
        format!("{}{}h", REMINDER_TYPE_PREFIX, minutes / 60)
    } else {
        format!("{}{}m", REMINDER_TYPE_PREFIX, minutes)
    }
}

/// Queue priority for a reminder; closer to the event is more urgent
pub fn reminder_priority_for(offset: Duration) -> i32 {
    let distance = offset.abs();
    if distance <= Duration::hours(2) {
        2
    } else if distance <= Duration::hours(24) {
        3
    } else {
        4
    }
}

/// A reminder handed to the dispatch coordinator
#[derive(Debug, Clone, Serialize)]
pub struct ScheduledReminder {
    pub offset_minutes: i64,
    pub type_code: String,
    pub target: DateTime<Utc>,
    pub priority: i32,
    pub result: DispatchResult,
}

/// A reminder whose target instant had already passed
#[derive(Debug, Clone, Serialize)]
pub struct SkippedReminder {
    pub offset_minutes: i64,
    pub type_code: String,
    pub target: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ReminderReport {
    pub scheduled: Vec<ScheduledReminder>,
    pub skipped: Vec<SkippedReminder>,
}

impl ReminderReport {
    /// Notification instances queued across every scheduled reminder
    pub fn queued_count(&self) -> usize {
        self.scheduled
            .iter()
            .map(|r| r.result.queued_ids.len())
            .sum()
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct CancelReport {
    /// Rows still pending or queued when the cancel started
    pub found: usize,
    /// Queue entries moved to cancelled
    pub queue_cancelled: usize,
    /// History rows marked failed
    pub history_failed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RescheduleReport {
    pub cancelled: CancelReport,
    pub reminders: ReminderReport,
}

/// Schedules reminders and cancels pending notifications
pub struct Scheduler {
    coordinator: Arc<DispatchCoordinator>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(coordinator: Arc<DispatchCoordinator>, config: SchedulerConfig) -> Self {
        Self {
            coordinator,
            config,
        }
    }

    /// Offsets configured for lifecycle-driven reminders
    pub fn default_offsets(&self) -> Vec<Duration> {
        self.config
            .reminder_offsets_minutes
            .iter()
            .map(|m| Duration::minutes(*m))
            .collect()
    }

    pub async fn schedule_reminders(
        &self,
        correlation_id: Uuid,
        event_time: DateTime<Utc>,
        offsets: &[Duration],
    ) -> ReminderReport {
        self.schedule_reminders_at(correlation_id, event_time, offsets, Utc::now())
            .await
    }

    /// Schedule one reminder per offset, skipping targets at or before `now`.
    #[tracing::instrument(name = "scheduler.reminders", skip(self, offsets))]
    pub async fn schedule_reminders_at(
        &self,
        correlation_id: Uuid,
        event_time: DateTime<Utc>,
        offsets: &[Duration],
        now: DateTime<Utc>,
    ) -> ReminderReport {
        let mut report = ReminderReport::default();

        for offset in offsets {
            let target = event_time + *offset;
            let type_code = reminder_type_for(*offset);

            if target <= now {
                tracing::debug!(
                    type_code = %type_code,
                    target = %target,
                    "Reminder target already passed, skipping"
                );
                SchedulerMetrics::record_skipped();
                report.skipped.push(SkippedReminder {
                    offset_minutes: offset.num_minutes(),
                    type_code,
                    target,
                });
                continue;
            }

            let priority = reminder_priority_for(*offset);
            let result = self
                .coordinator
                .dispatch(
                    DispatchEvent::new(correlation_id, type_code.clone())
                        .scheduled_for(target)
                        .priority(priority),
                )
                .await;

            if result.success {
                SchedulerMetrics::record_scheduled();
            }

            tracing::info!(
                type_code = %type_code,
                target = %target,
                priority,
                queued = result.queued_ids.len(),
                "Reminder scheduled"
            );

            report.scheduled.push(ScheduledReminder {
                offset_minutes: offset.num_minutes(),
                type_code,
                target,
                priority,
                result,
            });
        }

        report
    }

    /// Schedule the configured reminder offsets
    pub async fn schedule_default_reminders(
        &self,
        correlation_id: Uuid,
        event_time: DateTime<Utc>,
    ) -> ReminderReport {
        self.schedule_reminders(correlation_id, event_time, &self.default_offsets())
            .await
    }

    /// Cancel every pending or queued notification for a reservation.
    ///
    /// Rows already sent or delivered are left untouched.
    #[tracing::instrument(name = "scheduler.cancel_all", skip(self))]
    pub async fn cancel_all(&self, correlation_id: Uuid) -> StoreResult<CancelReport> {
        self.cancel_matching(correlation_id, |_| true).await
    }

    /// Move reminders to a new event time.
    ///
    /// Pending reminders for the old time are cancelled and fresh ones are
    /// scheduled; non-reminder notifications are left alone.
    pub async fn reschedule(
        &self,
        correlation_id: Uuid,
        new_event_time: DateTime<Utc>,
    ) -> StoreResult<RescheduleReport> {
        self.reschedule_at(correlation_id, new_event_time, Utc::now())
            .await
    }

    #[tracing::instrument(name = "scheduler.reschedule", skip(self))]
    pub async fn reschedule_at(
        &self,
        correlation_id: Uuid,
        new_event_time: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> StoreResult<RescheduleReport> {
        let cancelled = self
            .cancel_matching(correlation_id, |type_code| {
                type_code.starts_with(REMINDER_TYPE_PREFIX)
            })
            .await?;

        let reminders = self
            .schedule_reminders_at(correlation_id, new_event_time, &self.default_offsets(), now)
            .await;

        Ok(RescheduleReport {
            cancelled,
            reminders,
        })
    }

    async fn cancel_matching<F>(&self, correlation_id: Uuid, matches: F) -> StoreResult<CancelReport>
    where
        F: Fn(&str) -> bool,
    {
        let history = self.coordinator.history_backend();
        let queue = self.coordinator.queue_backend();

        let ids: Vec<Uuid> = history
            .find_pending(correlation_id)
            .await?
            .into_iter()
            .filter(|n| matches(&n.type_code))
            .map(|n| n.id)
            .collect();

        if ids.is_empty() {
            return Ok(CancelReport::default());
        }

        let cancelled = queue.cancel(&ids).await?;
        let queue_cancelled = cancelled.len();
        let history_failed = if cancelled.is_empty() {
            0
        } else {
            history
                .mark_failed(&cancelled, &self.config.cancellation_reason)
                .await?
        };

        SchedulerMetrics::record_cancelled(history_failed as u64);
        tracing::info!(
            found = ids.len(),
            queue_cancelled,
            history_failed,
            "Pending notifications cancelled"
        );

        Ok(CancelReport {
            found: ids.len(),
            queue_cancelled,
            history_failed,
        })
    }
}
