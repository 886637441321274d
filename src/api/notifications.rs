//! Dispatch, reminder, cancellation and audit endpoints.

use axum::{
    extract::{Path, State},
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::{AppError, Result};
use crate::notification::{DeliveryUpdate, DispatchEvent, DispatchResult, NotificationInstance};
use crate::scheduler::{CancelReport, ReminderReport, RescheduleReport};
use crate::server::AppState;

#[derive(Debug, Deserialize)]
pub struct ScheduleRemindersRequest {
    pub correlation_id: Uuid,
    pub event_time: DateTime<Utc>,
    /// Minutes relative to `event_time`; configured offsets when absent
    #[serde(default)]
    pub offsets_minutes: Option<Vec<i64>>,
}

#[derive(Debug, Deserialize)]
pub struct RescheduleRequest {
    pub correlation_id: Uuid,
    pub event_time: DateTime<Utc>,
}

/// POST /api/v1/dispatch
#[tracing::instrument(
    name = "http.dispatch",
    skip(state, event),
    fields(correlation_id = %event.correlation_id, type_code = %event.type_code)
)]
pub async fn dispatch(
    State(state): State<AppState>,
    Json(event): Json<DispatchEvent>,
) -> Result<Json<DispatchResult>> {
    if event.type_code.trim().is_empty() {
        return Err(AppError::Validation("type_code must not be empty".to_string()));
    }

    Ok(Json(state.coordinator.dispatch(event).await))
}

/// POST /api/v1/reminders
#[tracing::instrument(
    name = "http.schedule_reminders",
    skip(state, request),
    fields(correlation_id = %request.correlation_id)
)]
pub async fn schedule_reminders(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRemindersRequest>,
) -> Result<Json<ReminderReport>> {
    let offsets = match request.offsets_minutes {
        Some(minutes) if minutes.is_empty() => {
            return Err(AppError::Validation(
                "offsets_minutes must not be empty".to_string(),
            ))
        }
        Some(minutes) => minutes.into_iter().map(Duration::minutes).collect(),
        None => state.scheduler.default_offsets(),
    };

    let report = state
        .scheduler
        .schedule_reminders(request.correlation_id, request.event_time, &offsets)
        .await;

    Ok(Json(report))
}

/// POST /api/v1/reminders/reschedule
#[tracing::instrument(
    name = "http.reschedule",
    skip(state, request),
    fields(correlation_id = %request.correlation_id)
)]
pub async fn reschedule(
    State(state): State<AppState>,
    Json(request): Json<RescheduleRequest>,
) -> Result<Json<RescheduleReport>> {
    let report = state
        .scheduler
        .reschedule(request.correlation_id, request.event_time)
        .await?;

    Ok(Json(report))
}

/// POST /api/v1/notifications/{id}/cancel - cancel everything pending for a reservation
#[tracing::instrument(name = "http.cancel_all", skip(state))]
pub async fn cancel_all(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<CancelReport>> {
    Ok(Json(state.scheduler.cancel_all(id).await?))
}

/// GET /api/v1/notifications/{id}/history - audit trail for a reservation, newest first
#[tracing::instrument(name = "http.history", skip(state))]
pub async fn history(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<NotificationInstance>>> {
    Ok(Json(state.coordinator.history(id).await?))
}

/// POST /api/v1/notifications/{id}/delivery - Delivery Worker write-back for one notification
#[tracing::instrument(name = "http.record_delivery", skip(state, update))]
pub async fn record_delivery(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(update): Json<DeliveryUpdate>,
) -> Result<Json<NotificationInstance>> {
    Ok(Json(state.coordinator.record_delivery(id, update).await?))
}
