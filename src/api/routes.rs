use axum::{
    routing::{get, post, put},
    Router,
};

use crate::server::AppState;

use super::health::{health, stats};
use super::metrics::prometheus_metrics;
use super::notifications::{
    cancel_all, dispatch, history, record_delivery, reschedule, schedule_reminders,
};
use super::preferences::upsert_preferences;

pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Health, stats & metrics
        .route("/health", get(health))
        .route("/stats", get(stats))
        .route("/metrics", get(prometheus_metrics))
        .nest(
            "/api/v1",
            Router::new()
                .route("/dispatch", post(dispatch))
                // Reminders
                .route("/reminders", post(schedule_reminders))
                .route("/reminders/reschedule", post(reschedule))
                // Per-reservation operations
                .route("/notifications/{id}/cancel", post(cancel_all))
                .route("/notifications/{id}/history", get(history))
                // Delivery Worker write-back
                .route("/notifications/{id}/delivery", post(record_delivery))
                .route("/preferences", put(upsert_preferences)),
        )
}
