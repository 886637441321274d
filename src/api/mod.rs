//! API layer - HTTP endpoint handlers organized by domain.

mod health;
mod metrics;
mod notifications;
mod preferences;
mod routes;

pub use health::{health, stats, HealthResponse, StatsResponse};
pub use metrics::prometheus_metrics;
pub use notifications::{RescheduleRequest, ScheduleRemindersRequest};
pub use routes::api_routes;
