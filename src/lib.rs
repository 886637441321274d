// Shared infrastructure
pub mod config;
pub mod error;
pub mod metrics;
pub mod postgres;
pub mod storage;

// Domain layer
pub mod history;
pub mod notification;
pub mod preference;
pub mod queue;
pub mod reservation;
pub mod scheduler;
pub mod template;

// Application layer
pub mod api;
pub mod server;
pub mod triggers;

// Supporting modules
pub mod telemetry;
