//! Delivery queue: notifications accepted for sending but not yet attempted.
//!
//! One `QueueEntry` exists per undelivered notification. The engine only
//! enqueues and cancels; an external Delivery Worker claims due entries with
//! `claim_due`, ordered by priority then `process_after`.
//!
//! - `MemoryQueueBackend`: In-memory storage using DashMap
//! - `PostgresQueueBackend`: Persistent storage in `notification_queue`

pub mod backend;
pub mod memory_backend;
pub mod postgres_backend;

pub use backend::{QueueBackend, QueueEntry, QueueStats, QueueStatus};
pub use memory_backend::MemoryQueueBackend;
pub use postgres_backend::PostgresQueueBackend;
