//! Append-only history of every notification instance.
//!
//! Rows are created `pending` by the dispatcher, advanced by the Delivery
//! Worker's write-back and terminated by cancellation. Nothing is deleted.
//!
//! - `MemoryHistoryBackend`: In-memory storage using DashMap
//! - `PostgresHistoryBackend`: Persistent storage in `reservation_notifications`

pub mod backend;
pub mod memory_backend;
pub mod postgres_backend;

pub use backend::HistoryBackend;
pub use memory_backend::MemoryHistoryBackend;
pub use postgres_backend::PostgresHistoryBackend;
