//! Storage backend factory

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::StorageConfig;
use crate::history::{HistoryBackend, MemoryHistoryBackend, PostgresHistoryBackend};
use crate::preference::{MemoryPreferenceStore, PostgresPreferenceStore, PreferenceStore};
use crate::queue::{MemoryQueueBackend, PostgresQueueBackend, QueueBackend};
use crate::reservation::{MemoryReservationStore, PostgresReservationStore, ReservationStore};
use crate::template::{MemoryTemplateStore, PostgresTemplateStore, TemplateStore};

/// The full set of stores the dispatch engine runs against.
#[derive(Clone)]
pub struct Backends {
    pub templates: Arc<dyn TemplateStore>,
    pub preferences: Arc<dyn PreferenceStore>,
    pub reservations: Arc<dyn ReservationStore>,
    pub queue: Arc<dyn QueueBackend>,
    pub history: Arc<dyn HistoryBackend>,
    /// Which backend was actually selected ("memory" or "postgres")
    pub kind: &'static str,
}

impl Backends {
    /// Fresh in-memory stores. Nothing survives a restart.
    pub fn memory() -> Self {
        Self {
            templates: Arc::new(MemoryTemplateStore::new()),
            preferences: Arc::new(MemoryPreferenceStore::new()),
            reservations: Arc::new(MemoryReservationStore::new()),
            queue: Arc::new(MemoryQueueBackend::new()),
            history: Arc::new(MemoryHistoryBackend::new()),
            kind: "memory",
        }
    }

    pub fn postgres(pool: PgPool) -> Self {
        Self {
            templates: Arc::new(PostgresTemplateStore::new(pool.clone())),
            preferences: Arc::new(PostgresPreferenceStore::new(pool.clone())),
            reservations: Arc::new(PostgresReservationStore::new(pool.clone())),
            queue: Arc::new(PostgresQueueBackend::new(pool.clone())),
            history: Arc::new(PostgresHistoryBackend::new(pool)),
            kind: "postgres",
        }
    }
}

/// Create the storage backends based on configuration.
///
/// - `"postgres"`: PostgreSQL stores if a pool is provided
/// - `"memory"` (default): in-memory stores
///
/// A postgres request without a pool falls back to memory with a warning.
pub fn create_backends(settings: &StorageConfig, postgres_pool: Option<PgPool>) -> Backends {
    match settings.backend.as_str() {
        "postgres" => {
            if let Some(pool) = postgres_pool {
                tracing::info!(backend = "postgres", "Creating PostgreSQL storage backends");
                Backends::postgres(pool)
            } else {
                tracing::warn!(
                    "PostgreSQL backend requested but no pool provided, falling back to memory"
                );
                Backends::memory()
            }
        }
        "memory" => {
            tracing::info!(backend = "memory", "Creating memory storage backends");
            Backends::memory()
        }
        other => {
            tracing::warn!(backend = %other, "Unknown storage backend, falling back to memory");
            Backends::memory()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_selected_by_default() {
        let backends = create_backends(&StorageConfig::default(), None);
        assert_eq!(backends.kind, "memory");
    }

    #[test]
    fn test_postgres_without_pool_falls_back() {
        let settings = StorageConfig {
            backend: "postgres".to_string(),
        };
        let backends = create_backends(&settings, None);
        assert_eq!(backends.kind, "memory");
    }

    #[test]
    fn test_unknown_backend_falls_back() {
        let settings = StorageConfig {
            backend: "cassandra".to_string(),
        };
        assert_eq!(create_backends(&settings, None).kind, "memory");
    }
}
