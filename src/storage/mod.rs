//! Storage abstraction shared by every backing store.
//!
//! Each store (templates, preferences, reservations, queue, history) is a
//! trait with an in-memory implementation using `DashMap` and a PostgreSQL
//! implementation using `sqlx`. Use `create_backends()` to build the set
//! selected by configuration.

mod factory;

use thiserror::Error;
use uuid::Uuid;

use crate::notification::NotificationStatus;

pub use factory::{create_backends, Backends};

/// Errors that can occur in any storage backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// PostgreSQL operation failed
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A stored value could not be mapped back to a domain type
    #[error("Invalid stored value: {0}")]
    InvalidData(String),

    /// The referenced notification does not exist
    #[error("Notification not found: {0}")]
    NotFound(Uuid),

    /// A write-back tried to move a notification backwards or out of a terminal state
    #[error("Illegal status transition from {from} to {to}")]
    InvalidTransition {
        from: NotificationStatus,
        to: NotificationStatus,
    },

    /// Backend is temporarily unavailable
    #[error("Backend unavailable: {0}")]
    Unavailable(String),
}

/// Result type for storage operations
pub type StoreResult<T> = Result<T, StoreError>;
