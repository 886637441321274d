//! Backend trait for the delivery queue.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StoreResult;

/// Status of a queue entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Pending,
    Cancelled,
    Claimed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "pending",
            QueueStatus::Cancelled => "cancelled",
            QueueStatus::Claimed => "claimed",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(QueueStatus::Pending),
            "cancelled" => Ok(QueueStatus::Cancelled),
            "claimed" => Ok(QueueStatus::Claimed),
            other => Err(format!("unknown queue status: {}", other)),
        }
    }
}

/// A notification waiting for the Delivery Worker.
///
/// Lower `priority` values are more urgent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub notification_id: Uuid,
    pub priority: i32,
    pub process_after: DateTime<Utc>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
}

impl QueueEntry {
    pub fn new(notification_id: Uuid, priority: i32, process_after: DateTime<Utc>) -> Self {
        Self {
            notification_id,
            priority,
            process_after,
            status: QueueStatus::Pending,
            created_at: Utc::now(),
        }
    }

    /// Whether a worker may claim this entry at `now`
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        self.status == QueueStatus::Pending && self.process_after <= now
    }
}

/// Statistics about the queue backend.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueueStats {
    /// Backend type identifier
    pub backend_type: String,
    pub pending: usize,
    pub claimed: usize,
    pub cancelled: usize,
}

/// Backend trait for queue storage.
///
/// Implementations must be thread-safe (`Send + Sync`); concurrent dispatch
/// tasks enqueue independently and a worker may claim at the same time.
#[async_trait]
pub trait QueueBackend: Send + Sync {
    /// Add an entry for a freshly created notification.
    async fn enqueue(&self, entry: QueueEntry) -> StoreResult<()>;

    /// Mark still-pending entries for these notifications as cancelled.
    ///
    /// Entries a worker already claimed are left alone and may still be sent.
    /// Returns the ids whose entries were actually cancelled.
    async fn cancel(&self, notification_ids: &[Uuid]) -> StoreResult<Vec<Uuid>>;

    /// Atomically claim up to `limit` due entries, most urgent first
    /// (priority ascending, then `process_after` ascending).
    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<QueueEntry>>;

    async fn get(&self, notification_id: Uuid) -> StoreResult<Option<QueueEntry>>;

    async fn stats(&self) -> QueueStats;
}
