//! PostgreSQL-based queue backend.
//!
//! Table structure:
//! - `notification_queue` - one row per notification id, with priority,
//!   `process_after` and status

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::metrics::{QUEUE_CANCELLED_TOTAL, QUEUE_ENQUEUED_TOTAL};
use crate::storage::{StoreError, StoreResult};

use super::backend::{QueueBackend, QueueEntry, QueueStats};

#[derive(sqlx::FromRow)]
struct QueueRow {
    notification_id: Uuid,
    priority: i32,
    process_after: DateTime<Utc>,
    status: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<QueueRow> for QueueEntry {
    type Error = StoreError;

    fn try_from(row: QueueRow) -> Result<Self, Self::Error> {
        Ok(QueueEntry {
            notification_id: row.notification_id,
            priority: row.priority,
            process_after: row.process_after,
            status: row.status.parse().map_err(StoreError::InvalidData)?,
            created_at: row.created_at,
        })
    }
}

pub struct PostgresQueueBackend {
    pool: PgPool,
}

impl PostgresQueueBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueueBackend for PostgresQueueBackend {
    async fn enqueue(&self, entry: QueueEntry) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_queue (notification_id, priority, process_after, status, created_at)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(entry.notification_id)
        .bind(entry.priority)
        .bind(entry.process_after)
        .bind(entry.status.as_str())
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        QUEUE_ENQUEUED_TOTAL.inc();

        tracing::trace!(
            notification_id = %entry.notification_id,
            priority = entry.priority,
            "Notification enqueued to PostgreSQL"
        );

        Ok(())
    }

    async fn cancel(&self, notification_ids: &[Uuid]) -> StoreResult<Vec<Uuid>> {
        if notification_ids.is_empty() {
            return Ok(Vec::new());
        }

        let cancelled: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE notification_queue
            SET status = 'cancelled'
            WHERE notification_id = ANY($1) AND status = 'pending'
            RETURNING notification_id
            "#,
        )
        .bind(notification_ids)
        .fetch_all(&self.pool)
        .await?;

        QUEUE_CANCELLED_TOTAL.inc_by(cancelled.len() as u64);
        Ok(cancelled)
    }

    async fn claim_due(&self, now: DateTime<Utc>, limit: usize) -> StoreResult<Vec<QueueEntry>> {
        // SKIP LOCKED lets several workers claim concurrently without overlap
        let rows: Vec<QueueRow> = sqlx::query_as(
            r#"
            UPDATE notification_queue q
            SET status = 'claimed'
            FROM (
                SELECT notification_id FROM notification_queue
                WHERE status = 'pending' AND process_after <= $1
                ORDER BY priority ASC, process_after ASC, created_at ASC
                LIMIT $2
                FOR UPDATE SKIP LOCKED
            ) due
            WHERE q.notification_id = due.notification_id
            RETURNING q.notification_id, q.priority, q.process_after, q.status, q.created_at
            "#,
        )
        .bind(now)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut entries = rows
            .into_iter()
            .map(QueueEntry::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        // RETURNING does not preserve the subquery order
        entries.sort_by(|a, b| {
            a.priority
                .cmp(&b.priority)
                .then(a.process_after.cmp(&b.process_after))
        });

        Ok(entries)
    }

    async fn get(&self, notification_id: Uuid) -> StoreResult<Option<QueueEntry>> {
        let row: Option<QueueRow> = sqlx::query_as(
            r#"
            SELECT notification_id, priority, process_after, status, created_at
            FROM notification_queue
            WHERE notification_id = $1
            "#,
        )
        .bind(notification_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(QueueEntry::try_from).transpose()
    }

    async fn stats(&self) -> QueueStats {
        let counts: Result<Vec<(String, i64)>, sqlx::Error> = sqlx::query_as(
            "SELECT status, COUNT(*) FROM notification_queue GROUP BY status",
        )
        .fetch_all(&self.pool)
        .await;

        let mut stats = QueueStats {
            backend_type: "postgres".to_string(),
            ..Default::default()
        };

        match counts {
            Ok(counts) => {
                for (status, count) in counts {
                    let count = count as usize;
                    match status.as_str() {
                        "pending" => stats.pending = count,
                        "claimed" => stats.claimed = count,
                        "cancelled" => stats.cancelled = count,
                        _ => {}
                    }
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to read queue stats");
            }
        }

        stats
    }
}
