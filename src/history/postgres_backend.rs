//! PostgreSQL history backend over `reservation_notifications`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::{
    DeliveryUpdate, NotificationInstance, NotificationStatus, RenderedMessage,
};
use crate::storage::{StoreError, StoreResult};

use super::backend::HistoryBackend;

const COLUMNS: &str = "id, reservation_id, notification_type, channel, recipient, recipient_name, \
     subject, title, body, html_body, buttons, status, provider, provider_message_id, \
     error_message, scheduled_for, sent_at, created_at";

#[derive(sqlx::FromRow)]
struct NotificationRow {
    id: Uuid,
    reservation_id: Uuid,
    notification_type: String,
    channel: String,
    recipient: String,
    recipient_name: String,
    subject: Option<String>,
    title: Option<String>,
    body: String,
    html_body: Option<String>,
    buttons: serde_json::Value,
    status: String,
    provider: Option<String>,
    provider_message_id: Option<String>,
    error_message: Option<String>,
    scheduled_for: DateTime<Utc>,
    sent_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<NotificationRow> for NotificationInstance {
    type Error = StoreError;

    fn try_from(row: NotificationRow) -> Result<Self, Self::Error> {
        Ok(NotificationInstance {
            id: row.id,
            correlation_id: row.reservation_id,
            type_code: row.notification_type,
            channel: row.channel.parse().map_err(StoreError::InvalidData)?,
            recipient: row.recipient,
            recipient_name: row.recipient_name,
            content: RenderedMessage {
                subject: row.subject,
                title: row.title,
                body: row.body,
                html_body: row.html_body,
                buttons: row.buttons,
            },
            status: row.status.parse().map_err(StoreError::InvalidData)?,
            provider: row.provider,
            provider_message_id: row.provider_message_id,
            error_message: row.error_message,
            scheduled_for: row.scheduled_for,
            sent_at: row.sent_at,
            created_at: row.created_at,
        })
    }
}

fn into_instances(rows: Vec<NotificationRow>) -> StoreResult<Vec<NotificationInstance>> {
    rows.into_iter().map(NotificationInstance::try_from).collect()
}

pub struct PostgresHistoryBackend {
    pool: PgPool,
}

impl PostgresHistoryBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl HistoryBackend for PostgresHistoryBackend {
    async fn create(&self, n: NotificationInstance) -> StoreResult<Uuid> {
        let (id,): (Uuid,) = sqlx::query_as(
            r#"
            INSERT INTO reservation_notifications
                (id, reservation_id, notification_type, channel, recipient, recipient_name,
                 subject, title, body, html_body, buttons, status, scheduled_for, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14)
            RETURNING id
            "#,
        )
        .bind(n.id)
        .bind(n.correlation_id)
        .bind(&n.type_code)
        .bind(n.channel.as_str())
        .bind(&n.recipient)
        .bind(&n.recipient_name)
        .bind(&n.content.subject)
        .bind(&n.content.title)
        .bind(&n.content.body)
        .bind(&n.content.html_body)
        .bind(&n.content.buttons)
        .bind(n.status.as_str())
        .bind(n.scheduled_for)
        .bind(n.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(id)
    }

    async fn find_pending(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
        let sql = format!(
            "SELECT {} FROM reservation_notifications \
             WHERE reservation_id = $1 AND status IN ('pending', 'queued')",
            COLUMNS
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(correlation_id)
            .fetch_all(&self.pool)
            .await?;

        into_instances(rows)
    }

    async fn mark_failed(&self, ids: &[Uuid], reason: &str) -> StoreResult<usize> {
        if ids.is_empty() {
            return Ok(0);
        }

        let result = sqlx::query(
            r#"
            UPDATE reservation_notifications
            SET status = 'failed', error_message = $2
            WHERE id = ANY($1) AND status IN ('pending', 'queued')
            "#,
        )
        .bind(ids)
        .bind(reason)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() as usize)
    }

    async fn record_delivery(
        &self,
        id: Uuid,
        update: DeliveryUpdate,
    ) -> StoreResult<NotificationInstance> {
        let mut tx = self.pool.begin().await?;

        let current: Option<(String,)> = sqlx::query_as(
            "SELECT status FROM reservation_notifications WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        let (current,) = current.ok_or(StoreError::NotFound(id))?;
        let current: NotificationStatus = current.parse().map_err(StoreError::InvalidData)?;

        if !current.can_transition_to(update.status) {
            return Err(StoreError::InvalidTransition {
                from: current,
                to: update.status,
            });
        }

        let sql = format!(
            r#"
            UPDATE reservation_notifications
            SET status = $2,
                provider = COALESCE($3, provider),
                provider_message_id = COALESCE($4, provider_message_id),
                error_message = COALESCE($5, error_message),
                sent_at = COALESCE($6, sent_at)
            WHERE id = $1
            RETURNING {}
            "#,
            COLUMNS
        );
        let row: NotificationRow = sqlx::query_as(&sql)
            .bind(id)
            .bind(update.status.as_str())
            .bind(&update.provider)
            .bind(&update.provider_message_id)
            .bind(&update.error_message)
            .bind(update.sent_at)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;

        NotificationInstance::try_from(row)
    }

    async fn get(&self, id: Uuid) -> StoreResult<Option<NotificationInstance>> {
        let sql = format!("SELECT {} FROM reservation_notifications WHERE id = $1", COLUMNS);
        let row: Option<NotificationRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(NotificationInstance::try_from).transpose()
    }

    async fn list(&self, correlation_id: Uuid) -> StoreResult<Vec<NotificationInstance>> {
        let sql = format!(
            "SELECT {} FROM reservation_notifications \
             WHERE reservation_id = $1 ORDER BY created_at DESC",
            COLUMNS
        );
        let rows: Vec<NotificationRow> = sqlx::query_as(&sql)
            .bind(correlation_id)
            .fetch_all(&self.pool)
            .await?;

        into_instances(rows)
    }
}
