//! PostgreSQL-backed template store.
//!
//! Reads from the `notification_templates` table, one row per
//! (merchant scope, type code, channel, locale).

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use crate::notification::Channel;
use crate::storage::{StoreError, StoreResult};

use super::store::TemplateStore;
use super::types::Template;

#[derive(sqlx::FromRow)]
struct TemplateRow {
    id: Uuid,
    merchant_id: Option<Uuid>,
    template_code: String,
    channel: String,
    locale: String,
    subject: Option<String>,
    title: Option<String>,
    body: String,
    html_body: Option<String>,
    buttons: serde_json::Value,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<TemplateRow> for Template {
    type Error = StoreError;

    fn try_from(row: TemplateRow) -> Result<Self, Self::Error> {
        Ok(Template {
            id: row.id,
            merchant_id: row.merchant_id,
            type_code: row.template_code,
            channel: row.channel.parse().map_err(StoreError::InvalidData)?,
            locale: row.locale,
            subject: row.subject,
            title: row.title,
            body: row.body,
            html_body: row.html_body,
            buttons: row.buttons,
            active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

pub struct PostgresTemplateStore {
    pool: PgPool,
}

impl PostgresTemplateStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TemplateStore for PostgresTemplateStore {
    async fn find_active(
        &self,
        merchant_id: Option<Uuid>,
        type_code: &str,
        channel: Channel,
        locale: &str,
    ) -> StoreResult<Vec<Template>> {
        let rows: Vec<TemplateRow> = sqlx::query_as(
            r#"
            SELECT id, merchant_id, template_code, channel, locale, subject, title,
                   body, html_body, buttons, is_active, created_at, updated_at
            FROM notification_templates
            WHERE (merchant_id = $1 OR merchant_id IS NULL)
              AND template_code = $2
              AND channel = $3
              AND locale = $4
              AND is_active = TRUE
            ORDER BY merchant_id NULLS LAST
            "#,
        )
        .bind(merchant_id)
        .bind(type_code)
        .bind(channel.as_str())
        .bind(locale)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Template::try_from).collect()
    }

    async fn upsert(&self, template: Template) -> StoreResult<Template> {
        template
            .validate()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let row: TemplateRow = sqlx::query_as(
            r#"
            INSERT INTO notification_templates
                (id, merchant_id, template_code, channel, locale, subject, title,
                 body, html_body, buttons, is_active, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, NOW())
            ON CONFLICT (id) DO UPDATE SET
                merchant_id = EXCLUDED.merchant_id,
                template_code = EXCLUDED.template_code,
                channel = EXCLUDED.channel,
                locale = EXCLUDED.locale,
                subject = EXCLUDED.subject,
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                html_body = EXCLUDED.html_body,
                buttons = EXCLUDED.buttons,
                is_active = EXCLUDED.is_active,
                updated_at = NOW()
            RETURNING id, merchant_id, template_code, channel, locale, subject, title,
                      body, html_body, buttons, is_active, created_at, updated_at
            "#,
        )
        .bind(template.id)
        .bind(template.merchant_id)
        .bind(&template.type_code)
        .bind(template.channel.as_str())
        .bind(&template.locale)
        .bind(&template.subject)
        .bind(&template.title)
        .bind(&template.body)
        .bind(&template.html_body)
        .bind(&template.buttons)
        .bind(template.active)
        .bind(template.created_at)
        .fetch_one(&self.pool)
        .await?;

        Template::try_from(row)
    }
}
