//! PostgreSQL-backed preference store over `notification_channel_preferences`.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage::StoreResult;

use super::store::PreferenceStore;
use super::types::Preferences;

const COLUMNS: &str = "account_id, merchant_id, email_enabled, sms_enabled, push_enabled, \
     whatsapp_enabled, telegram_enabled, line_enabled, zalo_enabled, telegram_chat_id, \
     line_user_id, zalo_user_id, whatsapp_phone, preferred_locale, updated_at";

#[derive(sqlx::FromRow)]
struct PreferenceRow {
    account_id: Uuid,
    merchant_id: Option<Uuid>,
    email_enabled: bool,
    sms_enabled: bool,
    push_enabled: bool,
    whatsapp_enabled: bool,
    telegram_enabled: bool,
    line_enabled: bool,
    zalo_enabled: bool,
    telegram_chat_id: Option<String>,
    line_user_id: Option<String>,
    zalo_user_id: Option<String>,
    whatsapp_phone: Option<String>,
    preferred_locale: Option<String>,
    updated_at: chrono::DateTime<chrono::Utc>,
}

impl From<PreferenceRow> for Preferences {
    fn from(row: PreferenceRow) -> Self {
        Preferences {
            account_id: row.account_id,
            merchant_id: row.merchant_id,
            email_enabled: row.email_enabled,
            sms_enabled: row.sms_enabled,
            push_enabled: row.push_enabled,
            whatsapp_enabled: row.whatsapp_enabled,
            telegram_enabled: row.telegram_enabled,
            line_enabled: row.line_enabled,
            zalo_enabled: row.zalo_enabled,
            telegram_chat_id: row.telegram_chat_id,
            line_user_id: row.line_user_id,
            zalo_user_id: row.zalo_user_id,
            whatsapp_phone: row.whatsapp_phone,
            preferred_locale: row.preferred_locale,
            updated_at: row.updated_at,
        }
    }
}

pub struct PostgresPreferenceStore {
    pool: PgPool,
}

impl PostgresPreferenceStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PreferenceStore for PostgresPreferenceStore {
    async fn find(
        &self,
        account_id: Uuid,
        merchant_id: Option<Uuid>,
    ) -> StoreResult<Option<Preferences>> {
        let sql = format!(
            "SELECT {} FROM notification_channel_preferences \
             WHERE account_id = $1 AND merchant_id IS NOT DISTINCT FROM $2",
            COLUMNS
        );

        let row: Option<PreferenceRow> = sqlx::query_as(&sql)
            .bind(account_id)
            .bind(merchant_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(Preferences::from))
    }

    async fn upsert(&self, p: Preferences) -> StoreResult<Preferences> {
        // The unique index uses COALESCE(merchant_id, nil uuid) so global rows conflict too
        let sql = format!(
            r#"
            INSERT INTO notification_channel_preferences
                (account_id, merchant_id, email_enabled, sms_enabled, push_enabled,
                 whatsapp_enabled, telegram_enabled, line_enabled, zalo_enabled,
                 telegram_chat_id, line_user_id, zalo_user_id, whatsapp_phone,
                 preferred_locale, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, NOW())
            ON CONFLICT (account_id, COALESCE(merchant_id, '00000000-0000-0000-0000-000000000000'::uuid))
            DO UPDATE SET
                email_enabled = EXCLUDED.email_enabled,
                sms_enabled = EXCLUDED.sms_enabled,
                push_enabled = EXCLUDED.push_enabled,
                whatsapp_enabled = EXCLUDED.whatsapp_enabled,
                telegram_enabled = EXCLUDED.telegram_enabled,
                line_enabled = EXCLUDED.line_enabled,
                zalo_enabled = EXCLUDED.zalo_enabled,
                telegram_chat_id = EXCLUDED.telegram_chat_id,
                line_user_id = EXCLUDED.line_user_id,
                zalo_user_id = EXCLUDED.zalo_user_id,
                whatsapp_phone = EXCLUDED.whatsapp_phone,
                preferred_locale = EXCLUDED.preferred_locale,
                updated_at = NOW()
            RETURNING {}
            "#,
            COLUMNS
        );

        let row: PreferenceRow = sqlx::query_as(&sql)
            .bind(p.account_id)
            .bind(p.merchant_id)
            .bind(p.email_enabled)
            .bind(p.sms_enabled)
            .bind(p.push_enabled)
            .bind(p.whatsapp_enabled)
            .bind(p.telegram_enabled)
            .bind(p.line_enabled)
            .bind(p.zalo_enabled)
            .bind(&p.telegram_chat_id)
            .bind(&p.line_user_id)
            .bind(&p.zalo_user_id)
            .bind(&p.whatsapp_phone)
            .bind(&p.preferred_locale)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.into())
    }
}
