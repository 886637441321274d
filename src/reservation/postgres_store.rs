use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use sqlx::PgPool;
use uuid::Uuid;

use crate::storage::StoreResult;

use super::{Location, Reservation, ReservationStore};

#[derive(sqlx::FromRow)]
struct ReservationRow {
    id: Uuid,
    guest_name: String,
    guest_email: Option<String>,
    guest_phone: Option<String>,
    guest_locale: Option<String>,
    account_id: Option<Uuid>,
    reservation_date: NaiveDate,
    reservation_time: NaiveTime,
    party_size: i32,
    reservation_code: String,
    special_requests: Option<String>,
    section_name: Option<String>,
    location_id: Option<Uuid>,
    location_name: Option<String>,
    merchant_id: Option<Uuid>,
}

impl From<ReservationRow> for Reservation {
    fn from(row: ReservationRow) -> Self {
        let location = match (row.location_id, row.location_name) {
            (Some(id), Some(name)) => Some(Location {
                id,
                name,
                merchant_id: row.merchant_id,
            }),
            _ => None,
        };

        Reservation {
            id: row.id,
            guest_name: row.guest_name,
            guest_email: row.guest_email,
            guest_phone: row.guest_phone,
            guest_locale: row.guest_locale,
            account_id: row.account_id,
            date: row.reservation_date,
            time: row.reservation_time,
            party_size: row.party_size,
            reservation_code: row.reservation_code,
            special_requests: row.special_requests,
            section: row.section_name,
            location,
        }
    }
}

/// Reads reservations joined with their location
pub struct PostgresReservationStore {
    pool: PgPool,
}

impl PostgresReservationStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReservationStore for PostgresReservationStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        let row: Option<ReservationRow> = sqlx::query_as(
            r#"
            SELECT r.id, r.guest_name, r.guest_email, r.guest_phone, r.guest_locale,
                   r.account_id, r.reservation_date, r.reservation_time, r.party_size,
                   r.reservation_code, r.special_requests, s.name AS section_name,
                   l.id AS location_id, l.name AS location_name, l.merchant_id
            FROM reservations r
            LEFT JOIN locations l ON l.id = r.location_id
            LEFT JOIN sections s ON s.id = r.section_id
            WHERE r.id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Reservation::from))
    }
}
