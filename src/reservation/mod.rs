//! The triggering entity: reservations and their read-only store.
//!
//! The reservation lifecycle itself belongs to another service; this module
//! only loads the fields notifications are rendered from.

mod postgres_store;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::storage::StoreResult;

pub use postgres_store::PostgresReservationStore;

/// Where a reservation takes place
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub id: Uuid,
    pub name: String,
    pub merchant_id: Option<Uuid>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reservation {
    pub id: Uuid,
    pub guest_name: String,
    pub guest_email: Option<String>,
    pub guest_phone: Option<String>,
    pub guest_locale: Option<String>,
    /// Set when the guest booked with an account
    pub account_id: Option<Uuid>,
    pub date: NaiveDate,
    pub time: NaiveTime,
    pub party_size: i32,
    pub reservation_code: String,
    pub special_requests: Option<String>,
    pub section: Option<String>,
    pub location: Option<Location>,
}

impl Reservation {
    /// Start of the reservation, with the stored wall-clock taken as UTC
    pub fn starts_at(&self) -> DateTime<Utc> {
        self.date.and_time(self.time).and_utc()
    }

    pub fn merchant_id(&self) -> Option<Uuid> {
        self.location.as_ref().and_then(|l| l.merchant_id)
    }

    pub fn has_phone(&self) -> bool {
        self.guest_phone.as_deref().is_some_and(|p| !p.trim().is_empty())
    }
}

/// Read access to reservations by id
#[async_trait]
pub trait ReservationStore: Send + Sync {
    async fn find(&self, id: Uuid) -> StoreResult<Option<Reservation>>;
}

/// In-memory reservation store, used in tests and the memory storage profile
#[derive(Default)]
pub struct MemoryReservationStore {
    reservations: DashMap<Uuid, Reservation>,
}

impl MemoryReservationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, reservation: Reservation) {
        self.reservations.insert(reservation.id, reservation);
    }
}

#[async_trait]
impl ReservationStore for MemoryReservationStore {
    async fn find(&self, id: Uuid) -> StoreResult<Option<Reservation>> {
        Ok(self.reservations.get(&id).map(|r| r.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reservation() -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            guest_name: "An".to_string(),
            guest_email: None,
            guest_phone: Some(" ".to_string()),
            guest_locale: None,
            account_id: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(18, 0, 0).unwrap(),
            party_size: 2,
            reservation_code: "R1".to_string(),
            special_requests: None,
            section: None,
            location: Some(Location {
                id: Uuid::new_v4(),
                name: "Bun Cha".to_string(),
                merchant_id: None,
            }),
        }
    }

    #[test]
    fn test_starts_at() {
        let r = reservation();
        assert_eq!(r.starts_at().to_rfc3339(), "2025-03-10T18:00:00+00:00");
    }

    #[test]
    fn test_blank_phone_is_not_a_phone() {
        assert!(!reservation().has_phone());
    }

    #[tokio::test]
    async fn test_memory_store_find() {
        let store = MemoryReservationStore::new();
        let r = reservation();
        store.insert(r.clone());

        assert_eq!(store.find(r.id).await.unwrap(), Some(r.clone()));
        assert!(store.find(Uuid::new_v4()).await.unwrap().is_none());
    }
}
