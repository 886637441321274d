//! Preference storage trait and in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::storage::StoreResult;

use super::types::Preferences;

/// Access to preference rows keyed by `(account_id, merchant_id)`
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    /// Fetch the row with exactly this scope (`None` = global row)
    async fn find(
        &self,
        account_id: Uuid,
        merchant_id: Option<Uuid>,
    ) -> StoreResult<Option<Preferences>>;

    /// Create or replace the row for `(account_id, merchant_id)`
    async fn upsert(&self, preferences: Preferences) -> StoreResult<Preferences>;
}

/// In-memory preference storage
#[derive(Default)]
pub struct MemoryPreferenceStore {
    rows: DashMap<(Uuid, Option<Uuid>), Preferences>,
}

impl MemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PreferenceStore for MemoryPreferenceStore {
    async fn find(
        &self,
        account_id: Uuid,
        merchant_id: Option<Uuid>,
    ) -> StoreResult<Option<Preferences>> {
        Ok(self
            .rows
            .get(&(account_id, merchant_id))
            .map(|row| row.value().clone()))
    }

    async fn upsert(&self, mut preferences: Preferences) -> StoreResult<Preferences> {
        preferences.updated_at = Utc::now();
        self.rows.insert(
            (preferences.account_id, preferences.merchant_id),
            preferences.clone(),
        );
        Ok(preferences)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_is_scope_exact() {
        let store = MemoryPreferenceStore::new();
        let account = Uuid::new_v4();
        let merchant = Uuid::new_v4();

        store.upsert(Preferences::new(account, None)).await.unwrap();

        assert!(store.find(account, None).await.unwrap().is_some());
        assert!(store.find(account, Some(merchant)).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upsert_replaces() {
        let store = MemoryPreferenceStore::new();
        let account = Uuid::new_v4();

        let mut prefs = Preferences::new(account, None);
        store.upsert(prefs.clone()).await.unwrap();

        prefs.sms_enabled = true;
        store.upsert(prefs).await.unwrap();

        let found = store.find(account, None).await.unwrap().unwrap();
        assert!(found.sms_enabled);
    }
}
