use std::sync::Arc;

use uuid::Uuid;

use crate::notification::Channel;
use crate::storage::StoreResult;

use super::store::PreferenceStore;
use super::types::Preferences;

/// Preference row and channel selection for one recipient
#[derive(Debug, Clone, Default)]
pub struct ResolvedPreferences {
    /// The row that decided the channels, if the account has one
    pub row: Option<Preferences>,
    pub channels: Vec<Channel>,
}

/// Determines which channels are enabled for a recipient
#[derive(Clone)]
pub struct PreferenceResolver {
    store: Arc<dyn PreferenceStore>,
}

impl PreferenceResolver {
    pub fn new(store: Arc<dyn PreferenceStore>) -> Self {
        Self { store }
    }

    /// Load the merchant-scoped row, falling back to the account's global row.
    ///
    /// Store errors are logged and treated as "no preferences".
    pub async fn fetch(&self, account_id: Uuid, merchant_id: Option<Uuid>) -> Option<Preferences> {
        let mut scopes = vec![merchant_id];
        if merchant_id.is_some() {
            scopes.push(None);
        }

        for scope in scopes {
            match self.store.find(account_id, scope).await {
                Ok(Some(prefs)) => return Some(prefs),
                Ok(None) => {}
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        account_id = %account_id,
                        merchant_id = ?scope,
                        "Error fetching notification preferences"
                    );
                    return None;
                }
            }
        }

        None
    }

    /// Effective channels for a recipient, with the row they came from.
    ///
    /// Guests (no account) and accounts without a preference row get
    /// `default_channels`. An account whose row enables nothing reachable also
    /// gets `default_channels`, so a recipient never goes dark silently.
    pub async fn resolve(
        &self,
        account_id: Option<Uuid>,
        merchant_id: Option<Uuid>,
        default_channels: &[Channel],
    ) -> ResolvedPreferences {
        let row = match account_id {
            Some(account_id) => self.fetch(account_id, merchant_id).await,
            None => None,
        };
        let channels = channels_from(row.as_ref(), default_channels);
        ResolvedPreferences { row, channels }
    }

    pub async fn upsert(&self, preferences: Preferences) -> StoreResult<Preferences> {
        let saved = self.store.upsert(preferences).await?;
        tracing::info!(
            account_id = %saved.account_id,
            merchant_id = ?saved.merchant_id,
            channels = ?saved.enabled_channels(),
            "Notification preferences updated"
        );
        Ok(saved)
    }
}

fn channels_from(prefs: Option<&Preferences>, default_channels: &[Channel]) -> Vec<Channel> {
    let channels = prefs.map(Preferences::enabled_channels).unwrap_or_default();

    if channels.is_empty() {
        default_channels.to_vec()
    } else {
        channels
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preference::MemoryPreferenceStore;

    const DEFAULTS: [Channel; 2] = [Channel::Email, Channel::Push];

    fn resolver() -> (PreferenceResolver, Arc<MemoryPreferenceStore>) {
        let store = Arc::new(MemoryPreferenceStore::new());
        (PreferenceResolver::new(store.clone()), store)
    }

    #[tokio::test]
    async fn test_guest_gets_defaults() {
        let (resolver, _) = resolver();
        let channels = resolver.resolve(None, None, &[Channel::Email]).await.channels;
        assert_eq!(channels, vec![Channel::Email]);
    }

    #[tokio::test]
    async fn test_account_without_row_gets_defaults() {
        let (resolver, _) = resolver();
        let channels = resolver.resolve(Some(Uuid::new_v4()), None, &DEFAULTS).await.channels;
        assert_eq!(channels, DEFAULTS.to_vec());
    }

    #[tokio::test]
    async fn test_all_disabled_falls_back_to_defaults() {
        let (resolver, store) = resolver();
        let account = Uuid::new_v4();
        store.upsert(Preferences::new(account, None)).await.unwrap();

        let channels = resolver.resolve(Some(account), None, &DEFAULTS).await.channels;
        assert_eq!(channels, DEFAULTS.to_vec());
    }

    #[tokio::test]
    async fn test_only_unreachable_chat_channel_falls_back() {
        let (resolver, store) = resolver();
        let account = Uuid::new_v4();
        let mut prefs = Preferences::new(account, None);
        prefs.telegram_enabled = true;
        store.upsert(prefs).await.unwrap();

        let channels = resolver.resolve(Some(account), None, &DEFAULTS).await.channels;
        assert_eq!(channels, DEFAULTS.to_vec());
    }

    #[tokio::test]
    async fn test_merchant_row_preferred_over_global() {
        let (resolver, store) = resolver();
        let account = Uuid::new_v4();
        let merchant = Uuid::new_v4();

        let mut global = Preferences::new(account, None);
        global.email_enabled = true;
        store.upsert(global).await.unwrap();

        let mut scoped = Preferences::new(account, Some(merchant));
        scoped.sms_enabled = true;
        store.upsert(scoped).await.unwrap();

        let channels = resolver.resolve(Some(account), Some(merchant), &DEFAULTS).await.channels;
        assert_eq!(channels, vec![Channel::Sms]);
    }

    #[tokio::test]
    async fn test_global_row_used_when_merchant_row_missing() {
        let (resolver, store) = resolver();
        let account = Uuid::new_v4();

        let mut global = Preferences::new(account, None);
        global.telegram_enabled = true;
        global.telegram_chat_id = Some("998877".to_string());
        store.upsert(global).await.unwrap();

        let channels = resolver
            .resolve(Some(account), Some(Uuid::new_v4()), &DEFAULTS)
            .await
            .channels;
        assert_eq!(channels, vec![Channel::Telegram]);
    }
}
