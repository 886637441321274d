//! Template storage trait and in-memory implementation

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use uuid::Uuid;

use crate::notification::Channel;
use crate::storage::{StoreError, StoreResult};

use super::types::Template;

/// Read/write access to message templates.
///
/// Implementations must be thread-safe (`Send + Sync`) as they are shared
/// across concurrent per-channel dispatch tasks.
#[async_trait]
pub trait TemplateStore: Send + Sync {
    /// Active templates for `(type_code, channel, locale)` that are either
    /// owned by `merchant_id` or global. Order is unspecified; scope
    /// precedence is applied by the resolver.
    async fn find_active(
        &self,
        merchant_id: Option<Uuid>,
        type_code: &str,
        channel: Channel,
        locale: &str,
    ) -> StoreResult<Vec<Template>>;

    /// Insert or replace a template by id
    async fn upsert(&self, template: Template) -> StoreResult<Template>;
}

/// In-memory template storage
pub struct MemoryTemplateStore {
    templates: DashMap<Uuid, Template>,
}

impl Default for MemoryTemplateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTemplateStore {
    pub fn new() -> Self {
        Self {
            templates: DashMap::new(),
        }
    }

    pub fn count(&self) -> usize {
        self.templates.len()
    }
}

#[async_trait]
impl TemplateStore for MemoryTemplateStore {
    async fn find_active(
        &self,
        merchant_id: Option<Uuid>,
        type_code: &str,
        channel: Channel,
        locale: &str,
    ) -> StoreResult<Vec<Template>> {
        let matches = self
            .templates
            .iter()
            .filter(|entry| {
                let t = entry.value();
                t.active
                    && t.type_code == type_code
                    && t.channel == channel
                    && t.locale == locale
                    && (t.merchant_id.is_none() || t.merchant_id == merchant_id)
            })
            .map(|entry| entry.value().clone())
            .collect();

        Ok(matches)
    }

    async fn upsert(&self, mut template: Template) -> StoreResult<Template> {
        template
            .validate()
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;

        template.updated_at = Utc::now();
        self.templates.insert(template.id, template.clone());

        Ok(template)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_find_active_filters_scope() {
        let store = MemoryTemplateStore::new();
        let merchant = Uuid::new_v4();
        let other = Uuid::new_v4();

        store
            .upsert(Template::new(None, "reminder_2h", Channel::Sms, "en", "global"))
            .await
            .unwrap();
        store
            .upsert(Template::new(Some(merchant), "reminder_2h", Channel::Sms, "en", "mine"))
            .await
            .unwrap();
        store
            .upsert(Template::new(Some(other), "reminder_2h", Channel::Sms, "en", "theirs"))
            .await
            .unwrap();

        let found = store
            .find_active(Some(merchant), "reminder_2h", Channel::Sms, "en")
            .await
            .unwrap();
        let mut bodies: Vec<_> = found.iter().map(|t| t.body.as_str()).collect();
        bodies.sort();
        assert_eq!(bodies, vec!["global", "mine"]);

        let global_only = store
            .find_active(None, "reminder_2h", Channel::Sms, "en")
            .await
            .unwrap();
        assert_eq!(global_only.len(), 1);
        assert_eq!(global_only[0].body, "global");
    }

    #[tokio::test]
    async fn test_find_active_skips_inactive_and_other_locales() {
        let store = MemoryTemplateStore::new();

        store
            .upsert(Template::new(None, "no_show", Channel::Email, "en", "a").inactive())
            .await
            .unwrap();
        store
            .upsert(Template::new(None, "no_show", Channel::Email, "vi", "b"))
            .await
            .unwrap();

        let found = store
            .find_active(None, "no_show", Channel::Email, "en")
            .await
            .unwrap();
        assert!(found.is_empty());
    }

    #[tokio::test]
    async fn test_upsert_rejects_invalid() {
        let store = MemoryTemplateStore::new();
        let result = store
            .upsert(Template::new(None, "", Channel::Email, "en", "body"))
            .await;
        assert!(matches!(result, Err(StoreError::InvalidData(_))));
        assert_eq!(store.count(), 0);
    }
}
