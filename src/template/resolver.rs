//! Template lookup with scope precedence and a bounded locale fallback

use std::sync::Arc;

use uuid::Uuid;

use crate::notification::Channel;

use super::store::TemplateStore;
use super::types::Template;

/// Resolves the best-matching template for a channel.
///
/// The fallback chain is `[requested, fallback_locale]`, so a lookup issues at
/// most two store queries.
#[derive(Clone)]
pub struct TemplateResolver {
    store: Arc<dyn TemplateStore>,
    fallback_locale: String,
}

impl TemplateResolver {
    pub fn new(store: Arc<dyn TemplateStore>, fallback_locale: impl Into<String>) -> Self {
        Self {
            store,
            fallback_locale: fallback_locale.into(),
        }
    }

    /// Locales to try, in order, for a requested locale
    pub fn locale_chain<'a>(&'a self, locale: &'a str) -> Vec<&'a str> {
        if locale == self.fallback_locale {
            vec![locale]
        } else {
            vec![locale, self.fallback_locale.as_str()]
        }
    }

    /// Find the active template for `(type_code, channel, locale)`.
    ///
    /// A merchant-scoped template outranks a global one for the same locale.
    /// Returns `None` when neither the requested nor the fallback locale has
    /// a match; callers treat that as a per-channel configuration failure.
    #[tracing::instrument(name = "templates.lookup", skip(self))]
    pub async fn lookup(
        &self,
        merchant_id: Option<Uuid>,
        type_code: &str,
        channel: Channel,
        locale: &str,
    ) -> Option<Template> {
        for candidate_locale in self.locale_chain(locale) {
            let candidates = match self
                .store
                .find_active(merchant_id, type_code, channel, candidate_locale)
                .await
            {
                Ok(candidates) => candidates,
                Err(e) => {
                    tracing::error!(
                        error = %e,
                        type_code = %type_code,
                        channel = %channel,
                        locale = %candidate_locale,
                        "Error fetching template"
                    );
                    Vec::new()
                }
            };

            if let Some(template) = pick_most_specific(candidates, merchant_id) {
                if candidate_locale != locale {
                    tracing::debug!(
                        type_code = %type_code,
                        channel = %channel,
                        requested = %locale,
                        used = %candidate_locale,
                        "Using fallback locale template"
                    );
                }
                return Some(template);
            }
        }

        None
    }
}

fn pick_most_specific(candidates: Vec<Template>, merchant_id: Option<Uuid>) -> Option<Template> {
    let mut global = None;

    for template in candidates {
        match template.merchant_id {
            Some(id) if Some(id) == merchant_id => return Some(template),
            None if global.is_none() => global = Some(template),
            _ => {}
        }
    }

    global
}
