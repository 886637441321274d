use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::notification::Channel;

/// Notification channel preferences for one account, optionally per merchant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    pub account_id: Uuid,
    #[serde(default)]
    pub merchant_id: Option<Uuid>,
    #[serde(default = "enabled")]
    pub email_enabled: bool,
    #[serde(default)]
    pub sms_enabled: bool,
    #[serde(default = "enabled")]
    pub push_enabled: bool,
    #[serde(default)]
    pub whatsapp_enabled: bool,
    #[serde(default)]
    pub telegram_enabled: bool,
    #[serde(default)]
    pub line_enabled: bool,
    #[serde(default)]
    pub zalo_enabled: bool,
    #[serde(default)]
    pub telegram_chat_id: Option<String>,
    #[serde(default)]
    pub line_user_id: Option<String>,
    #[serde(default)]
    pub zalo_user_id: Option<String>,
    #[serde(default)]
    pub whatsapp_phone: Option<String>,
    #[serde(default)]
    pub preferred_locale: Option<String>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn enabled() -> bool {
    true
}

impl Preferences {
    /// A row with every channel disabled
    pub fn new(account_id: Uuid, merchant_id: Option<Uuid>) -> Self {
        Self {
            account_id,
            merchant_id,
            email_enabled: false,
            sms_enabled: false,
            push_enabled: false,
            whatsapp_enabled: false,
            telegram_enabled: false,
            line_enabled: false,
            zalo_enabled: false,
            telegram_chat_id: None,
            line_user_id: None,
            zalo_user_id: None,
            whatsapp_phone: None,
            preferred_locale: None,
            updated_at: Utc::now(),
        }
    }

    pub fn is_enabled(&self, channel: Channel) -> bool {
        match channel {
            Channel::Email => self.email_enabled,
            Channel::Sms => self.sms_enabled,
            Channel::Push => self.push_enabled,
            Channel::Whatsapp => self.whatsapp_enabled,
            Channel::Telegram => self.telegram_enabled,
            Channel::Line => self.line_enabled,
            Channel::Zalo => self.zalo_enabled,
        }
    }


    /// Stored external handle for a channel, ignoring blank values
    pub fn handle_for(&self, channel: Channel) -> Option<&str> {
        let handle = match channel {
            Channel::Telegram => self.telegram_chat_id.as_deref(),
            Channel::Line => self.line_user_id.as_deref(),
            Channel::Zalo => self.zalo_user_id.as_deref(),
            Channel::Whatsapp => self.whatsapp_phone.as_deref(),
            Channel::Email | Channel::Sms | Channel::Push => None,
        };
        handle.filter(|h| !h.trim().is_empty())
    }

    /// Channels this row opts into.
    ///
    /// Handle-requiring channels are kept only when a handle is stored.
    pub fn enabled_channels(&self) -> Vec<Channel> {
        Channel::ALL
            .into_iter()
            .filter(|c| self.is_enabled(*c))
            .filter(|c| !c.requires_handle() || self.handle_for(*c).is_some())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enabled_channels_in_fixed_order() {
        let mut prefs = Preferences::new(Uuid::new_v4(), None);
        prefs.push_enabled = true;
        prefs.email_enabled = true;
        prefs.sms_enabled = true;

        assert_eq!(
            prefs.enabled_channels(),
            vec![Channel::Email, Channel::Sms, Channel::Push]
        );
    }

    #[test]
    fn test_chat_flag_without_handle_is_dropped() {
        let mut prefs = Preferences::new(Uuid::new_v4(), None);
        prefs.telegram_enabled = true;
        prefs.line_enabled = true;
        prefs.line_user_id = Some("U123".to_string());
        prefs.zalo_enabled = true;
        prefs.zalo_user_id = Some("   ".to_string());

        assert_eq!(prefs.enabled_channels(), vec![Channel::Line]);
    }

    #[test]
    fn test_whatsapp_does_not_need_handle() {
        let mut prefs = Preferences::new(Uuid::new_v4(), None);
        prefs.whatsapp_enabled = true;
        assert_eq!(prefs.enabled_channels(), vec![Channel::Whatsapp]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let prefs: Preferences = serde_json::from_str(
            r#"{"account_id":"6f1c2a4e-8f6b-4f5e-9a39-3f6d2f0b7f11"}"#,
        )
        .unwrap();
        assert_eq!(prefs.enabled_channels(), vec![Channel::Email, Channel::Push]);
        assert!(prefs.merchant_id.is_none());
    }
}
