use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Delivery medium for a notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    Email,
    Sms,
    Push,
    Whatsapp,
    Telegram,
    Line,
    Zalo,
}

impl Channel {
    /// All channels, in the order preference flags are evaluated
    pub const ALL: [Channel; 7] = [
        Channel::Email,
        Channel::Sms,
        Channel::Push,
        Channel::Whatsapp,
        Channel::Telegram,
        Channel::Line,
        Channel::Zalo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Push => "push",
            Channel::Whatsapp => "whatsapp",
            Channel::Telegram => "telegram",
            Channel::Line => "line",
            Channel::Zalo => "zalo",
        }
    }

    /// Chat-app channels that can only be reached through a stored handle
    pub fn requires_handle(&self) -> bool {
        matches!(self, Channel::Telegram | Channel::Line | Channel::Zalo)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Channel::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| format!("unknown channel: {}", s))
    }
}

/// Lifecycle status of a notification instance.
///
/// Happy path is `Pending -> Queued -> Sent -> Delivered -> Read`; not every
/// channel reports past `Sent`. `Failed`, `Bounced` and `Read` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationStatus {
    Pending,
    Queued,
    Sent,
    Delivered,
    Read,
    Failed,
    Bounced,
}

impl NotificationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationStatus::Pending => "pending",
            NotificationStatus::Queued => "queued",
            NotificationStatus::Sent => "sent",
            NotificationStatus::Delivered => "delivered",
            NotificationStatus::Read => "read",
            NotificationStatus::Failed => "failed",
            NotificationStatus::Bounced => "bounced",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            NotificationStatus::Read | NotificationStatus::Failed | NotificationStatus::Bounced
        )
    }

    /// Rows in these states can still be cancelled
    pub fn is_cancellable(&self) -> bool {
        matches!(self, NotificationStatus::Pending | NotificationStatus::Queued)
    }

    pub fn can_transition_to(&self, next: NotificationStatus) -> bool {
        use NotificationStatus::*;

        if self.is_terminal() {
            return false;
        }
        if next == Failed {
            return true;
        }

        match self {
            Pending => matches!(next, Queued | Sent),
            Queued => matches!(next, Sent),
            Sent => matches!(next, Delivered | Read | Bounced),
            Delivered => matches!(next, Read),
            Read | Failed | Bounced => false,
        }
    }
}

impl fmt::Display for NotificationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NotificationStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(NotificationStatus::Pending),
            "queued" => Ok(NotificationStatus::Queued),
            "sent" => Ok(NotificationStatus::Sent),
            "delivered" => Ok(NotificationStatus::Delivered),
            "read" => Ok(NotificationStatus::Read),
            "failed" => Ok(NotificationStatus::Failed),
            "bounced" => Ok(NotificationStatus::Bounced),
            other => Err(format!("unknown notification status: {}", other)),
        }
    }
}

/// Well-known notification type codes
pub mod type_codes {
    pub const RESERVATION_CONFIRMED: &str = "reservation_confirmed";
    pub const RESERVATION_UPDATED: &str = "reservation_updated";
    pub const RESERVATION_CANCELLED: &str = "reservation_cancelled";
    pub const REMINDER_24H: &str = "reminder_24h";
    pub const REMINDER_2H: &str = "reminder_2h";
    pub const NO_SHOW: &str = "no_show";
    pub const TABLE_READY: &str = "table_ready";
}

/// Rendered message content for one channel
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RenderedMessage {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub body: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html_body: Option<String>,
    #[serde(default)]
    pub buttons: serde_json::Value,
}

/// One notification for one channel, as recorded in the history log
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationInstance {
    pub id: Uuid,
    /// Id of the reservation this notification is about
    pub correlation_id: Uuid,
    pub type_code: String,
    pub channel: Channel,
    pub recipient: String,
    pub recipient_name: String,
    #[serde(flatten)]
    pub content: RenderedMessage,
    pub status: NotificationStatus,
    pub provider: Option<String>,
    pub provider_message_id: Option<String>,
    pub error_message: Option<String>,
    pub scheduled_for: DateTime<Utc>,
    pub sent_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl NotificationInstance {
    /// Create a new pending instance
    pub fn pending(
        correlation_id: Uuid,
        type_code: impl Into<String>,
        channel: Channel,
        recipient: impl Into<String>,
        recipient_name: impl Into<String>,
        content: RenderedMessage,
        scheduled_for: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            correlation_id,
            type_code: type_code.into(),
            channel,
            recipient: recipient.into(),
            recipient_name: recipient_name.into(),
            content,
            status: NotificationStatus::Pending,
            provider: None,
            provider_message_id: None,
            error_message: None,
            scheduled_for,
            sent_at: None,
            created_at: Utc::now(),
        }
    }
}

/// Fields the Delivery Worker writes back after an attempt
#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryUpdate {
    pub status: NotificationStatus,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub provider_message_id: Option<String>,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub sent_at: Option<DateTime<Utc>>,
}

/// A request to notify about one reservation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchEvent {
    pub correlation_id: Uuid,
    pub type_code: String,
    /// Explicit channel override; empty or absent means "resolve from preferences"
    #[serde(default)]
    pub channels: Option<Vec<Channel>>,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<i32>,
    #[serde(default)]
    pub locale: Option<String>,
}

impl DispatchEvent {
    pub fn new(correlation_id: Uuid, type_code: impl Into<String>) -> Self {
        Self {
            correlation_id,
            type_code: type_code.into(),
            channels: None,
            scheduled_for: None,
            priority: None,
            locale: None,
        }
    }

    pub fn channels(mut self, channels: Vec<Channel>) -> Self {
        self.channels = Some(channels);
        self
    }

    pub fn scheduled_for(mut self, at: DateTime<Utc>) -> Self {
        self.scheduled_for = Some(at);
        self
    }

    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }
}

/// A failure recorded while dispatching
#[derive(Debug, Clone, Serialize)]
pub struct ChannelFailure {
    /// `None` when the whole call failed before channels were evaluated
    pub channel: Option<Channel>,
    pub code: &'static str,
    pub message: String,
}

/// Aggregate outcome of one dispatch call
#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchResult {
    pub success: bool,
    pub queued_ids: Vec<Uuid>,
    pub errors: Vec<ChannelFailure>,
}

impl DispatchResult {
    pub(crate) fn failed(failure: ChannelFailure) -> Self {
        Self {
            success: false,
            queued_ids: Vec::new(),
            errors: vec![failure],
        }
    }
}
