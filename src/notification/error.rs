use thiserror::Error;
use uuid::Uuid;

use crate::storage::StoreError;
use crate::template::TemplateError;

use super::types::{Channel, ChannelFailure};

/// Errors raised while dispatching notifications.
///
/// Only `EventNotFound` fails a whole dispatch call; the rest are recorded per
/// channel and never abort sibling channels.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("Reservation not found: {0}")]
    EventNotFound(Uuid),

    #[error("No active template for {type_code} on {channel} (locale {locale})")]
    Configuration {
        type_code: String,
        channel: Channel,
        locale: String,
    },

    #[error("No recipient available for channel {0}")]
    RecipientUnavailable(Channel),

    #[error("Rendering failed: {0}")]
    Render(#[from] TemplateError),

    #[error("Persistence error: {0}")]
    Persistence(#[from] StoreError),
}

impl DispatchError {
    pub fn code(&self) -> &'static str {
        match self {
            DispatchError::EventNotFound(_) => "EVENT_NOT_FOUND",
            DispatchError::Configuration { .. } => "CONFIGURATION_ERROR",
            DispatchError::RecipientUnavailable(_) => "RECIPIENT_UNAVAILABLE",
            DispatchError::Render(_) => "RENDER_ERROR",
            DispatchError::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    pub(crate) fn into_failure(self, channel: Option<Channel>) -> ChannelFailure {
        ChannelFailure {
            channel,
            code: self.code(),
            message: self.to_string(),
        }
    }
}
