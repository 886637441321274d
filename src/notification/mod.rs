//! Notification types and dispatching.
//!
//! `DispatchCoordinator` is the entry point: it loads the reservation, picks
//! channels and locale, renders one message per channel, records it in the
//! history log and hands it to the queue for the Delivery Worker.

mod dispatcher;
mod error;
mod recipient;
mod types;
mod variables;

pub use dispatcher::{DispatchCoordinator, DispatcherStats, DispatcherStatsSnapshot};
pub use error::DispatchError;
pub use recipient::RecipientResolver;
pub use types::{
    type_codes, Channel, ChannelFailure, DeliveryUpdate, DispatchEvent, DispatchResult,
    NotificationInstance, NotificationStatus, RenderedMessage,
};
pub use variables::{format_date, format_time, TemplateVariables};
