use crate::preference::Preferences;
use crate::reservation::Reservation;

use super::error::DispatchError;
use super::types::Channel;

/// Maps a channel to the concrete address a Delivery Worker sends to
pub struct RecipientResolver;

impl RecipientResolver {
    /// Destination for `channel`.
    ///
    /// Chat-app channels only resolve through a stored preference handle, so
    /// guests without an account can never be reached on them.
    pub fn resolve(
        channel: Channel,
        reservation: &Reservation,
        prefs: Option<&Preferences>,
    ) -> Result<String, DispatchError> {
        let recipient = match channel {
            Channel::Email => non_blank(reservation.guest_email.as_deref()).map(str::to_string),
            Channel::Sms => non_blank(reservation.guest_phone.as_deref()).map(str::to_string),
            Channel::Whatsapp => prefs
                .and_then(|p| p.handle_for(Channel::Whatsapp))
                .or_else(|| non_blank(reservation.guest_phone.as_deref()))
                .map(str::to_string),
            Channel::Push => reservation.account_id.map(|id| id.to_string()),
            Channel::Telegram | Channel::Line | Channel::Zalo => prefs
                .and_then(|p| p.handle_for(channel))
                .map(str::to_string),
        };

        recipient.ok_or(DispatchError::RecipientUnavailable(channel))
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}
