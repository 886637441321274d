use std::fmt::{Display, Write};

use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::DispatchConfig;
use crate::reservation::Reservation;

/// Values a template can reference, captured once per dispatch call
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TemplateVariables {
    pub guest_name: String,
    pub restaurant_name: String,
    pub date: String,
    pub time: String,
    pub party_size: i32,
    pub reservation_code: String,
    pub reservation_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub special_requests: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub calendar_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reservation_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
}

impl TemplateVariables {
    pub fn from_reservation(reservation: &Reservation, config: &DispatchConfig) -> Self {
        let restaurant_name = reservation
            .location
            .as_ref()
            .map(|l| l.name.clone())
            .filter(|n| !n.trim().is_empty())
            .unwrap_or_else(|| config.fallback_restaurant_name.clone());

        let manage_url = config
            .public_base_url
            .as_deref()
            .map(|base| {
                format!(
                    "{}/reservations/{}",
                    base.trim_end_matches('/'),
                    reservation.reservation_code
                )
            });

        Self {
            guest_name: reservation.guest_name.clone(),
            restaurant_name,
            date: format_date(reservation.date, &config.date_format).unwrap_or_else(|| {
                fallback_format("date_format", reservation.date.format(FALLBACK_DATE_FORMAT))
            }),
            time: format_time(reservation.time, &config.time_format).unwrap_or_else(|| {
                fallback_format("time_format", reservation.time.format(FALLBACK_TIME_FORMAT))
            }),
            party_size: reservation.party_size,
            reservation_code: reservation.reservation_code.clone(),
            reservation_id: reservation.id.to_string(),
            special_requests: non_blank(reservation.special_requests.as_deref()),
            section: non_blank(reservation.section.as_deref()),
            calendar_url: manage_url.as_ref().map(|u| format!("{}/calendar.ics", u)),
            cancel_url: manage_url.as_ref().map(|u| format!("{}/cancel", u)),
            reservation_url: manage_url,
        }
    }

    /// Flat JSON object for placeholder substitution; absent optionals are omitted
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        map.insert("guest_name".into(), Value::from(self.guest_name.as_str()));
        map.insert(
            "restaurant_name".into(),
            Value::from(self.restaurant_name.as_str()),
        );
        map.insert("date".into(), Value::from(self.date.as_str()));
        map.insert("time".into(), Value::from(self.time.as_str()));
        map.insert("party_size".into(), Value::from(self.party_size));
        map.insert(
            "reservation_code".into(),
            Value::from(self.reservation_code.as_str()),
        );
        map.insert(
            "reservation_id".into(),
            Value::from(self.reservation_id.as_str()),
        );

        let optional = [
            ("special_requests", &self.special_requests),
            ("section", &self.section),
            ("calendar_url", &self.calendar_url),
            ("reservation_url", &self.reservation_url),
            ("cancel_url", &self.cancel_url),
        ];
        for (key, value) in optional {
            if let Some(value) = value {
                map.insert(key.into(), Value::from(value.as_str()));
            }
        }

        Value::Object(map)
    }
}

const FALLBACK_DATE_FORMAT: &str = "%Y-%m-%d";
const FALLBACK_TIME_FORMAT: &str = "%H:%M";

/// Render a date with a strftime pattern; `None` when the pattern needs
/// fields a date does not have (e.g. `%H`) or is malformed.
pub fn format_date(date: NaiveDate, pattern: &str) -> Option<String> {
    try_render(date.format(pattern))
}

/// Render a time of day with a strftime pattern; `None` on unusable patterns
pub fn format_time(time: NaiveTime, pattern: &str) -> Option<String> {
    try_render(time.format(pattern))
}

// `to_string` panics when chrono reports a format error; `write!` surfaces it.
fn try_render(formatted: impl Display) -> Option<String> {
    let mut out = String::new();
    write!(out, "{}", formatted).ok()?;
    Some(out)
}

fn fallback_format(setting: &str, formatted: impl Display) -> String {
    tracing::warn!(setting, "Configured format cannot be rendered, using ISO fallback");
    try_render(formatted).unwrap_or_default()
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::reservation::Location;

    fn reservation() -> Reservation {
        Reservation {
            id: Uuid::new_v4(),
            guest_name: "Linh Tran".to_string(),
            guest_email: Some("linh@example.com".to_string()),
            guest_phone: None,
            guest_locale: None,
            account_id: None,
            date: NaiveDate::from_ymd_opt(2025, 3, 10).unwrap(),
            time: NaiveTime::from_hms_opt(18, 30, 0).unwrap(),
            party_size: 4,
            reservation_code: "RSV-7Q2K".to_string(),
            special_requests: Some("  ".to_string()),
            section: Some("Terrace".to_string()),
            location: None,
        }
    }

    #[test]
    fn test_fallback_restaurant_and_formats() {
        let vars = TemplateVariables::from_reservation(&reservation(), &DispatchConfig::default());

        assert_eq!(vars.restaurant_name, "Our Restaurant");
        assert_eq!(vars.date, "2025-03-10");
        assert_eq!(vars.time, "18:30");
        assert_eq!(vars.special_requests, None);
        assert_eq!(vars.section.as_deref(), Some("Terrace"));
        assert_eq!(vars.reservation_url, None);
    }

    #[test]
    fn test_location_name_and_links() {
        let mut r = reservation();
        r.location = Some(Location {
            id: Uuid::new_v4(),
            name: "Pho 24".to_string(),
            merchant_id: None,
        });
        let config = DispatchConfig {
            public_base_url: Some("https://book.example.com/".to_string()),
            ..Default::default()
        };

        let vars = TemplateVariables::from_reservation(&r, &config);
        assert_eq!(vars.restaurant_name, "Pho 24");
        assert_eq!(
            vars.reservation_url.as_deref(),
            Some("https://book.example.com/reservations/RSV-7Q2K")
        );
        assert_eq!(
            vars.cancel_url.as_deref(),
            Some("https://book.example.com/reservations/RSV-7Q2K/cancel")
        );
        assert_eq!(
            vars.calendar_url.as_deref(),
            Some("https://book.example.com/reservations/RSV-7Q2K/calendar.ics")
        );
    }

    #[test]
    fn test_unusable_formats_fall_back() {
        let config = DispatchConfig {
            date_format: "%Y-%m-%d %H".to_string(),
            time_format: "%Y %H:%M".to_string(),
            ..Default::default()
        };

        let vars = TemplateVariables::from_reservation(&reservation(), &config);
        assert_eq!(vars.date, "2025-03-10");
        assert_eq!(vars.time, "18:30");
    }

    #[test]
    fn test_format_helpers() {
        let date = NaiveDate::from_ymd_opt(2025, 3, 10).unwrap();
        assert_eq!(format_date(date, "%d/%m/%Y").as_deref(), Some("10/03/2025"));
        assert_eq!(format_date(date, "%H"), None);

        let time = NaiveTime::from_hms_opt(7, 5, 0).unwrap();
        assert_eq!(format_time(time, "%I:%M %p").as_deref(), Some("07:05 AM"));
        assert_eq!(format_time(time, "%Y"), None);
    }

    #[test]
    fn test_json_omits_absent_optionals() {
        let json = TemplateVariables::from_reservation(&reservation(), &DispatchConfig::default())
            .to_json();
        let map = json.as_object().unwrap();

        assert_eq!(map["party_size"], 4);
        assert!(map.contains_key("section"));
        assert!(!map.contains_key("special_requests"));
        assert!(!map.contains_key("cancel_url"));
    }
}
