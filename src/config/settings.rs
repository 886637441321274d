use chrono::{NaiveDate, NaiveTime};
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::env;

use crate::notification::{format_date, format_time, Channel};

/// Settings read from comma-separated environment values
const LIST_KEYS: [&str; 4] = [
    "dispatch.default_channels",
    "dispatch.guest_channels",
    "redis.channels",
    "scheduler.reminder_offsets_minutes",
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub redis: RedisConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub dispatch: DispatchConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub otel: OtelConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_pool_size")]
    pub pool_size: u32,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_seconds: u32,
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_seconds: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RedisConfig {
    /// Start the reservation lifecycle subscriber
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_redis_url")]
    pub url: String,
    /// Channel patterns to subscribe to
    #[serde(default = "default_redis_channels")]
    pub channels: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// "memory" or "postgres"
    #[serde(default = "default_storage_backend")]
    pub backend: String,
}

/// Knobs for the dispatch coordinator
#[derive(Debug, Clone, Deserialize)]
pub struct DispatchConfig {
    /// Used for account holders without a usable preference row
    #[serde(default = "default_channels")]
    pub default_channels: Vec<Channel>,
    /// Used for guests booking without an account
    #[serde(default = "default_guest_channels")]
    pub guest_channels: Vec<Channel>,
    /// Add sms for guests that left a phone number
    #[serde(default = "default_true")]
    pub guest_sms_when_phone: bool,
    #[serde(default = "default_priority")]
    pub default_priority: i32,
    #[serde(default = "default_locale")]
    pub default_locale: String,
    #[serde(default = "default_locale")]
    pub fallback_locale: String,
    /// Shown when a reservation has no location
    #[serde(default = "default_restaurant_name")]
    pub fallback_restaurant_name: String,
    /// Base for calendar, manage and cancel links; links are omitted when unset
    #[serde(default)]
    pub public_base_url: Option<String>,
    #[serde(default = "default_date_format")]
    pub date_format: String,
    #[serde(default = "default_time_format")]
    pub time_format: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SchedulerConfig {
    /// Reminder offsets relative to the reservation start, negative = before
    #[serde(default = "default_reminder_offsets")]
    pub reminder_offsets_minutes: Vec<i64>,
    #[serde(default = "default_cancellation_reason")]
    pub cancellation_reason: String,
}

/// OpenTelemetry configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OtelConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_sampling_ratio")]
    pub sampling_ratio: f64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8081
}

fn default_database_url() -> String {
    "postgres://localhost:5432/ara".to_string()
}

fn default_pool_size() -> u32 {
    10
}

fn default_connect_timeout() -> u32 {
    5
}

fn default_idle_timeout() -> u32 {
    300 // 5 minutes
}

fn default_redis_url() -> String {
    "redis://localhost:6379".to_string()
}

fn default_redis_channels() -> Vec<String> {
    vec!["reservations:*".to_string()]
}

fn default_storage_backend() -> String {
    "memory".to_string()
}

fn default_channels() -> Vec<Channel> {
    vec![Channel::Email, Channel::Push]
}

fn default_guest_channels() -> Vec<Channel> {
    vec![Channel::Email]
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    5
}

fn default_locale() -> String {
    "en".to_string()
}

fn default_restaurant_name() -> String {
    "Our Restaurant".to_string()
}

fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

fn default_time_format() -> String {
    "%H:%M".to_string()
}

fn default_reminder_offsets() -> Vec<i64> {
    vec![-24 * 60, -2 * 60]
}

fn default_cancellation_reason() -> String {
    "Cancelled due to reservation cancellation".to_string()
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_string()
}

fn default_service_name() -> String {
    "ara-reservation-notifier".to_string()
}

fn default_sampling_ratio() -> f64 {
    1.0
}

impl Settings {
    pub fn new() -> Result<Self, ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8081)?
            .set_default("storage.backend", "memory")?
            // Load config file if exists
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Load from environment variables
            // SERVER__PORT, DATABASE__URL, DISPATCH__DEFAULT_LOCALE, etc.
            .add_source(environment());

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.dispatch.validate()?;
        Ok(settings)
    }

    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }
}

/// Environment source; only `LIST_KEYS` are split on commas
fn environment() -> Environment {
    LIST_KEYS.iter().fold(
        Environment::default()
            .separator("__")
            .try_parsing(true)
            .list_separator(","),
        |env, key| env.with_list_parse_key(key),
    )
}

impl DispatchConfig {
    /// Reject date/time patterns that cannot render a plain date or time of day
    pub fn validate(&self) -> Result<(), ConfigError> {
        if format_date(NaiveDate::default(), &self.date_format).is_none() {
            return Err(ConfigError::Message(format!(
                "dispatch.date_format {:?} cannot format a date",
                self.date_format
            )));
        }
        if format_time(NaiveTime::default(), &self.time_format).is_none() {
            return Err(ConfigError::Message(format!(
                "dispatch.time_format {:?} cannot format a time of day",
                self.time_format
            )));
        }
        Ok(())
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            pool_size: default_pool_size(),
            connect_timeout_seconds: default_connect_timeout(),
            idle_timeout_seconds: default_idle_timeout(),
        }
    }
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: default_redis_url(),
            channels: default_redis_channels(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: default_storage_backend(),
        }
    }
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            default_channels: default_channels(),
            guest_channels: default_guest_channels(),
            guest_sms_when_phone: true,
            default_priority: default_priority(),
            default_locale: default_locale(),
            fallback_locale: default_locale(),
            fallback_restaurant_name: default_restaurant_name(),
            public_base_url: None,
            date_format: default_date_format(),
            time_format: default_time_format(),
        }
    }
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            reminder_offsets_minutes: default_reminder_offsets(),
            cancellation_reason: default_cancellation_reason(),
        }
    }
}

impl Default for OtelConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_service_name(),
            sampling_ratio: default_sampling_ratio(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_values() {
        let server = ServerConfig::default();
        assert_eq!(server.host, "0.0.0.0");
        assert_eq!(server.port, 8081);
    }

    #[test]
    fn test_dispatch_defaults() {
        let dispatch = DispatchConfig::default();
        assert_eq!(dispatch.default_channels, vec![Channel::Email, Channel::Push]);
        assert_eq!(dispatch.guest_channels, vec![Channel::Email]);
        assert!(dispatch.guest_sms_when_phone);
        assert_eq!(dispatch.default_priority, 5);
        assert_eq!(dispatch.fallback_locale, "en");
    }

    #[test]
    fn test_scheduler_defaults() {
        let scheduler = SchedulerConfig::default();
        assert_eq!(scheduler.reminder_offsets_minutes, vec![-1440, -120]);
        assert_eq!(
            scheduler.cancellation_reason,
            "Cancelled due to reservation cancellation"
        );
    }

    #[test]
    fn test_sections_fill_missing_fields() {
        let settings: Settings = Config::builder()
            .set_default("dispatch.default_locale", "vi")
            .unwrap()
            .set_default("dispatch.default_channels", vec!["sms", "zalo"])
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(settings.dispatch.default_locale, "vi");
        assert_eq!(
            settings.dispatch.default_channels,
            vec![Channel::Sms, Channel::Zalo]
        );
        assert_eq!(settings.dispatch.fallback_locale, "en");
        assert_eq!(settings.storage.backend, "memory");
        assert_eq!(settings.server.port, 8081);
    }

    fn from_env(vars: &[(&str, &str)]) -> Result<Settings, ConfigError> {
        let source = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::builder()
            .add_source(environment().source(Some(source)))
            .build()?
            .try_deserialize()
    }

    #[test]
    fn test_env_overrides_strings_and_lists() {
        let settings = from_env(&[
            ("DISPATCH__DEFAULT_LOCALE", "vi"),
            ("DATABASE__URL", "postgres://db:5432/ara"),
            ("REDIS__URL", "redis://cache:6379"),
            ("SERVER__PORT", "9090"),
            ("DISPATCH__DEFAULT_CHANNELS", "sms,zalo"),
            ("REDIS__CHANNELS", "reservations:*"),
            ("SCHEDULER__REMINDER_OFFSETS_MINUTES", "-2880,-60"),
        ])
        .unwrap();

        assert_eq!(settings.dispatch.default_locale, "vi");
        assert_eq!(settings.database.url, "postgres://db:5432/ara");
        assert_eq!(settings.redis.url, "redis://cache:6379");
        assert_eq!(settings.server.port, 9090);
        assert_eq!(
            settings.dispatch.default_channels,
            vec![Channel::Sms, Channel::Zalo]
        );
        assert_eq!(settings.redis.channels, vec!["reservations:*".to_string()]);
        assert_eq!(settings.scheduler.reminder_offsets_minutes, vec![-2880, -60]);
    }

    #[test]
    fn test_validate_rejects_unusable_formats() {
        assert!(DispatchConfig::default().validate().is_ok());

        let date_with_hour = DispatchConfig {
            date_format: "%Y-%m-%d %H".to_string(),
            ..Default::default()
        };
        assert!(date_with_hour.validate().is_err());

        let time_with_year = DispatchConfig {
            time_format: "%Y %H:%M".to_string(),
            ..Default::default()
        };
        assert!(time_with_year.validate().is_err());
    }
}
