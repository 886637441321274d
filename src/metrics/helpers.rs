//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::notification::{Channel, DispatchResult};

use super::{
    CANCELLATIONS_TOTAL, CHANNEL_ERRORS_TOTAL, CHANNEL_QUEUED_TOTAL, DISPATCH_LATENCY,
    DISPATCH_TOTAL, LIFECYCLE_EVENTS_TOTAL, LIFECYCLE_SUBSCRIBER_CONNECTED,
    REMINDERS_SCHEDULED_TOTAL, REMINDERS_SKIPPED_TOTAL,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// Helper struct for recording dispatch metrics
pub struct DispatchMetrics;

impl DispatchMetrics {
    /// Record the outcome of a whole dispatch call
    pub fn record_result(result: &DispatchResult, latency_secs: f64) {
        let outcome = match (result.success, result.errors.is_empty()) {
            (true, true) => "success",
            (true, false) => "partial",
            (false, _) => "failed",
        };
        DISPATCH_TOTAL.with_label_values(&[outcome]).inc();
        DISPATCH_LATENCY.observe(latency_secs);
    }

    pub fn record_queued(channel: Channel) {
        CHANNEL_QUEUED_TOTAL
            .with_label_values(&[channel.as_str()])
            .inc();
    }

    /// Record a failure; `None` means the call failed before channel fan-out
    pub fn record_error(channel: Option<Channel>, code: &str) {
        let channel = channel.map(|c| c.as_str()).unwrap_or("none");
        CHANNEL_ERRORS_TOTAL
            .with_label_values(&[channel, code])
            .inc();
    }
}

/// Helper struct for recording scheduler metrics
pub struct SchedulerMetrics;

impl SchedulerMetrics {
    pub fn record_scheduled() {
        REMINDERS_SCHEDULED_TOTAL.inc();
    }

    pub fn record_skipped() {
        REMINDERS_SKIPPED_TOTAL.inc();
    }

    /// Record notifications cancelled by one cancel_all call
    pub fn record_cancelled(count: u64) {
        CANCELLATIONS_TOTAL.inc_by(count);
    }
}

/// Helper struct for the Redis lifecycle subscriber
pub struct LifecycleMetrics;

impl LifecycleMetrics {
    pub fn set_connected(connected: bool) {
        LIFECYCLE_SUBSCRIBER_CONNECTED.set(if connected { 1 } else { 0 });
    }

    pub fn record_handled() {
        LIFECYCLE_EVENTS_TOTAL.with_label_values(&["handled"]).inc();
    }

    pub fn record_ignored() {
        LIFECYCLE_EVENTS_TOTAL.with_label_values(&["ignored"]).inc();
    }

    pub fn record_invalid() {
        LIFECYCLE_EVENTS_TOTAL.with_label_values(&["invalid"]).inc();
    }

    pub fn record_failed() {
        LIFECYCLE_EVENTS_TOTAL.with_label_values(&["failed"]).inc();
    }
}
