//! Prometheus metrics for the reservation notifier.
//!
//! This module provides metrics for monitoring the dispatch engine:
//! - Dispatch metrics (outcomes, per-channel queued and error counts, latency)
//! - Scheduler metrics (reminders scheduled and skipped, cancellations)
//! - Queue metrics
//! - Lifecycle subscriber metrics

mod helpers;

pub use helpers::{encode_metrics, DispatchMetrics, LifecycleMetrics, SchedulerMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter, register_int_counter_vec, register_int_gauge,
    Histogram, IntCounter, IntCounterVec, IntGauge,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "ara_notifier";

lazy_static! {
    // ============================================================================
    // Dispatch Metrics
    // ============================================================================

    /// Dispatch calls by outcome (success, partial, failed)
    pub static ref DISPATCH_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_dispatch_total", METRIC_PREFIX),
        "Total dispatch calls by outcome",
        &["outcome"]
    ).unwrap();

    /// Notification instances queued per channel
    pub static ref CHANNEL_QUEUED_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_channel_queued_total", METRIC_PREFIX),
        "Total notifications queued per channel",
        &["channel"]
    ).unwrap();

    /// Per-channel dispatch failures by error code
    pub static ref CHANNEL_ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_channel_errors_total", METRIC_PREFIX),
        "Total per-channel dispatch failures",
        &["channel", "code"]
    ).unwrap();

    /// Time to resolve, render and persist one dispatch call
    pub static ref DISPATCH_LATENCY: Histogram = register_histogram!(
        format!("{}_dispatch_latency_seconds", METRIC_PREFIX),
        "Dispatch latency in seconds",
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0]
    ).unwrap();

    // ============================================================================
    // Scheduler Metrics
    // ============================================================================

    /// Reminders scheduled for a future instant
    pub static ref REMINDERS_SCHEDULED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reminders_scheduled_total", METRIC_PREFIX),
        "Total reminders scheduled"
    ).unwrap();

    /// Reminders skipped because their target instant had passed
    pub static ref REMINDERS_SKIPPED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_reminders_skipped_total", METRIC_PREFIX),
        "Total reminders skipped because the target time had passed"
    ).unwrap();

    /// Notifications cancelled through cancel_all
    pub static ref CANCELLATIONS_TOTAL: IntCounter = register_int_counter!(
        format!("{}_cancellations_total", METRIC_PREFIX),
        "Total pending notifications cancelled"
    ).unwrap();

    // ============================================================================
    // Queue Metrics
    // ============================================================================

    /// Entries waiting for a worker (refreshed on scrape)
    pub static ref QUEUE_PENDING: IntGauge = register_int_gauge!(
        format!("{}_queue_pending", METRIC_PREFIX),
        "Queue entries waiting for a worker"
    ).unwrap();

    /// Entries claimed by a worker (refreshed on scrape)
    pub static ref QUEUE_CLAIMED: IntGauge = register_int_gauge!(
        format!("{}_queue_claimed", METRIC_PREFIX),
        "Queue entries claimed by a worker"
    ).unwrap();

    /// Total entries enqueued
    pub static ref QUEUE_ENQUEUED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_enqueued_total", METRIC_PREFIX),
        "Total queue entries enqueued"
    ).unwrap();

    /// Total entries cancelled before a worker claimed them
    pub static ref QUEUE_CANCELLED_TOTAL: IntCounter = register_int_counter!(
        format!("{}_queue_cancelled_total", METRIC_PREFIX),
        "Total queue entries cancelled"
    ).unwrap();

    // ============================================================================
    // Lifecycle Subscriber Metrics
    // ============================================================================

    /// Redis subscriber connection status (1 = connected, 0 = disconnected)
    pub static ref LIFECYCLE_SUBSCRIBER_CONNECTED: IntGauge = register_int_gauge!(
        format!("{}_lifecycle_subscriber_connected", METRIC_PREFIX),
        "Lifecycle subscriber connection status"
    ).unwrap();

    /// Lifecycle messages by result (handled, ignored, invalid)
    pub static ref LIFECYCLE_EVENTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_lifecycle_events_total", METRIC_PREFIX),
        "Total reservation lifecycle messages received",
        &["result"]
    ).unwrap();
}
