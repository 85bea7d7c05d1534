//! Prometheus metrics for the template service.
//!
//! - Render metrics (outcome counts, render latency)
//! - Use-case metrics (per operation and outcome)
//! - Notification metrics (outbound messages per channel)

mod helpers;

pub use helpers::{encode_metrics, outcome_label, NotificationMetrics, TemplateMetrics};

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Histogram, IntCounterVec,
};

/// Prefix for all metrics
const METRIC_PREFIX: &str = "tixgo";

lazy_static! {
    // ============================================================================
    // Render Metrics
    // ============================================================================

    /// Total template renders by outcome
    pub static ref TEMPLATE_RENDERS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_renders_total", METRIC_PREFIX),
        "Total template renders",
        &["result"]
    ).unwrap();

    /// Time spent rendering subject and content
    pub static ref TEMPLATE_RENDER_DURATION: Histogram = register_histogram!(
        format!("{}_template_render_duration_seconds", METRIC_PREFIX),
        "Template render duration in seconds",
        vec![0.00005, 0.0001, 0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5]
    ).unwrap();

    // ============================================================================
    // Use-case Metrics
    // ============================================================================

    /// Template use-case invocations by operation and outcome
    pub static ref TEMPLATE_OPERATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_template_operations_total", METRIC_PREFIX),
        "Total template operations",
        &["operation", "result"]
    ).unwrap();

    // ============================================================================
    // Notification Metrics
    // ============================================================================

    /// Outbound notifications by channel and outcome
    pub static ref NOTIFICATIONS_SENT_TOTAL: IntCounterVec = register_int_counter_vec!(
        format!("{}_notifications_sent_total", METRIC_PREFIX),
        "Total outbound notifications handed to a transport",
        &["channel", "result"]
    ).unwrap();
}
