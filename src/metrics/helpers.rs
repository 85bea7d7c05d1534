//! Metrics helper structs for convenient metric recording

use prometheus::{Encoder, TextEncoder};

use crate::template::TemplateResult;

use super::{
    NOTIFICATIONS_SENT_TOTAL, TEMPLATE_OPERATIONS_TOTAL, TEMPLATE_RENDERS_TOTAL,
    TEMPLATE_RENDER_DURATION,
};

/// Encode all metrics to Prometheus text format
pub fn encode_metrics() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer).unwrap_or_default())
}

/// `"success"` or the error kind of a template result
pub fn outcome_label<T>(result: &TemplateResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.kind().as_str(),
    }
}

/// Helper struct for recording template metrics
pub struct TemplateMetrics;

impl TemplateMetrics {
    /// Record a render attempt and how long it took
    pub fn record_render(result: &str, duration_secs: f64) {
        TEMPLATE_RENDERS_TOTAL.with_label_values(&[result]).inc();
        TEMPLATE_RENDER_DURATION.observe(duration_secs);
    }

    /// Record a use-case invocation
    pub fn record_operation(operation: &str, result: &str) {
        TEMPLATE_OPERATIONS_TOTAL
            .with_label_values(&[operation, result])
            .inc();
    }
}

/// Helper struct for recording notification metrics
pub struct NotificationMetrics;

impl NotificationMetrics {
    pub fn record_sent(channel: &str) {
        NOTIFICATIONS_SENT_TOTAL
            .with_label_values(&[channel, "success"])
            .inc();
    }

    pub fn record_failed(channel: &str) {
        NOTIFICATIONS_SENT_TOTAL
            .with_label_values(&[channel, "failure"])
            .inc();
    }
}
