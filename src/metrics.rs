/// Metrics and telemetry for Agora
///
/// Provides Prometheus-compatible metrics for monitoring:
/// - HTTP request counts and latencies
/// - Report creation and moderation transitions
/// - Authorization denials and role lookup failures
/// - Removals that left content behind

use lazy_static::lazy_static;
use prometheus::{
    register_histogram_vec, register_int_counter, register_int_counter_vec, register_int_gauge,
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, TextEncoder,
};

lazy_static! {
    // ========== HTTP Metrics ==========

    /// Total HTTP requests by method, path, and status
    pub static ref HTTP_REQUESTS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_http_requests_total",
        "Total number of HTTP requests",
        &["method", "path", "status"]
    )
    .unwrap();

    /// HTTP request duration in seconds
    pub static ref HTTP_REQUEST_DURATION_SECONDS: HistogramVec = register_histogram_vec!(
        "agora_http_request_duration_seconds",
        "HTTP request latencies in seconds",
        &["method", "path"],
        vec![0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0]
    )
    .unwrap();

    // ========== Moderation Metrics ==========

    /// Reports created by reason and item type
    pub static ref REPORTS_CREATED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_reports_created_total",
        "Total number of reports created",
        &["reason", "item_type"]
    )
    .unwrap();

    /// Accepted report transitions by target status
    pub static ref REPORT_TRANSITIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_report_transitions_total",
        "Total number of report status transitions",
        &["status"]
    )
    .unwrap();

    /// Transitions rejected because the report had already left pending
    pub static ref REPORT_TRANSITIONS_REJECTED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_report_transitions_rejected_total",
        "Total number of rejected report transitions",
        &["status"]
    )
    .unwrap();

    /// Reports marked removed whose content deletion failed
    pub static ref INCONSISTENT_REMOVALS_TOTAL: IntCounter = register_int_counter!(
        "agora_inconsistent_removals_total",
        "Reports marked removed whose content could not be deleted"
    )
    .unwrap();

    /// Live report subscribers
    pub static ref REPORT_SUBSCRIBERS_ACTIVE: IntGauge = register_int_gauge!(
        "agora_report_subscribers_active",
        "Number of live report feed subscribers"
    )
    .unwrap();

    // ========== Access Control Metrics ==========

    /// Role lookups that fell back to the lowest role
    pub static ref ROLE_LOOKUP_FAILURES_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_role_lookup_failures_total",
        "Role lookups resolved to the default role",
        &["cause"]
    )
    .unwrap();

    /// Requests denied for a missing capability
    pub static ref AUTHORIZATION_DENIED_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_authorization_denied_total",
        "Total number of capability checks that denied access",
        &["capability"]
    )
    .unwrap();

    // ========== Account Metrics ==========

    /// Account sign-ups
    pub static ref ACCOUNT_CREATIONS_TOTAL: IntCounter = register_int_counter!(
        "agora_account_creations_total",
        "Total number of accounts created"
    )
    .unwrap();

    /// Errors by kind
    pub static ref ERRORS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "agora_errors_total",
        "Total number of errors returned to clients",
        &["kind"]
    )
    .unwrap();
}

/// Render metrics in Prometheus text format
pub fn render_metrics() -> String {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        tracing::error!("Failed to encode metrics: {}", e);
        return String::new();
    }
    String::from_utf8(buffer).unwrap_or_default()
}

/// Record an HTTP request
pub fn record_http_request(method: &str, path: &str, status: u16, duration: f64) {
    HTTP_REQUESTS_TOTAL
        .with_label_values(&[method, path, &status.to_string()])
        .inc();
    HTTP_REQUEST_DURATION_SECONDS
        .with_label_values(&[method, path])
        .observe(duration);
}

/// Record a report creation
pub fn record_report_created(reason: &str, item_type: &str) {
    REPORTS_CREATED_TOTAL
        .with_label_values(&[reason, item_type])
        .inc();
}

/// Record an accepted report transition
pub fn record_report_transition(status: &str) {
    REPORT_TRANSITIONS_TOTAL.with_label_values(&[status]).inc();
}

/// Record a rejected report transition
pub fn record_transition_rejected(status: &str) {
    REPORT_TRANSITIONS_REJECTED_TOTAL
        .with_label_values(&[status])
        .inc();
}

/// Record a removal that left its content behind
pub fn record_inconsistent_removal() {
    INCONSISTENT_REMOVALS_TOTAL.inc();
}

/// Record a role lookup fallback (`error`, `missing`, `unrecognized`)
pub fn record_role_lookup_failure(cause: &str) {
    ROLE_LOOKUP_FAILURES_TOTAL.with_label_values(&[cause]).inc();
}

/// Record a denied capability check
pub fn record_authorization_denied(capability: &str) {
    AUTHORIZATION_DENIED_TOTAL
        .with_label_values(&[capability])
        .inc();
}

/// Record an account creation
pub fn record_account_creation() {
    ACCOUNT_CREATIONS_TOTAL.inc();
}

/// Record an error by kind
pub fn record_error(kind: &str) {
    ERRORS_TOTAL.with_label_values(&[kind]).inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_appear_in_output() {
        record_inconsistent_removal();
        record_role_lookup_failure("missing");

        let output = render_metrics();
        assert!(output.contains("agora_inconsistent_removals_total"));
        assert!(output.contains("agora_role_lookup_failures_total"));
    }
}
