//! Prometheus Metrics Module
//!
//! Exposes relay metrics in Prometheus format.
//!
//! # Metrics Categories
//!
//! - **Payloads**: received from upstream, delivered and dropped per subscriber
//! - **Upstream**: connection state, errors and reconnects
//! - **Sessions**: active sessions and send failures
//!
//! # Integration
//!
//! Metrics are exposed at `/metrics` on the health server port.

use std::sync::OnceLock;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

// =============================================================================
// Global Metrics Handle
// =============================================================================

static PROMETHEUS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the Prometheus recorder. Later calls return the existing handle.
///
/// # Errors
///
/// Returns the exporter error if another global recorder is already
/// installed.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    if let Some(handle) = PROMETHEUS_HANDLE.get() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new().install_recorder()?;
    register_metrics();
    Ok(PROMETHEUS_HANDLE.get_or_init(|| handle).clone())
}

/// Get the Prometheus handle for rendering metrics.
///
/// Returns `None` if metrics have not been initialized.
#[must_use]
pub fn get_metrics_handle() -> Option<PrometheusHandle> {
    PROMETHEUS_HANDLE.get().cloned()
}

// =============================================================================
// Metric Registration
// =============================================================================

fn register_metrics() {
    describe_counter!(
        "relay_payloads_received_total",
        "Total payloads received from the upstream feed"
    );
    describe_counter!(
        "relay_payloads_delivered_total",
        "Total payload deliveries queued for subscribers"
    );
    describe_counter!(
        "relay_payloads_dropped_total",
        "Total payloads dropped because a subscriber queue was full"
    );
    describe_histogram!("relay_payload_bytes", "Size of upstream payloads in bytes");

    describe_gauge!(
        "relay_upstream_connected",
        "Whether the upstream connection is established (0 or 1)"
    );
    describe_counter!(
        "relay_upstream_errors_total",
        "Total upstream failures by kind"
    );
    describe_counter!(
        "relay_upstream_terminations_total",
        "Total ended upstream connections by reason"
    );
    describe_counter!(
        "relay_reconnects_total",
        "Total upstream reconnection attempts"
    );

    describe_gauge!("relay_active_sessions", "Number of registered subscribers");
    describe_counter!(
        "relay_send_failures_total",
        "Total frames that failed to reach a client"
    );
    describe_counter!(
        "relay_permission_denied_total",
        "Total refused subscribe and publish requests"
    );
}

// =============================================================================
// Metric Recording Functions
// =============================================================================

/// Record one upstream payload and its fan-out.
#[allow(clippy::cast_precision_loss)]
pub fn record_payload(bytes: usize, delivered: usize, dropped: usize) {
    counter!("relay_payloads_received_total").increment(1);
    counter!("relay_payloads_delivered_total").increment(delivered as u64);
    if dropped > 0 {
        counter!("relay_payloads_dropped_total").increment(dropped as u64);
    }
    histogram!("relay_payload_bytes").record(bytes as f64);
}

/// Set the upstream connection gauge.
pub fn set_upstream_connected(connected: bool) {
    gauge!("relay_upstream_connected").set(if connected { 1.0 } else { 0.0 });
}

/// Record an upstream failure.
pub fn record_upstream_error(kind: &'static str) {
    counter!("relay_upstream_errors_total", "kind" => kind).increment(1);
}

/// Record an ended upstream connection.
pub fn record_upstream_termination(reason: &'static str) {
    counter!("relay_upstream_terminations_total", "reason" => reason).increment(1);
}

/// Record a reconnection attempt.
pub fn record_reconnect() {
    counter!("relay_reconnects_total").increment(1);
}

/// Adjust the active session gauge.
pub fn adjust_active_sessions(delta: f64) {
    gauge!("relay_active_sessions").increment(delta);
}

/// Record a failed frame send.
pub fn record_send_failure() {
    counter!("relay_send_failures_total").increment(1);
}

/// Record a refused subscribe or publish.
pub fn record_permission_denied(operation: &'static str) {
    counter!("relay_permission_denied_total", "operation" => operation).increment(1);
}

// =============================================================================
// Tests
// =============================================================================
