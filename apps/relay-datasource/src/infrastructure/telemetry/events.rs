//! `EventSink` adapter backed by `tracing` and the Prometheus metrics.

use crate::application::ports::{EventSink, RelayEvent};
use crate::infrastructure::metrics;

/// Logs relay events and updates metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl TracingEventSink {
    /// Create the sink.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl EventSink for TracingEventSink {
    fn record(&self, event: &RelayEvent) {
        match event {
            RelayEvent::UpstreamConnecting { endpoint } => {
                tracing::info!(%endpoint, "Connecting to upstream");
            }
            RelayEvent::UpstreamConnected { endpoint } => {
                metrics::set_upstream_connected(true);
                tracing::info!(%endpoint, "Upstream connection established");
            }
            RelayEvent::UpstreamConnectFailed { kind, error } => {
                metrics::record_upstream_error(*kind);
                tracing::warn!(kind, %error, "Upstream connection failed");
            }
            RelayEvent::UpstreamTerminated {
                termination,
                subscribers,
            } => {
                metrics::set_upstream_connected(false);
                metrics::record_upstream_termination(termination.as_str());
                tracing::warn!(
                    reason = %termination,
                    subscribers,
                    "Upstream connection ended, subscribers terminated"
                );
            }
            RelayEvent::ReconnectScheduled { attempt, delay } => {
                metrics::record_reconnect();
                tracing::info!(
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "Reconnecting to upstream"
                );
            }
            RelayEvent::PayloadRelayed {
                bytes,
                delivered,
                dropped,
            } => {
                metrics::record_payload(*bytes, *delivered, *dropped);
                if *dropped > 0 {
                    tracing::debug!(bytes, delivered, dropped, "Payload dropped for slow subscribers");
                } else {
                    tracing::trace!(bytes, delivered, "Payload relayed");
                }
            }
            RelayEvent::SubscriberRegistered { id } => {
                metrics::adjust_active_sessions(1.0);
                tracing::info!(subscription = %id, "Subscriber registered");
            }
            RelayEvent::SubscriberUnregistered { id } => {
                metrics::adjust_active_sessions(-1.0);
                tracing::info!(subscription = %id, "Subscriber unregistered");
            }
            RelayEvent::PermissionDenied { operation, path } => {
                metrics::record_permission_denied(*operation);
                tracing::warn!(operation, %path, "Permission denied");
            }
            RelayEvent::SessionSendFailed { id, error } => {
                metrics::record_send_failure();
                tracing::warn!(subscription = %id, %error, "Failed to send frame");
            }
            RelayEvent::SessionEnded {
                id,
                reason,
                frames_sent,
            } => {
                tracing::info!(
                    subscription = %id,
                    reason = reason.as_str(),
                    frames_sent,
                    "Session ended"
                );
            }
        }
    }
}
