//! Upstream connection status shared between the supervisor and the health
//! server.

use std::sync::atomic::{AtomicU32, AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;

use crate::domain::streaming::UpstreamState;

/// Live status of the upstream connection.
#[derive(Debug, Default)]
pub struct UpstreamStatus {
    state: RwLock<UpstreamState>,
    last_connected_at: RwLock<Option<DateTime<Utc>>>,
    last_error: RwLock<Option<String>>,
    reconnect_attempts: AtomicU32,
    payloads_received: AtomicU64,
}

/// Point-in-time copy of `UpstreamStatus`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusSnapshot {
    /// Connection state name.
    pub state: &'static str,
    /// Whether payloads are flowing.
    pub connected: bool,
    /// When the connection was last established.
    pub last_connected_at: Option<DateTime<Utc>>,
    /// Most recent failure.
    pub last_error: Option<String>,
    /// Reconnect attempts since the last successful connection.
    pub reconnect_attempts: u32,
    /// Payloads read since startup.
    pub payloads_received: u64,
}

impl UpstreamStatus {
    /// Create a status in the `Disconnected` state.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the connection state. Entering `Connected` stamps the connect
    /// time and clears the attempt counter and last error.
    pub fn set_state(&self, state: UpstreamState) {
        *self.state.write() = state;
        if state.is_connected() {
            *self.last_connected_at.write() = Some(Utc::now());
            *self.last_error.write() = None;
            self.reconnect_attempts.store(0, Ordering::Relaxed);
        }
    }

    /// Record a failure and fall back to `Disconnected`.
    pub fn record_error(&self, message: impl Into<String>) {
        *self.state.write() = UpstreamState::Disconnected;
        *self.last_error.write() = Some(message.into());
    }

    /// Count a reconnect attempt.
    pub fn increment_reconnect_attempts(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    /// Count a received payload.
    pub fn increment_payloads(&self) {
        self.payloads_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> UpstreamState {
        *self.state.read()
    }

    /// Whether the upstream is connected.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    /// Copy the current values.
    #[must_use]
    pub fn snapshot(&self) -> StatusSnapshot {
        let state = self.state();
        StatusSnapshot {
            state: state.as_str(),
            connected: state.is_connected(),
            last_connected_at: *self.last_connected_at.read(),
            last_error: self.last_error.read().clone(),
            reconnect_attempts: self.reconnect_attempts.load(Ordering::Relaxed),
            payloads_received: self.payloads_received.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_disconnected() {
        let snapshot = UpstreamStatus::new().snapshot();
        assert_eq!(snapshot.state, "disconnected");
        assert!(!snapshot.connected);
        assert!(snapshot.last_connected_at.is_none());
        assert_eq!(snapshot.payloads_received, 0);
    }

    #[test]
    fn connecting_clears_previous_failure() {
        let status = UpstreamStatus::new();
        status.record_error("refused");
        status.increment_reconnect_attempts();
        status.increment_reconnect_attempts();

        let failed = status.snapshot();
        assert_eq!(failed.last_error.as_deref(), Some("refused"));
        assert_eq!(failed.reconnect_attempts, 2);

        status.set_state(UpstreamState::Connected);
        let connected = status.snapshot();
        assert!(connected.connected);
        assert!(connected.last_error.is_none());
        assert_eq!(connected.reconnect_attempts, 0);
        assert!(connected.last_connected_at.is_some());
    }

    #[test]
    fn counts_payloads() {
        let status = UpstreamStatus::new();
        status.increment_payloads();
        status.increment_payloads();
        assert_eq!(status.snapshot().payloads_received, 2);
    }
}
