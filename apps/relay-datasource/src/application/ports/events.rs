//! Relay event port.

use std::time::Duration;

use crate::domain::streaming::Termination;
use crate::domain::subscription::{SessionEnd, SubscriptionId};

/// Something observable that happened inside the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// A dial attempt is starting.
    UpstreamConnecting {
        /// Endpoint description (no credential).
        endpoint: String,
    },
    /// The upstream connection is established.
    UpstreamConnected {
        /// Endpoint description (no credential).
        endpoint: String,
    },
    /// A dial attempt failed.
    UpstreamConnectFailed {
        /// Error kind label.
        kind: &'static str,
        /// Error message.
        error: String,
    },
    /// An established connection ended. Emitted once per connection.
    UpstreamTerminated {
        /// How it ended.
        termination: Termination,
        /// Subscribers whose sessions were terminated.
        subscribers: usize,
    },
    /// The supervisor will dial again after a delay.
    ReconnectScheduled {
        /// Attempt number, starting at 1.
        attempt: u32,
        /// Backoff delay.
        delay: Duration,
    },
    /// A payload was read and handed to the relay channel.
    PayloadRelayed {
        /// Payload size.
        bytes: usize,
        /// Subscribers that accepted it.
        delivered: usize,
        /// Subscribers whose slot was full.
        dropped: usize,
    },
    /// A subscriber was added to the relay channel.
    SubscriberRegistered {
        /// Subscription identifier.
        id: SubscriptionId,
    },
    /// A subscriber was removed from the relay channel.
    SubscriberUnregistered {
        /// Subscription identifier.
        id: SubscriptionId,
    },
    /// A subscribe or publish request was refused.
    PermissionDenied {
        /// Operation name.
        operation: &'static str,
        /// Requested path.
        path: String,
    },
    /// A frame could not be sent to a client.
    SessionSendFailed {
        /// Subscription identifier.
        id: SubscriptionId,
        /// Error message.
        error: String,
    },
    /// A session finished.
    SessionEnded {
        /// Subscription identifier.
        id: SubscriptionId,
        /// Why it ended.
        reason: SessionEnd,
        /// Frames sent over the session's lifetime.
        frames_sent: u64,
    },
}

/// Receives relay events.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync {
    /// Record one event. Must not block.
    fn record(&self, event: &RelayEvent);
}

/// Sink that discards every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: &RelayEvent) {}
}
