//! Subscription Types
//!
//! Domain types for client subscriptions to the relay channel.
//!
//! # Design
//!
//! The relay exposes exactly one stream path. Clients address it through a
//! channel of the form `ds/<datasource uid>/stream`; only the trailing path
//! segment is checked when they subscribe. Each accepted subscription is
//! served by a session that moves through a small state machine:
//!
//! ```text
//!            payload            sent / send failed
//! Waiting ───────────► Emitting ──────────────────► Waiting
//!    │                    │
//!    └──── cancelled / relay closed ──► Terminated (absorbing)
//! ```

use std::fmt;

// =============================================================================
// Stream Path
// =============================================================================

/// The only path clients may subscribe to.
pub const STREAM_PATH: &str = "stream";

/// Live channel scope for datasource-owned channels.
pub const DATASOURCE_SCOPE: &str = "ds";

/// A validated stream path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StreamPath {
    /// The relay stream.
    Stream,
}

impl StreamPath {
    /// Parse a requested path. Returns `None` for anything but `stream`.
    #[must_use]
    pub fn parse(path: &str) -> Option<Self> {
        (path == STREAM_PATH).then_some(Self::Stream)
    }

    /// Get the path literal.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Stream => STREAM_PATH,
        }
    }
}

/// Fully qualified channel a client subscribes to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelAddress {
    namespace: String,
    path: StreamPath,
}

impl ChannelAddress {
    /// Channel for the relay stream of the given datasource.
    #[must_use]
    pub fn for_datasource(uid: impl Into<String>) -> Self {
        Self {
            namespace: uid.into(),
            path: StreamPath::Stream,
        }
    }

    /// Datasource namespace.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Stream path.
    #[must_use]
    pub const fn path(&self) -> StreamPath {
        self.path
    }
}

impl fmt::Display for ChannelAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{DATASOURCE_SCOPE}/{}/{}",
            self.namespace,
            self.path.as_str()
        )
    }
}

// =============================================================================
// Subscription Identity
// =============================================================================

/// Unique identifier for a subscription within one relay channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl SubscriptionId {
    /// Wrap a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

// =============================================================================
// Session State Machine
// =============================================================================

/// State of a streaming session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the next payload or a cancellation.
    #[default]
    Waiting,
    /// Sending a payload to the client.
    Emitting,
    /// Finished. No further transitions.
    Terminated,
}

/// Inputs driving the session state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionInput {
    /// A payload arrived from the relay.
    PayloadArrived,
    /// The payload was sent to the client.
    Sent,
    /// Sending failed without the client going away.
    SendFailed,
    /// Host or client cancelled the session.
    Cancelled,
    /// The relay dropped the subscription (upstream ended).
    RelayClosed,
}

impl SessionState {
    /// Apply an input and return the next state.
    #[must_use]
    pub const fn next(self, input: SessionInput) -> Self {
        match (self, input) {
            (Self::Terminated, _) | (_, SessionInput::Cancelled | SessionInput::RelayClosed) => {
                Self::Terminated
            }
            (Self::Waiting, SessionInput::PayloadArrived) => Self::Emitting,
            (Self::Emitting, SessionInput::Sent | SessionInput::SendFailed) => Self::Waiting,
            (state, _) => state,
        }
    }

    /// Whether the session has finished.
    #[must_use]
    pub const fn is_terminated(self) -> bool {
        matches!(self, Self::Terminated)
    }
}

/// Why a session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// Client disconnect, host shutdown or timeout.
    Cancelled,
    /// The relay terminated the subscription because the upstream ended.
    RelayClosed,
}

impl SessionEnd {
    /// Short label for logs and metrics.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::RelayClosed => "relay_closed",
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stream_path_parses() {
        assert_eq!(StreamPath::parse("stream"), Some(StreamPath::Stream));
        assert_eq!(StreamPath::parse("Stream"), None);
        assert_eq!(StreamPath::parse("stream/"), None);
        assert_eq!(StreamPath::parse(""), None);
    }

    #[test]
    fn channel_address_format() {
        let channel = ChannelAddress::for_datasource("abc123");
        assert_eq!(channel.to_string(), "ds/abc123/stream");
        assert_eq!(channel.namespace(), "abc123");
        assert_eq!(channel.path(), StreamPath::Stream);
    }

    #[test]
    fn subscription_id_display() {
        assert_eq!(SubscriptionId::new(7).to_string(), "sub-7");
        assert_eq!(SubscriptionId::new(7).get(), 7);
    }

    #[test]
    fn session_happy_path() {
        let state = SessionState::default();
        assert_eq!(state, SessionState::Waiting);

        let state = state.next(SessionInput::PayloadArrived);
        assert_eq!(state, SessionState::Emitting);

        let state = state.next(SessionInput::Sent);
        assert_eq!(state, SessionState::Waiting);
    }

    #[test]
    fn send_failure_returns_to_waiting() {
        let state = SessionState::Emitting.next(SessionInput::SendFailed);
        assert_eq!(state, SessionState::Waiting);
    }

    #[test]
    fn cancellation_terminates_from_any_state() {
        for state in [SessionState::Waiting, SessionState::Emitting] {
            assert!(state.next(SessionInput::Cancelled).is_terminated());
            assert!(state.next(SessionInput::RelayClosed).is_terminated());
        }
    }

    #[test]
    fn terminated_is_absorbing() {
        let state = SessionState::Terminated;
        assert_eq!(
            state.next(SessionInput::PayloadArrived),
            SessionState::Terminated
        );
        assert_eq!(state.next(SessionInput::Sent), SessionState::Terminated);
    }

    #[test]
    fn unexpected_inputs_are_ignored() {
        assert_eq!(
            SessionState::Waiting.next(SessionInput::Sent),
            SessionState::Waiting
        );
        assert_eq!(
            SessionState::Emitting.next(SessionInput::PayloadArrived),
            SessionState::Emitting
        );
    }
}
