//! Upstream Streaming Types
//!
//! Core domain types for the single upstream feed: the endpoint it is dialled
//! at, the payloads it produces, the connection state and the errors a
//! connection can report. These types are transport-agnostic.

mod endpoint;
mod error;
mod payload;

pub use endpoint::{BearerToken, UpstreamEndpoint};
pub use error::{BoxError, UpstreamError};
pub use payload::Payload;

/// Default maximum upstream frame size in bytes.
pub const DEFAULT_MAX_FRAME_BYTES: usize = 5096;

/// Lifecycle state of the upstream connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UpstreamState {
    /// No connection and none in progress.
    #[default]
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Connection established and being read.
    Connected,
    /// Close handshake in progress.
    Closing,
    /// Connection closed for good (supervisor stopped).
    Closed,
}

impl UpstreamState {
    /// Get the state name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Closing => "closing",
            Self::Closed => "closed",
        }
    }

    /// Check if payloads can currently flow.
    #[must_use]
    pub const fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// How an upstream connection ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The remote closed the connection cleanly.
    EndOfStream,
    /// The connection failed.
    ConnectionError(String),
}

impl Termination {
    /// Get a short label for logs and metrics.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::EndOfStream => "end_of_stream",
            Self::ConnectionError(_) => "connection_error",
        }
    }
}

impl std::fmt::Display for Termination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EndOfStream => f.write_str("end of stream"),
            Self::ConnectionError(reason) => write!(f, "connection error: {reason}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upstream_state_names() {
        assert_eq!(UpstreamState::Disconnected.as_str(), "disconnected");
        assert_eq!(UpstreamState::Connecting.as_str(), "connecting");
        assert_eq!(UpstreamState::Connected.as_str(), "connected");
        assert_eq!(UpstreamState::Closing.as_str(), "closing");
        assert_eq!(UpstreamState::Closed.as_str(), "closed");
    }

    #[test]
    fn only_connected_is_connected() {
        assert!(UpstreamState::Connected.is_connected());
        assert!(!UpstreamState::Connecting.is_connected());
        assert!(!UpstreamState::Closed.is_connected());
    }

    #[test]
    fn termination_display() {
        assert_eq!(Termination::EndOfStream.to_string(), "end of stream");
        assert_eq!(
            Termination::ConnectionError("reset".to_string()).to_string(),
            "connection error: reset"
        );
        assert_eq!(
            Termination::ConnectionError(String::new()).as_str(),
            "connection_error"
        );
    }
}
