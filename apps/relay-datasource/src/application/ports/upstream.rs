//! Upstream transport port.

use async_trait::async_trait;

use crate::domain::streaming::{Payload, UpstreamError};

/// Dials the configured upstream endpoint.
///
/// Each call to `open` performs exactly one dial attempt; retrying is the
/// caller's business.
#[async_trait]
pub trait UpstreamSource: Send + Sync {
    /// Open a new connection.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Configuration` if the endpoint cannot be used
    /// at all, or `UpstreamError::Connection` if the dial fails.
    async fn open(&self) -> Result<Box<dyn UpstreamConnection>, UpstreamError>;

    /// Endpoint description safe to log (no credential).
    fn describe(&self) -> String;
}

/// A live upstream connection.
///
/// Dropping the connection releases the underlying socket.
#[async_trait]
pub trait UpstreamConnection: Send {
    /// Wait for the next payload.
    ///
    /// Returns `Ok(None)` once the remote has closed the stream.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Connection` on transport failure and
    /// `UpstreamError::FrameTooLarge` for oversized frames.
    async fn next_payload(&mut self) -> Result<Option<Payload>, UpstreamError>;

    /// Close the connection. Safe to call more than once.
    async fn close(&mut self);
}
