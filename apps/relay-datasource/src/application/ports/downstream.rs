//! Client transport port.

use async_trait::async_trait;

use crate::domain::frame::DataFrame;

/// Failure to push a frame to a client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SendError {
    /// The client is gone. Ends the session.
    #[error("client disconnected")]
    Disconnected,

    /// The frame could not be sent this time. The session continues.
    #[error("send failed: {0}")]
    Failed(String),
}

/// Pushes frames to one connected client.
#[async_trait]
pub trait FrameSink: Send {
    /// Send one frame.
    ///
    /// # Errors
    ///
    /// Returns `SendError::Disconnected` when the client has gone away and
    /// `SendError::Failed` for any other failure.
    async fn send_frame(&mut self, frame: &DataFrame) -> Result<(), SendError>;
}

#[async_trait]
impl<'a, T: FrameSink + ?Sized> FrameSink for &'a mut T {
    async fn send_frame(&mut self, frame: &DataFrame) -> Result<(), SendError> {
        (**self).send_frame(frame).await
    }
}
