//! Client websocket adapter for the `FrameSink` port.

use async_trait::async_trait;
use axum::extract::ws::{CloseFrame, Message, WebSocket, close_code};
use futures_util::SinkExt;
use futures_util::stream::SplitSink;

use crate::application::ports::{FrameSink, SendError};
use crate::domain::frame::DataFrame;
use crate::domain::subscription::SessionEnd;

/// Sends frames to a client as JSON text messages.
pub struct WebSocketFrameSink {
    sender: SplitSink<WebSocket, Message>,
}

impl WebSocketFrameSink {
    /// Wrap the sending half of a client socket.
    #[must_use]
    pub const fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self { sender }
    }

    /// Send a close frame matching how the session ended.
    ///
    /// A client that already went away is ignored.
    pub async fn close(mut self, reason: SessionEnd) {
        let frame = match reason {
            SessionEnd::RelayClosed => CloseFrame {
                code: close_code::NORMAL,
                reason: "stream ended".into(),
            },
            SessionEnd::Cancelled => CloseFrame {
                code: close_code::AWAY,
                reason: "session cancelled".into(),
            },
        };

        if let Err(e) = self.sender.send(Message::Close(Some(frame))).await {
            tracing::debug!(error = %e, "Client close frame not sent");
        }
    }
}

#[async_trait]
impl FrameSink for WebSocketFrameSink {
    async fn send_frame(&mut self, frame: &DataFrame) -> Result<(), SendError> {
        let text = serde_json::to_string(frame).map_err(|e| SendError::Failed(e.to_string()))?;
        self.sender
            .send(Message::Text(text.into()))
            .await
            .map_err(|_| SendError::Disconnected)
    }
}
