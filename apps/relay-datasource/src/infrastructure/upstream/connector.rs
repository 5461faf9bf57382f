//! WebSocket connector and connection.

use async_trait::async_trait;
use futures_util::StreamExt;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::error::CapacityError;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::HeaderValue;
use tokio_tungstenite::tungstenite::http::header::{AUTHORIZATION, ORIGIN, SEC_WEBSOCKET_PROTOCOL};
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use crate::application::ports::{UpstreamConnection, UpstreamSource};
use crate::domain::streaming::{DEFAULT_MAX_FRAME_BYTES, Payload, UpstreamEndpoint, UpstreamError};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Dials the configured upstream endpoint.
#[derive(Debug, Clone)]
pub struct WebSocketConnector {
    endpoint: UpstreamEndpoint,
    max_frame_bytes: usize,
}

impl WebSocketConnector {
    /// Create a connector with the default frame size limit.
    #[must_use]
    pub const fn new(endpoint: UpstreamEndpoint) -> Self {
        Self {
            endpoint,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }

    /// Override the frame size limit.
    #[must_use]
    pub fn with_max_frame_bytes(mut self, max_frame_bytes: usize) -> Self {
        self.max_frame_bytes = max_frame_bytes;
        self
    }

    /// Dial the endpoint once.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Configuration` if the handshake request cannot
    /// be built, and `UpstreamError::Connection` if the dial or handshake
    /// fails.
    pub async fn start(&self) -> Result<WebSocketConnection, UpstreamError> {
        let request = self.request()?;
        let config = WebSocketConfig::default()
            .max_message_size(Some(self.max_frame_bytes))
            .max_frame_size(Some(self.max_frame_bytes));

        let (stream, response) =
            tokio_tungstenite::connect_async_with_config(request, Some(config), false)
                .await
                .map_err(UpstreamError::connection)?;

        tracing::info!(
            endpoint = %self.describe(),
            status = %response.status(),
            "Upstream connected"
        );

        Ok(WebSocketConnection {
            stream: Some(stream),
            max_frame_bytes: self.max_frame_bytes,
        })
    }

    fn request(&self) -> Result<Request, UpstreamError> {
        let mut request = self
            .endpoint
            .url()
            .into_client_request()
            .map_err(|e| UpstreamError::Configuration(format!("invalid upstream url: {e}")))?;

        let mut authorization = HeaderValue::from_str(&self.endpoint.token().authorization())
            .map_err(|_| {
                UpstreamError::Configuration("bearer token is not a valid header value".to_string())
            })?;
        authorization.set_sensitive(true);

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, authorization);

        if let Some(subprotocol) = self.endpoint.subprotocol() {
            let value = HeaderValue::from_str(subprotocol).map_err(|_| {
                UpstreamError::Configuration(format!("invalid subprotocol '{subprotocol}'"))
            })?;
            headers.insert(SEC_WEBSOCKET_PROTOCOL, value);
        }

        if let Some(origin) = self.endpoint.origin() {
            let value = HeaderValue::from_str(origin)
                .map_err(|_| UpstreamError::Configuration(format!("invalid origin '{origin}'")))?;
            headers.insert(ORIGIN, value);
        }

        Ok(request)
    }
}

#[async_trait]
impl UpstreamSource for WebSocketConnector {
    async fn open(&self) -> Result<Box<dyn UpstreamConnection>, UpstreamError> {
        Ok(Box::new(self.start().await?))
    }

    fn describe(&self) -> String {
        let url = self.endpoint.url();
        url.split_once('?').map_or(url, |(base, _)| base).to_string()
    }
}

/// A live upstream websocket.
///
/// Dropping the connection drops the socket.
pub struct WebSocketConnection {
    stream: Option<WsStream>,
    max_frame_bytes: usize,
}

impl WebSocketConnection {
    /// Wait for the next data message.
    ///
    /// Returns `Ok(None)` when the remote closes the stream or after `close`.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::FrameTooLarge` for oversized messages and
    /// `UpstreamError::Connection` for any other transport failure.
    pub async fn next_payload(&mut self) -> Result<Option<Payload>, UpstreamError> {
        let Some(stream) = self.stream.as_mut() else {
            return Ok(None);
        };

        loop {
            let message = match stream.next().await {
                None | Some(Err(WsError::ConnectionClosed | WsError::AlreadyClosed)) => {
                    return Ok(None);
                }
                Some(Err(WsError::Capacity(CapacityError::MessageTooLong { size, .. }))) => {
                    return Err(UpstreamError::FrameTooLarge {
                        size,
                        max: self.max_frame_bytes,
                    });
                }
                Some(Err(e)) => return Err(UpstreamError::connection(e)),
                Some(Ok(message)) => message,
            };

            match message {
                Message::Text(_) | Message::Binary(_) => {
                    let data = message.into_data();
                    if data.len() > self.max_frame_bytes {
                        return Err(UpstreamError::FrameTooLarge {
                            size: data.len(),
                            max: self.max_frame_bytes,
                        });
                    }
                    return Ok(Some(Payload::new(data)));
                }
                Message::Close(frame) => {
                    tracing::debug!(?frame, "Upstream sent close frame");
                    return Ok(None);
                }
                Message::Ping(_) | Message::Pong(_) | Message::Frame(_) => {}
            }
        }
    }

    /// Send a close frame and release the socket.
    pub async fn close(&mut self) {
        if let Some(mut stream) = self.stream.take() {
            if let Err(e) = stream.close(None).await {
                tracing::debug!(error = %e, "Upstream close handshake failed");
            }
        }
    }

    /// Whether the socket is still held.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.stream.is_some()
    }
}

#[async_trait]
impl UpstreamConnection for WebSocketConnection {
    async fn next_payload(&mut self) -> Result<Option<Payload>, UpstreamError> {
        Self::next_payload(self).await
    }

    async fn close(&mut self) {
        Self::close(self).await;
    }
}

impl std::fmt::Debug for WebSocketConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketConnection")
            .field("open", &self.is_open())
            .field("max_frame_bytes", &self.max_frame_bytes)
            .finish()
    }
}
