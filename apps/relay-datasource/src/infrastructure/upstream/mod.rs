//! Upstream WebSocket Adapter
//!
//! Implements the `UpstreamSource` port over `tokio-tungstenite`.
//!
//! # Handshake
//!
//! The bearer token travels in the `Authorization` header, marked sensitive.
//! An optional subprotocol and origin are sent when configured.
//!
//! # Frames
//!
//! Text and binary messages become payloads. Pings are skipped (the pong
//! reply is queued by tungstenite and flushed on the next read). A close
//! frame or the end of the TCP stream ends the connection cleanly. Messages
//! over the configured size limit fail with `FrameTooLarge`.

mod connector;

pub use connector::{WebSocketConnection, WebSocketConnector};
