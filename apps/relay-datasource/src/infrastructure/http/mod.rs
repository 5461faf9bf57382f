//! Datasource HTTP API
//!
//! The calls the dashboard host makes, served by axum.
//!
//! # Endpoints
//!
//! - `POST /api/query` - answer a batch of queries
//! - `GET /api/health` - datasource health check
//! - `POST /api/streams/{path}/subscribe` - subscribe permission check
//! - `POST /api/streams/{path}/publish` - publish permission check (always denied)
//! - `GET /api/streams/{path}` - websocket upgrade that runs one stream session

mod server;
mod ws;

pub use server::{ApiServer, ApiServerError, ApiState, router};
pub use ws::WebSocketFrameSink;
