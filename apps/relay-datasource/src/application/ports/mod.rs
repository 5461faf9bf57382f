//! Port Interfaces
//!
//! Defines the interfaces (ports) for external systems following
//! the Hexagonal Architecture pattern. These are the contracts that
//! infrastructure adapters must implement.
//!
//! ## Driven Ports (Outbound)
//!
//! - `UpstreamSource` / `UpstreamConnection`: dial and read the upstream feed
//! - `FrameSink`: push frames to one connected client
//! - `EventSink`: record relay lifecycle events (logs, metrics)

mod downstream;
mod events;
mod upstream;

pub use downstream::{FrameSink, SendError};
pub use events::{EventSink, NoopEventSink, RelayEvent};
pub use upstream::{UpstreamConnection, UpstreamSource};

#[cfg(test)]
pub use events::MockEventSink;
