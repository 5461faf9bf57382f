//! Application Layer - Use cases and port definitions.
//!
//! This layer contains the relay services and the port interfaces that
//! define how they reach the upstream transport, the client transport and
//! the event sink.

/// Port interfaces for the upstream feed, client sinks and relay events.
pub mod ports;

/// Relay channel, sessions, supervision and the host-facing datasource.
pub mod services;
