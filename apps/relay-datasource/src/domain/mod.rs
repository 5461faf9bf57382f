//! Domain Layer - Core relay types and business logic.
//!
//! This layer contains the payload, frame, query and subscription types
//! shared by the relay. Nothing here performs I/O.

/// Upstream payloads, endpoints, connection states and errors.
pub mod streaming;

/// Stream paths, subscription identifiers and the session state machine.
pub mod subscription;

/// Data frames returned to the dashboard host.
pub mod frame;

/// Ad-hoc query model and the static sample answer.
pub mod query;
