//! Infrastructure Layer - Adapters and external integrations.
//!
//! This layer contains the concrete implementations of the port interfaces
//! defined in the application layer.

/// Upstream websocket connector.
pub mod upstream;

/// Datasource HTTP API and client websocket sessions.
pub mod http;

/// Configuration loading.
pub mod config;

/// Health check HTTP endpoint.
pub mod health;

/// Prometheus metrics instrumentation.
pub mod metrics;

/// Tracing, OpenTelemetry and the event sink adapter.
pub mod telemetry;
