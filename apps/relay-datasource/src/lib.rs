#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::float_cmp,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::needless_pass_by_value,
        clippy::items_after_statements,
        clippy::panic
    )
)]

//! Relay Datasource - Single-Upstream Streaming Backend
//!
//! A dashboard datasource backend that answers ad-hoc queries and health
//! checks, and relays payloads from one upstream websocket feed to any number
//! of subscribed clients.
//!
//! # Layers (inside → outside)
//!
//! - **Domain**: Core types with no I/O
//!   - `streaming`: Endpoint, payload, upstream state and errors
//!   - `subscription`: Stream path, subscription ids, session state machine
//!   - `frame`: Data frames sent to the host
//!   - `query`: Query model and the static sample answer
//!
//! - **Application**: Use cases and port definitions
//!   - `ports`: Upstream source, frame sink and event sink interfaces
//!   - `services`: Relay channel, sessions, supervisor, datasource calls
//!
//! - **Infrastructure**: Adapters and external integrations
//!   - `upstream`: tokio-tungstenite connector
//!   - `http`: axum API and client websockets
//!   - `config`: Environment configuration
//!   - `health`: Health check HTTP endpoint
//!   - `metrics` / `telemetry`: Prometheus, tracing and OpenTelemetry
//!
//! # Data Flow
//!
//! ```text
//!                   ┌────────────┐      ┌─────────────┐
//! Upstream WS ────► │ Supervisor │ ───► │    Relay    │ ──► Session ──► Client 1
//!                   │ (read loop)│      │   Channel   │ ──► Session ──► Client 2
//!                   └────────────┘      └─────────────┘ ──► Session ──► Client N
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Module Declarations
// =============================================================================

/// Domain layer - Core relay types with no I/O.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Re-exports
// =============================================================================

// Domain types
pub use domain::frame::DataFrame;
pub use domain::streaming::{BearerToken, Payload, UpstreamEndpoint, UpstreamError, UpstreamState};
pub use domain::subscription::{SessionEnd, StreamPath, SubscriptionId};

// Ports and services
pub use application::ports::{
    EventSink, FrameSink, NoopEventSink, RelayEvent, SendError, UpstreamConnection, UpstreamSource,
};
pub use application::services::{
    DeliveryReport, ReconnectConfig, RelayChannel, RelayDatasource, RelayError, SessionSummary,
    StreamSession, Subscription, SupervisorError, UpstreamStatus, UpstreamSupervisor,
};

// Infrastructure config
pub use infrastructure::config::{ConfigError, RelayConfig};

// Adapters
pub use infrastructure::health::{HealthServer, HealthServerError, HealthServerState};
pub use infrastructure::http::{ApiServer, ApiServerError, ApiState};
pub use infrastructure::upstream::{WebSocketConnection, WebSocketConnector};

// Metrics
pub use infrastructure::metrics::init_metrics;

// Telemetry
pub use infrastructure::telemetry::{
    TelemetryConfig, TelemetryGuard, TracingEventSink, init as init_telemetry,
};
