//! Application Services
//!
//! Services that orchestrate domain logic and coordinate between ports.
//!
//! - `RelayChannel`: fans upstream payloads out to subscribers
//! - `StreamSession`: forwards one subscriber's payloads to its client
//! - `UpstreamSupervisor`: owns the upstream read loop and reconnects
//! - `RelayDatasource`: the host-facing query / health / stream calls

mod datasource;
mod reconnect;
mod relay;
mod session;
mod status;
mod supervisor;

pub use datasource::{
    CheckHealthResult, HEALTH_MESSAGE, HealthCheckStatus, RelayDatasource, StreamResponse,
    StreamStatus,
};
pub use reconnect::{DEFAULT_INITIAL_DELAY, DEFAULT_MAX_DELAY, ReconnectConfig, ReconnectPolicy};
pub use relay::{DEFAULT_QUEUE_DEPTH, DeliveryReport, RelayChannel, RelayError, Subscription};
pub use session::{SessionSummary, StreamSession};
pub use status::{StatusSnapshot, UpstreamStatus};
pub use supervisor::{SupervisorError, UpstreamSupervisor};
