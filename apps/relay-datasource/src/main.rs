//! Relay Datasource Binary
//!
//! Starts the datasource API, the health server and the upstream supervisor.
//!
//! # Usage
//!
//! ```bash
//! cargo run --bin relay-datasource
//! ```
//!
//! # Environment Variables
//!
//! ## Required
//! - `RELAY_UPSTREAM_URL`: Upstream websocket address (`ws://` or `wss://`)
//! - `RELAY_UPSTREAM_TOKEN`: Bearer token sent during the upstream handshake
//!
//! ## Optional
//! - `RELAY_UPSTREAM_ORIGIN`: Origin header for the upstream handshake
//! - `RELAY_UPSTREAM_SUBPROTOCOL`: Websocket subprotocol to request
//! - `RELAY_MAX_FRAME_BYTES`: Largest accepted upstream message (default: 5096)
//! - `RELAY_SUBSCRIBER_QUEUE_DEPTH`: Per-subscriber queue depth (default: 1)
//! - `RELAY_DATASOURCE_UID`: Datasource identifier (default: relay)
//! - `RELAY_API_PORT`: Datasource API port (default: 3000)
//! - `RELAY_HEALTH_PORT`: Health check HTTP port (default: 8082)
//! - `RELAY_RECONNECT_DELAY_INITIAL_MS`: First reconnect delay (default: 500)
//! - `RELAY_RECONNECT_DELAY_MAX_SECS`: Reconnect delay cap (default: 30)
//! - `RELAY_RECONNECT_DELAY_MULTIPLIER`: Backoff multiplier (default: 2.0)
//! - `RELAY_MAX_RECONNECT_ATTEMPTS`: 0 for unlimited (default: 0)
//! - `OTEL_ENABLED`: Enable OpenTelemetry span export (default: true)
//! - `OTEL_EXPORTER_OTLP_ENDPOINT`: OTLP endpoint (default: <http://localhost:4317>)
//! - `OTEL_SERVICE_NAME`: Service name (default: relay-datasource)
//! - `RUST_LOG`: Log filter

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use relay_datasource::infrastructure::telemetry;
use relay_datasource::{
    ApiServer, ApiState, EventSink, HealthServer, HealthServerState, RelayChannel, RelayConfig,
    RelayDatasource, TracingEventSink, UpstreamStatus, UpstreamSupervisor, WebSocketConnector,
    init_metrics,
};
use tokio::signal;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Graceful shutdown timeout.
const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(30);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    if rustls::crypto::ring::default_provider()
        .install_default()
        .is_err()
    {
        anyhow::bail!("failed to install rustls crypto provider");
    }

    load_dotenv();

    let _telemetry_guard = telemetry::init();

    tracing::info!("Starting relay datasource");

    let _metrics_handle = init_metrics().context("failed to install Prometheus recorder")?;

    let config = RelayConfig::from_env().context("invalid configuration")?;
    log_config(&config);

    let shutdown_token = CancellationToken::new();
    let events: Arc<dyn EventSink> = Arc::new(TracingEventSink::new());

    let relay = Arc::new(RelayChannel::new(
        config.relay.subscriber_queue_depth,
        Arc::clone(&events),
    ));
    let status = Arc::new(UpstreamStatus::new());

    let connector = WebSocketConnector::new(config.endpoint.clone())
        .with_max_frame_bytes(config.websocket.max_frame_bytes);
    let supervisor = UpstreamSupervisor::new(
        connector,
        Arc::clone(&relay),
        Arc::clone(&status),
        Arc::clone(&events),
        config.websocket.reconnect_config(),
    );

    let datasource = RelayDatasource::new(
        config.relay.datasource_uid.clone(),
        Arc::clone(&relay),
        Arc::clone(&events),
    );
    let api_server = ApiServer::new(
        config.server.api_port,
        ApiState::new(datasource, shutdown_token.clone()),
    );

    let health_state = Arc::new(HealthServerState::new(
        env!("CARGO_PKG_VERSION").to_string(),
        Arc::clone(&status),
        Arc::clone(&relay),
    ));
    let health_server = HealthServer::new(
        config.server.health_port,
        health_state,
        shutdown_token.clone(),
    );

    let mut tasks = JoinSet::new();

    let supervisor_shutdown = shutdown_token.clone();
    tasks.spawn(async move {
        if let Err(e) = supervisor.run(supervisor_shutdown).await {
            tracing::error!(error = %e, "Upstream supervisor stopped");
        }
    });

    tasks.spawn(async move {
        if let Err(e) = health_server.run().await {
            tracing::error!(error = %e, "Health server error");
        }
    });

    tasks.spawn(async move {
        if let Err(e) = api_server.run().await {
            tracing::error!(error = %e, "Datasource API error");
        }
    });

    tracing::info!("Relay datasource ready");

    await_shutdown(shutdown_token).await;

    if tokio::time::timeout(SHUTDOWN_TIMEOUT, async {
        while tasks.join_next().await.is_some() {}
    })
    .await
    .is_err()
    {
        tracing::warn!("Shutdown timed out, aborting remaining tasks");
        tasks.abort_all();
    }

    tracing::info!("Relay datasource stopped");
    Ok(())
}

/// Log the parsed configuration. The credential is never logged.
fn log_config(config: &RelayConfig) {
    let url = config.endpoint.url();
    tracing::info!(
        upstream = url.split_once('?').map_or(url, |(base, _)| base),
        subprotocol = config.endpoint.subprotocol(),
        datasource_uid = %config.relay.datasource_uid,
        api_port = config.server.api_port,
        health_port = config.server.health_port,
        "Configuration loaded"
    );
    tracing::debug!(
        max_frame_bytes = config.websocket.max_frame_bytes,
        subscriber_queue_depth = config.relay.subscriber_queue_depth,
        max_reconnect_attempts = config.websocket.max_reconnect_attempts,
        "Relay settings"
    );
}

/// Load .env file from current directory or any ancestor directory.
fn load_dotenv() {
    if dotenvy::dotenv().is_ok() {
        return;
    }

    if let Ok(cwd) = std::env::current_dir() {
        let mut dir = cwd.as_path();
        while let Some(parent) = dir.parent() {
            let env_path = parent.join(".env");
            if env_path.exists() {
                let _ = dotenvy::from_path(&env_path);
                return;
            }
            dir = parent;
        }
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT), then cancel everything.
async fn await_shutdown(shutdown_token: CancellationToken) {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Ctrl+C handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "SIGTERM handler unavailable");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {
            tracing::info!("Received Ctrl+C, initiating shutdown");
        }
        () = terminate => {
            tracing::info!("Received SIGTERM, initiating shutdown");
        }
    }

    shutdown_token.cancel();

    tracing::info!(
        timeout_secs = SHUTDOWN_TIMEOUT.as_secs(),
        "Graceful shutdown started"
    );
}
