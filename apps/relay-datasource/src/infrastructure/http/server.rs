//! Datasource API server.

use std::net::SocketAddr;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::rejection::WebSocketUpgradeRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures_util::StreamExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use super::ws::WebSocketFrameSink;
use crate::application::services::{RelayDatasource, StreamResponse, StreamStatus};
use crate::domain::query::QueryDataRequest;

/// Shared state for API handlers.
#[derive(Debug, Clone)]
pub struct ApiState {
    datasource: RelayDatasource,
    shutdown: CancellationToken,
}

impl ApiState {
    /// Create handler state. Stream sessions are cancelled with `shutdown`.
    #[must_use]
    pub const fn new(datasource: RelayDatasource, shutdown: CancellationToken) -> Self {
        Self {
            datasource,
            shutdown,
        }
    }
}

/// Datasource API HTTP server.
pub struct ApiServer {
    port: u16,
    state: ApiState,
}

impl ApiServer {
    /// Create the server.
    #[must_use]
    pub const fn new(port: u16, state: ApiState) -> Self {
        Self { port, state }
    }

    /// Run until the shutdown token is cancelled.
    ///
    /// # Errors
    ///
    /// Returns `ApiServerError` if binding fails or the server stops with an
    /// error.
    pub async fn run(self) -> Result<(), ApiServerError> {
        let addr = SocketAddr::from(([0, 0, 0, 0], self.port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| ApiServerError::BindFailed(self.port, e.to_string()))?;

        tracing::info!(port = self.port, "Datasource API listening");

        let shutdown = self.state.shutdown.clone();
        axum::serve(listener, router(self.state))
            .with_graceful_shutdown(shutdown.cancelled_owned())
            .await
            .map_err(|e| ApiServerError::ServerFailed(e.to_string()))?;

        tracing::info!("Datasource API stopped");
        Ok(())
    }
}

/// Build the API router.
pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/api/query", post(query_handler))
        .route("/api/health", get(health_handler))
        .route("/api/streams/{path}", get(stream_handler))
        .route("/api/streams/{path}/subscribe", post(subscribe_handler))
        .route("/api/streams/{path}/publish", post(publish_handler))
        .with_state(state)
}

// =============================================================================
// HTTP Handlers
// =============================================================================

async fn query_handler(
    State(state): State<ApiState>,
    request: Result<Json<QueryDataRequest>, JsonRejection>,
) -> Response {
    match request {
        Ok(Json(request)) => Json(state.datasource.query_data(&request)).into_response(),
        Err(rejection) => (
            StatusCode::BAD_REQUEST,
            Json(serde_json::json!({ "error": rejection.body_text() })),
        )
            .into_response(),
    }
}

async fn health_handler(State(state): State<ApiState>) -> impl IntoResponse {
    Json(state.datasource.check_health())
}

async fn subscribe_handler(
    State(state): State<ApiState>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    stream_response(state.datasource.subscribe_stream(&path))
}

async fn publish_handler(
    State(state): State<ApiState>,
    Path(path): Path<String>,
) -> impl IntoResponse {
    stream_response(state.datasource.publish_stream(&path))
}

async fn stream_handler(
    State(state): State<ApiState>,
    Path(path): Path<String>,
    upgrade: Result<WebSocketUpgrade, WebSocketUpgradeRejection>,
) -> Response {
    let decision = state.datasource.subscribe_stream(&path);
    if decision.status != StreamStatus::Ok {
        return stream_response(decision).into_response();
    }

    match upgrade {
        Ok(upgrade) => upgrade
            .on_upgrade(move |socket| {
                let span = tracing::info_span!("client_stream", connection = %Uuid::new_v4());
                serve_stream(socket, state, path).instrument(span)
            })
            .into_response(),
        Err(rejection) => rejection.into_response(),
    }
}

fn stream_response(response: StreamResponse) -> (StatusCode, Json<StreamResponse>) {
    let code = match response.status {
        StreamStatus::Ok => StatusCode::OK,
        StreamStatus::PermissionDenied => StatusCode::FORBIDDEN,
    };
    (code, Json(response))
}

/// Run one stream session over an upgraded client socket.
///
/// The receive half is only watched for the client going away, which cancels
/// the session.
async fn serve_stream(socket: WebSocket, state: ApiState, path: String) {
    let (sender, mut receiver) = socket.split();
    let cancel = state.shutdown.child_token();

    let client_gone = cancel.clone();
    let watcher = tokio::spawn(async move {
        while let Some(message) = receiver.next().await {
            if matches!(message, Ok(Message::Close(_)) | Err(_)) {
                break;
            }
        }
        client_gone.cancel();
    });

    let mut sink = WebSocketFrameSink::new(sender);
    match state.datasource.run_stream(&path, &mut sink, cancel).await {
        Ok(summary) => {
            tracing::debug!(
                subscription = %summary.id,
                reason = summary.reason.as_str(),
                frames_sent = summary.frames_sent,
                "Client stream closed"
            );
            sink.close(summary.reason).await;
        }
        Err(e) => tracing::warn!(error = %e, "Client stream rejected"),
    }

    watcher.abort();
}

// =============================================================================
// Errors
// =============================================================================

/// API server errors.
#[derive(Debug, thiserror::Error)]
pub enum ApiServerError {
    /// Failed to bind to port.
    #[error("failed to bind to port {0}: {1}")]
    BindFailed(u16, String),

    /// Server error.
    #[error("server error: {0}")]
    ServerFailed(String),
}
