//! Relay Datasource
//!
//! The calls the dashboard host makes: ad-hoc queries, health checks,
//! subscribe / publish permission checks and running a stream session.
//! None of them wait on the upstream connection.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use super::relay::{RelayChannel, RelayError};
use super::session::{SessionSummary, StreamSession};
use crate::application::ports::{EventSink, FrameSink, RelayEvent};
use crate::domain::query::{self, QueryDataRequest, QueryDataResponse};
use crate::domain::subscription::StreamPath;

/// Message returned by every health check.
pub const HEALTH_MESSAGE: &str = "Data source is working";

/// Health check outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthCheckStatus {
    /// Working.
    Ok,
    /// Not working.
    Error,
}

/// Health check response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckHealthResult {
    /// Outcome.
    pub status: HealthCheckStatus,
    /// Human-readable detail.
    pub message: String,
}

/// Outcome of a subscribe or publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StreamStatus {
    /// Allowed.
    Ok,
    /// Refused.
    PermissionDenied,
}

/// Response to a subscribe or publish request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct StreamResponse {
    /// Outcome.
    pub status: StreamStatus,
}

impl StreamResponse {
    const fn ok() -> Self {
        Self {
            status: StreamStatus::Ok,
        }
    }

    const fn denied() -> Self {
        Self {
            status: StreamStatus::PermissionDenied,
        }
    }
}

/// Host-facing datasource backed by the relay channel.
#[derive(Clone)]
pub struct RelayDatasource {
    uid: Arc<str>,
    relay: Arc<RelayChannel>,
    events: Arc<dyn EventSink>,
}

impl RelayDatasource {
    /// Create a datasource instance.
    #[must_use]
    pub fn new(uid: impl Into<Arc<str>>, relay: Arc<RelayChannel>, events: Arc<dyn EventSink>) -> Self {
        Self {
            uid: uid.into(),
            relay,
            events,
        }
    }

    /// Datasource identifier used in channel addresses.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Relay channel sessions register with.
    #[must_use]
    pub fn relay(&self) -> &Arc<RelayChannel> {
        &self.relay
    }

    /// Answer a batch of queries.
    #[must_use]
    pub fn query_data(&self, request: &QueryDataRequest) -> QueryDataResponse {
        query::answer_all(request, &self.uid)
    }

    /// Report whether the datasource is usable. Always OK.
    #[must_use]
    pub fn check_health(&self) -> CheckHealthResult {
        CheckHealthResult {
            status: HealthCheckStatus::Ok,
            message: HEALTH_MESSAGE.to_string(),
        }
    }

    /// Decide whether a client may subscribe to `path`.
    #[must_use]
    pub fn subscribe_stream(&self, path: &str) -> StreamResponse {
        if StreamPath::parse(path).is_some() {
            StreamResponse::ok()
        } else {
            self.events.record(&RelayEvent::PermissionDenied {
                operation: "subscribe",
                path: path.to_string(),
            });
            StreamResponse::denied()
        }
    }

    /// Clients may never publish.
    #[must_use]
    pub fn publish_stream(&self, path: &str) -> StreamResponse {
        self.events.record(&RelayEvent::PermissionDenied {
            operation: "publish",
            path: path.to_string(),
        });
        StreamResponse::denied()
    }

    /// Register on `path` and forward payloads to `sink` until cancelled or
    /// the relay terminates the subscription.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::PermissionDenied` for any path other than
    /// `stream`.
    pub async fn run_stream<S: FrameSink>(
        &self,
        path: &str,
        sink: S,
        cancel: CancellationToken,
    ) -> Result<SessionSummary, RelayError> {
        let subscription = self.relay.register(path)?;
        let session = StreamSession::new(
            subscription,
            sink,
            Arc::clone(&self.relay),
            Arc::clone(&self.events),
        );
        Ok(session.run(cancel).await)
    }
}

impl std::fmt::Debug for RelayDatasource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayDatasource")
            .field("uid", &self.uid)
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use serde_json::json;
    use test_case::test_case;

    use super::*;
    use crate::application::ports::{NoopEventSink, SendError};
    use crate::domain::frame::DataFrame;
    use crate::domain::subscription::SessionEnd;

    struct NullSink;

    #[async_trait]
    impl FrameSink for NullSink {
        async fn send_frame(&mut self, _frame: &DataFrame) -> Result<(), SendError> {
            Ok(())
        }
    }

    fn datasource() -> RelayDatasource {
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        RelayDatasource::new("my-ds", relay, Arc::new(NoopEventSink))
    }

    #[test]
    fn health_is_constant() {
        let result = datasource().check_health();
        assert_eq!(result.status, HealthCheckStatus::Ok);
        assert_eq!(result.message, "Data source is working");
        assert_eq!(
            serde_json::to_value(result).unwrap(),
            json!({"status": "OK", "message": "Data source is working"})
        );
    }

    #[test_case("stream", StreamStatus::Ok ; "stream path")]
    #[test_case("other", StreamStatus::PermissionDenied ; "unknown path")]
    #[test_case("", StreamStatus::PermissionDenied ; "empty path")]
    fn subscribe_checks_path(path: &str, expected: StreamStatus) {
        let ds = datasource();
        assert_eq!(ds.subscribe_stream(path).status, expected);
        assert_eq!(ds.relay().subscriber_count(), 0);
    }

    #[test_case("stream" ; "stream path")]
    #[test_case("other" ; "unknown path")]
    fn publish_is_always_denied(path: &str) {
        assert_eq!(
            datasource().publish_stream(path).status,
            StreamStatus::PermissionDenied
        );
    }

    #[test]
    fn denied_serializes_screaming_case() {
        assert_eq!(
            serde_json::to_value(StreamResponse::denied()).unwrap(),
            json!({"status": "PERMISSION_DENIED"})
        );
    }

    #[test]
    fn query_uses_datasource_uid() {
        let request: QueryDataRequest = serde_json::from_value(json!({
            "queries": [{
                "refId": "A",
                "timeRange": {"from": "2024-05-01T00:00:00Z", "to": "2024-05-01T01:00:00Z"},
                "withStreaming": true
            }]
        }))
        .unwrap();

        let response = datasource().query_data(&request);
        let frame = &response.responses["A"].frames[0];
        assert_eq!(frame.meta.as_ref().unwrap().channel, "ds/my-ds/stream");
    }

    #[tokio::test]
    async fn run_stream_rejects_bad_path() {
        let ds = datasource();
        let err = ds
            .run_stream("nope", NullSink, CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, RelayError::PermissionDenied("nope".to_string()));
        assert_eq!(ds.relay().subscriber_count(), 0);
    }

    #[tokio::test]
    async fn run_stream_ends_on_cancel() {
        let ds = datasource();
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = ds.run_stream("stream", NullSink, cancel).await.unwrap();
        assert_eq!(summary.reason, SessionEnd::Cancelled);
        assert_eq!(ds.relay().subscriber_count(), 0);
    }
}
