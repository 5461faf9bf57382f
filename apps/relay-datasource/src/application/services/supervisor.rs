//! Upstream Supervisor
//!
//! Owns the single upstream connection and the read loop that feeds the
//! relay channel.
//!
//! # Lifecycle
//!
//! ```text
//! Connecting ──ok──► Connected ──EOF / error──► Closing ──► backoff ──► Connecting
//!     │                                                         │
//!     └── configuration error ──► Closed        attempts exhausted ──► Closed
//! ```
//!
//! Whenever an established connection ends, every current subscriber is
//! terminated and `UpstreamTerminated` is recorded once for that connection.
//! Cancellation stops the loop at any point and closes the connection.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::reconnect::{ReconnectConfig, ReconnectPolicy};
use super::relay::RelayChannel;
use super::status::UpstreamStatus;
use crate::application::ports::{EventSink, RelayEvent, UpstreamConnection, UpstreamSource};
use crate::domain::streaming::{Termination, UpstreamError, UpstreamState};

/// Reasons the supervisor stops on its own.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The endpoint can never be dialled.
    #[error("upstream misconfigured: {0}")]
    Configuration(#[source] UpstreamError),

    /// Reconnect attempts ran out.
    #[error("maximum reconnection attempts ({0}) exceeded")]
    MaxReconnectAttemptsExceeded(u32),
}

/// Runs the connect / read / reconnect loop.
pub struct UpstreamSupervisor<U> {
    source: U,
    relay: Arc<RelayChannel>,
    status: Arc<UpstreamStatus>,
    events: Arc<dyn EventSink>,
    reconnect: ReconnectConfig,
}

impl<U: UpstreamSource> UpstreamSupervisor<U> {
    /// Create a supervisor.
    #[must_use]
    pub fn new(
        source: U,
        relay: Arc<RelayChannel>,
        status: Arc<UpstreamStatus>,
        events: Arc<dyn EventSink>,
        reconnect: ReconnectConfig,
    ) -> Self {
        Self {
            source,
            relay,
            status,
            events,
            reconnect,
        }
    }

    /// Run until cancelled.
    ///
    /// # Errors
    ///
    /// Returns `SupervisorError::Configuration` if the endpoint is unusable
    /// and `SupervisorError::MaxReconnectAttemptsExceeded` once the
    /// reconnect budget is spent.
    pub async fn run(self, cancel: CancellationToken) -> Result<(), SupervisorError> {
        let result = self.supervise(&cancel).await;
        self.relay.terminate_all();
        self.status.set_state(UpstreamState::Closed);
        result
    }

    async fn supervise(&self, cancel: &CancellationToken) -> Result<(), SupervisorError> {
        let endpoint = self.source.describe();
        let mut policy = ReconnectPolicy::new(self.reconnect.clone());

        loop {
            self.status.set_state(UpstreamState::Connecting);
            self.events.record(&RelayEvent::UpstreamConnecting {
                endpoint: endpoint.clone(),
            });

            let opened = tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                opened = self.source.open() => opened,
            };

            match opened {
                Ok(mut connection) => {
                    self.status.set_state(UpstreamState::Connected);
                    self.events.record(&RelayEvent::UpstreamConnected {
                        endpoint: endpoint.clone(),
                    });
                    policy.reset();

                    let termination = self.pump(connection.as_mut(), cancel).await;

                    self.status.set_state(UpstreamState::Closing);
                    connection.close().await;
                    let subscribers = self.relay.terminate_all();

                    let Some(termination) = termination else {
                        return Ok(());
                    };
                    match &termination {
                        Termination::EndOfStream => {
                            self.status.set_state(UpstreamState::Disconnected);
                        }
                        Termination::ConnectionError(reason) => {
                            self.status.record_error(reason.clone());
                        }
                    }
                    self.events.record(&RelayEvent::UpstreamTerminated {
                        termination,
                        subscribers,
                    });
                }
                Err(e) if !e.is_retryable() => {
                    self.status.record_error(e.to_string());
                    self.events.record(&RelayEvent::UpstreamConnectFailed {
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                    return Err(SupervisorError::Configuration(e));
                }
                Err(e) => {
                    self.status.record_error(e.to_string());
                    self.events.record(&RelayEvent::UpstreamConnectFailed {
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                }
            }

            let Some(delay) = policy.next_delay() else {
                return Err(SupervisorError::MaxReconnectAttemptsExceeded(
                    policy.max_attempts(),
                ));
            };
            self.status.increment_reconnect_attempts();
            self.events.record(&RelayEvent::ReconnectScheduled {
                attempt: policy.attempt_count(),
                delay,
            });

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Ok(()),
                () = tokio::time::sleep(delay) => {}
            }
        }
    }

    /// Read payloads into the relay until the connection ends.
    ///
    /// Returns `None` when stopped by cancellation.
    async fn pump(
        &self,
        connection: &mut dyn UpstreamConnection,
        cancel: &CancellationToken,
    ) -> Option<Termination> {
        loop {
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => return None,
                next = connection.next_payload() => next,
            };

            match next {
                Ok(Some(payload)) => {
                    self.status.increment_payloads();
                    let report = self.relay.deliver(&payload);
                    self.events.record(&RelayEvent::PayloadRelayed {
                        bytes: payload.len(),
                        delivered: report.delivered,
                        dropped: report.dropped,
                    });
                }
                Ok(None) => return Some(Termination::EndOfStream),
                Err(e) => return Some(Termination::ConnectionError(e.to_string())),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;

    use super::*;
    use crate::application::ports::NoopEventSink;
    use crate::domain::streaming::Payload;

    /// One scripted read.
    enum Step {
        Payload(&'static str),
        Error,
        Hang,
    }

    struct ScriptedConnection {
        steps: VecDeque<Step>,
        closed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl UpstreamConnection for ScriptedConnection {
        async fn next_payload(&mut self) -> Result<Option<Payload>, UpstreamError> {
            match self.steps.pop_front() {
                Some(Step::Payload(body)) => Ok(Some(Payload::new(body))),
                Some(Step::Error) => Err(UpstreamError::connection("reset by peer")),
                Some(Step::Hang) => std::future::pending().await,
                None => Ok(None),
            }
        }

        async fn close(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Hands out scripted connections or dial errors in order.
    struct ScriptedSource {
        dials: Mutex<VecDeque<Result<Vec<Step>, UpstreamError>>>,
        closed: Arc<AtomicUsize>,
    }

    impl ScriptedSource {
        fn new(dials: Vec<Result<Vec<Step>, UpstreamError>>) -> Self {
            Self {
                dials: Mutex::new(dials.into()),
                closed: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl UpstreamSource for ScriptedSource {
        async fn open(&self) -> Result<Box<dyn UpstreamConnection>, UpstreamError> {
            let next = self.dials.lock().pop_front();
            match next {
                Some(Ok(steps)) => Ok(Box::new(ScriptedConnection {
                    steps: steps.into(),
                    closed: Arc::clone(&self.closed),
                })),
                Some(Err(e)) => Err(e),
                None => std::future::pending().await,
            }
        }

        fn describe(&self) -> String {
            "scripted".to_string()
        }
    }

    #[derive(Default)]
    struct RecordingSink(Mutex<Vec<RelayEvent>>);

    impl EventSink for RecordingSink {
        fn record(&self, event: &RelayEvent) {
            self.0.lock().push(event.clone());
        }
    }

    impl RecordingSink {
        fn count(&self, pred: impl Fn(&RelayEvent) -> bool) -> usize {
            self.0.lock().iter().filter(|e| pred(e)).count()
        }
    }

    fn fast_reconnect(max_attempts: u32) -> ReconnectConfig {
        ReconnectConfig {
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_factor: 0.0,
            max_attempts,
        }
    }

    #[tokio::test]
    async fn configuration_error_is_fatal() {
        let source = ScriptedSource::new(vec![Err(UpstreamError::Configuration(
            "bad url".to_string(),
        ))]);
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let status = Arc::new(UpstreamStatus::new());

        let result = UpstreamSupervisor::new(
            source,
            relay,
            Arc::clone(&status),
            Arc::new(NoopEventSink),
            fast_reconnect(0),
        )
        .run(CancellationToken::new())
        .await;

        assert!(matches!(result, Err(SupervisorError::Configuration(_))));
        assert_eq!(status.state(), UpstreamState::Closed);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let source = ScriptedSource::new(vec![
            Err(UpstreamError::connection("refused")),
            Err(UpstreamError::connection("refused")),
            Err(UpstreamError::connection("refused")),
        ]);
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let events = Arc::new(RecordingSink::default());

        let result = UpstreamSupervisor::new(
            source,
            relay,
            Arc::new(UpstreamStatus::new()),
            Arc::clone(&events) as Arc<dyn EventSink>,
            fast_reconnect(2),
        )
        .run(CancellationToken::new())
        .await;

        assert!(matches!(
            result,
            Err(SupervisorError::MaxReconnectAttemptsExceeded(2))
        ));
        assert_eq!(
            events.count(|e| matches!(e, RelayEvent::UpstreamConnectFailed { .. })),
            3
        );
        assert_eq!(
            events.count(|e| matches!(e, RelayEvent::ReconnectScheduled { .. })),
            2
        );
    }

    #[tokio::test]
    async fn end_of_stream_terminates_subscribers_once_and_reconnects() {
        let source = ScriptedSource::new(vec![
            Ok(vec![Step::Payload("A"), Step::Payload("B")]),
            Ok(vec![Step::Hang]),
        ]);
        let closed = Arc::clone(&source.closed);
        let relay = Arc::new(RelayChannel::new(4, Arc::new(NoopEventSink)));
        let mut sub = relay.register("stream").unwrap();
        let events = Arc::new(RecordingSink::default());
        let status = Arc::new(UpstreamStatus::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            UpstreamSupervisor::new(
                source,
                Arc::clone(&relay),
                Arc::clone(&status),
                Arc::clone(&events) as Arc<dyn EventSink>,
                fast_reconnect(0),
            )
            .run(cancel.clone()),
        );

        assert_eq!(sub.recv().await.unwrap().to_text_lossy(), "A");
        assert_eq!(sub.recv().await.unwrap().to_text_lossy(), "B");
        assert!(sub.recv().await.is_none());

        tokio::time::timeout(Duration::from_secs(1), async {
            while !status.is_connected() || status.snapshot().payloads_received < 2 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(
            events.count(|e| matches!(
                e,
                RelayEvent::UpstreamTerminated {
                    termination: Termination::EndOfStream,
                    subscribers: 1,
                }
            )),
            1
        );
        assert_eq!(
            events.count(|e| matches!(e, RelayEvent::UpstreamConnected { .. })),
            2
        );
        assert_eq!(closed.load(Ordering::SeqCst), 2);
        assert_eq!(status.state(), UpstreamState::Closed);
    }

    #[tokio::test]
    async fn read_error_is_reported_as_connection_error() {
        let source = ScriptedSource::new(vec![Ok(vec![Step::Payload("A"), Step::Error])]);
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let events = Arc::new(RecordingSink::default());
        let status = Arc::new(UpstreamStatus::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            UpstreamSupervisor::new(
                source,
                relay,
                Arc::clone(&status),
                Arc::clone(&events) as Arc<dyn EventSink>,
                fast_reconnect(0),
            )
            .run(cancel.clone()),
        );

        tokio::time::timeout(Duration::from_secs(1), async {
            while events.count(|e| matches!(e, RelayEvent::UpstreamTerminated { .. })) == 0 {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(
            events.count(|e| matches!(
                e,
                RelayEvent::UpstreamTerminated {
                    termination: Termination::ConnectionError(_),
                    ..
                }
            )),
            1
        );
        assert!(
            status
                .snapshot()
                .last_error
                .unwrap()
                .contains("reset by peer")
        );
    }

    #[tokio::test]
    async fn cancel_while_reading_closes_connection() {
        let source = ScriptedSource::new(vec![Ok(vec![Step::Hang])]);
        let closed = Arc::clone(&source.closed);
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let mut sub = relay.register("stream").unwrap();
        let status = Arc::new(UpstreamStatus::new());
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            UpstreamSupervisor::new(
                source,
                Arc::clone(&relay),
                Arc::clone(&status),
                Arc::new(NoopEventSink),
                fast_reconnect(0),
            )
            .run(cancel.clone()),
        );

        tokio::time::timeout(Duration::from_secs(1), async {
            while !status.is_connected() {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        })
        .await
        .unwrap();

        cancel.cancel();
        handle.await.unwrap().unwrap();

        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(sub.recv().await.is_none());
    }
}
