//! Stream Session
//!
//! One session per subscribed client. The session forwards relay payloads
//! to its `FrameSink` until the client goes away, the host cancels it, or the
//! relay terminates the subscription. Whatever the cause, the subscription is
//! unregistered exactly once when the session ends.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::relay::{RelayChannel, Subscription};
use crate::application::ports::{EventSink, FrameSink, RelayEvent, SendError};
use crate::domain::frame::DataFrame;
use crate::domain::subscription::{SessionEnd, SessionInput, SessionState, SubscriptionId};

/// Result of a finished session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionSummary {
    /// Subscription the session served.
    pub id: SubscriptionId,
    /// Why it ended.
    pub reason: SessionEnd,
    /// Frames successfully sent.
    pub frames_sent: u64,
    /// Frames that failed to send.
    pub send_failures: u64,
}

/// Per-client forwarding loop.
pub struct StreamSession<S> {
    subscription: Subscription,
    sink: S,
    relay: Arc<RelayChannel>,
    events: Arc<dyn EventSink>,
    state: SessionState,
    frames_sent: u64,
    send_failures: u64,
}

impl<S: FrameSink> StreamSession<S> {
    /// Create a session for an existing registration.
    #[must_use]
    pub fn new(
        subscription: Subscription,
        sink: S,
        relay: Arc<RelayChannel>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            subscription,
            sink,
            relay,
            events,
            state: SessionState::default(),
            frames_sent: 0,
            send_failures: 0,
        }
    }

    /// Subscription served by this session.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.subscription.id()
    }

    /// Run until cancelled or terminated by the relay.
    pub async fn run(mut self, cancel: CancellationToken) -> SessionSummary {
        let id = self.subscription.id();
        tracing::debug!(subscription = %id, "Session started");

        let reason = self.forward(&cancel).await;
        self.state = self.state.next(match reason {
            SessionEnd::Cancelled => SessionInput::Cancelled,
            SessionEnd::RelayClosed => SessionInput::RelayClosed,
        });
        debug_assert!(self.state.is_terminated());

        self.relay.unregister(id);
        self.events.record(&RelayEvent::SessionEnded {
            id,
            reason,
            frames_sent: self.frames_sent,
        });

        SessionSummary {
            id,
            reason,
            frames_sent: self.frames_sent,
            send_failures: self.send_failures,
        }
    }

    async fn forward(&mut self, cancel: &CancellationToken) -> SessionEnd {
        loop {
            let payload = tokio::select! {
                biased;
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                next = self.subscription.recv() => match next {
                    Some(payload) => payload,
                    None => return SessionEnd::RelayClosed,
                },
            };
            self.state = self.state.next(SessionInput::PayloadArrived);

            let frame = DataFrame::stream_update(&payload);
            let sent = tokio::select! {
                biased;
                () = cancel.cancelled() => return SessionEnd::Cancelled,
                sent = self.sink.send_frame(&frame) => sent,
            };

            match sent {
                Ok(()) => {
                    self.frames_sent += 1;
                    self.state = self.state.next(SessionInput::Sent);
                }
                Err(SendError::Disconnected) => return SessionEnd::Cancelled,
                Err(SendError::Failed(error)) => {
                    self.send_failures += 1;
                    self.events.record(&RelayEvent::SessionSendFailed {
                        id: self.subscription.id(),
                        error,
                    });
                    self.state = self.state.next(SessionInput::SendFailed);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::time::Duration;

    use async_trait::async_trait;
    use parking_lot::Mutex;
    use tokio::sync::mpsc;

    use super::*;
    use crate::application::ports::{MockEventSink, NoopEventSink};
    use crate::domain::frame::FieldValues;
    use crate::domain::streaming::Payload;

    /// Forwards sent frames to a channel, failing according to a script.
    struct ScriptedSink {
        sent: mpsc::UnboundedSender<DataFrame>,
        failures: Arc<Mutex<VecDeque<SendError>>>,
    }

    #[async_trait]
    impl FrameSink for ScriptedSink {
        async fn send_frame(&mut self, frame: &DataFrame) -> Result<(), SendError> {
            if let Some(err) = self.failures.lock().pop_front() {
                return Err(err);
            }
            let _ = self.sent.send(frame.clone());
            Ok(())
        }
    }

    /// Never completes a send.
    struct StuckSink;

    #[async_trait]
    impl FrameSink for StuckSink {
        async fn send_frame(&mut self, _frame: &DataFrame) -> Result<(), SendError> {
            std::future::pending().await
        }
    }

    fn sink(failures: Vec<SendError>) -> (ScriptedSink, mpsc::UnboundedReceiver<DataFrame>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            ScriptedSink {
                sent: tx,
                failures: Arc::new(Mutex::new(failures.into())),
            },
            rx,
        )
    }

    fn text(frame: &DataFrame) -> String {
        match &frame.field("values").unwrap().values {
            FieldValues::String(v) => v[0].clone(),
            other => panic!("unexpected values {other:?}"),
        }
    }

    #[tokio::test]
    async fn forwards_payloads_as_frames() {
        let relay = Arc::new(RelayChannel::new(4, Arc::new(NoopEventSink)));
        let sub = relay.register("stream").unwrap();
        let (sink, mut frames) = sink(vec![]);
        let cancel = CancellationToken::new();

        let session = StreamSession::new(sub, sink, Arc::clone(&relay), Arc::new(NoopEventSink));
        let handle = tokio::spawn(session.run(cancel.clone()));

        let _ = relay.deliver(&Payload::new("A"));
        assert_eq!(text(&frames.recv().await.unwrap()), "A");
        let _ = relay.deliver(&Payload::new("B"));
        assert_eq!(text(&frames.recv().await.unwrap()), "B");

        cancel.cancel();
        let summary = handle.await.unwrap();
        assert_eq!(summary.reason, SessionEnd::Cancelled);
        assert_eq!(summary.frames_sent, 2);
        assert_eq!(relay.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn send_failure_is_absorbed() {
        let relay = Arc::new(RelayChannel::new(4, Arc::new(NoopEventSink)));
        let sub = relay.register("stream").unwrap();
        let (sink, mut frames) = sink(vec![SendError::Failed("busy".to_string())]);
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            StreamSession::new(sub, sink, Arc::clone(&relay), Arc::new(NoopEventSink))
                .run(cancel.clone()),
        );

        let _ = relay.deliver(&Payload::new("lost"));
        tokio::time::sleep(Duration::from_millis(20)).await;
        let _ = relay.deliver(&Payload::new("kept"));
        assert_eq!(text(&frames.recv().await.unwrap()), "kept");

        cancel.cancel();
        let summary = handle.await.unwrap();
        assert_eq!(summary.send_failures, 1);
        assert_eq!(summary.frames_sent, 1);
    }

    #[tokio::test]
    async fn disconnected_client_ends_session() {
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let sub = relay.register("stream").unwrap();
        let (sink, _frames) = sink(vec![SendError::Disconnected]);

        let handle = tokio::spawn(
            StreamSession::new(sub, sink, Arc::clone(&relay), Arc::new(NoopEventSink))
                .run(CancellationToken::new()),
        );
        let _ = relay.deliver(&Payload::new("x"));

        let summary = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.reason, SessionEnd::Cancelled);
        assert_eq!(relay.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn relay_termination_ends_session() {
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let sub = relay.register("stream").unwrap();
        let (sink, _frames) = sink(vec![]);

        let handle = tokio::spawn(
            StreamSession::new(sub, sink, Arc::clone(&relay), Arc::new(NoopEventSink))
                .run(CancellationToken::new()),
        );
        tokio::task::yield_now().await;
        relay.terminate_all();

        let summary = handle.await.unwrap();
        assert_eq!(summary.reason, SessionEnd::RelayClosed);
    }

    #[tokio::test]
    async fn cancel_interrupts_blocked_send() {
        let relay = Arc::new(RelayChannel::new(1, Arc::new(NoopEventSink)));
        let sub = relay.register("stream").unwrap();
        let cancel = CancellationToken::new();

        let handle = tokio::spawn(
            StreamSession::new(sub, StuckSink, Arc::clone(&relay), Arc::new(NoopEventSink))
                .run(cancel.clone()),
        );
        let _ = relay.deliver(&Payload::new("x"));
        tokio::time::sleep(Duration::from_millis(10)).await;
        cancel.cancel();

        let summary = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(summary.reason, SessionEnd::Cancelled);
        assert_eq!(summary.frames_sent, 0);
    }

    #[tokio::test]
    async fn unregisters_exactly_once() {
        let mut events = MockEventSink::new();
        events
            .expect_record()
            .withf(|e| matches!(e, RelayEvent::SubscriberRegistered { .. }))
            .times(1)
            .return_const(());
        events
            .expect_record()
            .withf(|e| matches!(e, RelayEvent::SubscriberUnregistered { .. }))
            .times(1)
            .return_const(());
        events
            .expect_record()
            .withf(|e| {
                matches!(
                    e,
                    RelayEvent::SessionEnded {
                        reason: SessionEnd::Cancelled,
                        ..
                    }
                )
            })
            .times(1)
            .return_const(());
        let events: Arc<dyn EventSink> = Arc::new(events);

        let relay = Arc::new(RelayChannel::new(1, Arc::clone(&events)));
        let sub = relay.register("stream").unwrap();
        let id = sub.id();
        let (sink, _frames) = sink(vec![]);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let summary = StreamSession::new(sub, sink, Arc::clone(&relay), events)
            .run(cancel)
            .await;

        assert_eq!(summary.id, id);
        assert!(!relay.unregister(id));
    }
}
