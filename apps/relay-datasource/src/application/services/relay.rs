//! Relay Channel
//!
//! Fans payloads from the single upstream reader out to every registered
//! subscriber.
//!
//! # Buffering and drops
//!
//! Each subscriber owns a bounded `mpsc` queue. `deliver` enqueues with
//! `try_send` and never waits:
//! - if the queue is full, the payload is dropped for that subscriber only;
//! - if the receiving side is gone, the subscriber is pruned.
//!
//! A subscriber only sees payloads delivered while it is registered. There is
//! no replay for late subscribers.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use crate::application::ports::{EventSink, RelayEvent};
use crate::domain::streaming::Payload;
use crate::domain::subscription::{StreamPath, SubscriptionId};

/// Default per-subscriber queue depth.
pub const DEFAULT_QUEUE_DEPTH: usize = 1;

/// Errors returned by the relay channel.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// The requested path is not served.
    #[error("permission denied for path '{0}'")]
    PermissionDenied(String),
}

/// Outcome of one `deliver` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Subscribers the payload was queued for.
    pub delivered: usize,
    /// Subscribers whose queue was full.
    pub dropped: usize,
    /// Subscribers removed because their receiver was gone.
    pub pruned: usize,
}

/// Receiving side of a registration.
///
/// `recv` returns `None` once the relay has dropped this subscriber, either
/// through `unregister` or `terminate_all`.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    path: StreamPath,
    rx: mpsc::Receiver<Payload>,
}

impl Subscription {
    /// Subscription identifier.
    #[must_use]
    pub const fn id(&self) -> SubscriptionId {
        self.id
    }

    /// Subscribed path.
    #[must_use]
    pub const fn path(&self) -> StreamPath {
        self.path
    }

    /// Wait for the next payload. Cancel safe.
    pub async fn recv(&mut self) -> Option<Payload> {
        self.rx.recv().await
    }

    /// Take a queued payload without waiting.
    pub fn try_recv(&mut self) -> Option<Payload> {
        self.rx.try_recv().ok()
    }
}

/// Fan-out point between the upstream reader and client sessions.
pub struct RelayChannel {
    subscribers: RwLock<HashMap<SubscriptionId, mpsc::Sender<Payload>>>,
    next_id: AtomicU64,
    queue_depth: usize,
    events: Arc<dyn EventSink>,
}

impl RelayChannel {
    /// Create a channel. A queue depth of zero is raised to one.
    #[must_use]
    pub fn new(queue_depth: usize, events: Arc<dyn EventSink>) -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            queue_depth: queue_depth.max(1),
            events,
        }
    }

    /// Register a subscriber for `path`.
    ///
    /// # Errors
    ///
    /// Returns `RelayError::PermissionDenied` for any path other than
    /// `stream`. No subscriber is created in that case.
    pub fn register(&self, path: &str) -> Result<Subscription, RelayError> {
        let Some(stream_path) = StreamPath::parse(path) else {
            self.events.record(&RelayEvent::PermissionDenied {
                operation: "subscribe",
                path: path.to_string(),
            });
            return Err(RelayError::PermissionDenied(path.to_string()));
        };

        let id = SubscriptionId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.queue_depth);
        self.subscribers.write().insert(id, tx);

        self.events.record(&RelayEvent::SubscriberRegistered { id });
        Ok(Subscription {
            id,
            path: stream_path,
            rx,
        })
    }

    /// Offer a payload to every current subscriber without waiting.
    pub fn deliver(&self, payload: &Payload) -> DeliveryReport {
        let mut report = DeliveryReport::default();
        let mut closed = Vec::new();

        {
            let subscribers = self.subscribers.read();
            for (id, tx) in subscribers.iter() {
                match tx.try_send(payload.clone()) {
                    Ok(()) => report.delivered += 1,
                    Err(TrySendError::Full(_)) => report.dropped += 1,
                    Err(TrySendError::Closed(_)) => closed.push(*id),
                }
            }
        }

        if !closed.is_empty() {
            let mut subscribers = self.subscribers.write();
            for id in &closed {
                subscribers.remove(id);
            }
            report.pruned = closed.len();
        }

        report
    }

    /// Remove a subscriber. Returns `false` if it was already gone.
    pub fn unregister(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.write().remove(&id).is_some();
        if removed {
            self.events
                .record(&RelayEvent::SubscriberUnregistered { id });
        }
        removed
    }

    /// Drop every subscriber's queue so their sessions observe the end of
    /// the stream. New registrations are still accepted afterwards.
    ///
    /// Returns the number of subscribers terminated.
    pub fn terminate_all(&self) -> usize {
        let drained: Vec<_> = self.subscribers.write().drain().collect();
        drained.len()
    }

    /// Number of registered subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Whether `id` is currently registered.
    #[must_use]
    pub fn is_registered(&self, id: SubscriptionId) -> bool {
        self.subscribers.read().contains_key(&id)
    }
}

impl std::fmt::Debug for RelayChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RelayChannel")
            .field("subscribers", &self.subscriber_count())
            .field("queue_depth", &self.queue_depth)
            .finish_non_exhaustive()
    }
}
