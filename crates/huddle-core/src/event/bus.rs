//! Topic-keyed broadcast event bus for distributing `DomainEvent`s.
//!
//! Each topic owns a `tokio::sync::broadcast` channel created lazily on first
//! subscribe. Publishing reaches every receiver registered at that moment;
//! later subscribers never see earlier events. Publishing to a topic with no
//! subscribers is a no-op.

use std::sync::Arc;

use dashmap::DashMap;
use futures_util::stream::{self, BoxStream, Stream, StreamExt};
use huddle_types::event::DomainEvent;
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Default buffer size per topic.
pub const DEFAULT_CAPACITY: usize = 1024;

/// Multi-topic event bus.
///
/// Construct one per process and share it behind an `Arc`.
pub struct EventBus {
    topics: DashMap<String, broadcast::Sender<Arc<DomainEvent>>>,
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus with the given per-topic channel capacity.
    pub fn new(capacity: usize) -> Self {
        Self {
            topics: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Register a new subscriber on `topic`.
    ///
    /// The subscriber is registered immediately, before the returned
    /// [`Subscription`] is first polled.
    pub fn subscribe(&self, topic: &str) -> Subscription {
        let receiver = self
            .topics
            .entry(topic.to_string())
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe();
        debug!(%topic, "subscriber registered");
        Subscription {
            topic: topic.to_string(),
            receiver,
        }
    }

    /// Subscribe to several topics and merge them into one stream.
    ///
    /// Order is preserved within each topic but not across topics.
    pub fn subscribe_many(&self, topics: &[&str]) -> BoxStream<'static, Arc<DomainEvent>> {
        let streams: Vec<_> = topics
            .iter()
            .map(|topic| self.subscribe(topic).into_stream().boxed())
            .collect();
        stream::select_all(streams).boxed()
    }

    /// Publish an event to every current subscriber of `topic`.
    ///
    /// Returns the number of subscribers the event was handed to.
    pub fn publish(&self, topic: &str, event: DomainEvent) -> usize {
        let Some(sender) = self.topics.get(topic) else {
            debug!(%topic, "topic has no subscribers, event dropped");
            return 0;
        };
        match sender.send(Arc::new(event)) {
            Ok(count) => {
                debug!(%topic, count, "published event");
                count
            }
            Err(_) => {
                debug!(%topic, "no active subscribers on topic");
                0
            }
        }
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.topics
            .get(topic)
            .map(|sender| sender.receiver_count())
            .unwrap_or(0)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("topics", &self.topics.len())
            .field("capacity", &self.capacity)
            .finish()
    }
}

/// A live registration on one topic.
///
/// Dropping it deregisters the subscriber from the bus.
pub struct Subscription {
    topic: String,
    receiver: broadcast::Receiver<Arc<DomainEvent>>,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Wait for the next event.
    ///
    /// Returns `None` once the bus is gone. Events overwritten while this
    /// subscriber lagged are skipped.
    pub async fn recv(&mut self) -> Option<Arc<DomainEvent>> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(topic = %self.topic, skipped, "subscriber lagged, skipping events");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Turn the subscription into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = Arc<DomainEvent>> + Send + 'static {
        let mut subscription = self;
        async_stream::stream! {
            while let Some(event) = subscription.recv().await {
                yield event;
            }
        }
    }
}
