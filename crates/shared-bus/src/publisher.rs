//! # Event Publisher
//!
//! Defines the publishing side of the event bus and the in-memory bus that
//! tracks which subscriber holds which query.
//!
//! Query subscribers share a bounded broadcast channel and are terminated
//! when they lag. Sinks are bounded `mpsc` feeds that never drop events:
//! `publish` waits for sink capacity.

use crate::events::{EventFilter, NodeEvent};
use crate::subscriber::{EventStream, Registry, Subscription, SubscriptionError, SubscriptionState};
use crate::DEFAULT_CHANNEL_CAPACITY;
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

/// Trait for publishing events to the bus.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an event to the bus.
    ///
    /// # Returns
    ///
    /// The number of live receivers the event was handed to.
    async fn publish(&self, event: NodeEvent) -> usize;

    /// Get the total number of events published.
    fn events_published(&self) -> u64;
}

/// In-memory implementation of the event bus.
///
/// Uses `tokio::sync::broadcast` for multi-producer, multi-consumer semantics.
/// A subscriber may hold at most one subscription per normalized query.
pub struct InMemoryEventBus {
    /// Broadcast sender for events. `None` once the bus is closed.
    sender: RwLock<Option<broadcast::Sender<NodeEvent>>>,

    /// Live subscriptions by subscriber and query.
    registry: Arc<RwLock<Registry>>,

    /// Lossless feeds by name.
    sinks: RwLock<HashMap<String, mpsc::Sender<NodeEvent>>>,

    /// Total events published.
    events_published: AtomicU64,

    /// Channel capacity.
    capacity: usize,
}

impl InMemoryEventBus {
    /// Create a new in-memory event bus with default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new in-memory event bus with specified capacity.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender: RwLock::new(Some(sender)),
            registry: Arc::new(RwLock::new(HashMap::new())),
            sinks: RwLock::new(HashMap::new()),
            events_published: AtomicU64::new(0),
            capacity,
        }
    }

    /// Subscribe `subscriber` to events matching a filter.
    ///
    /// # Errors
    ///
    /// - `AlreadySubscribed` if the subscriber already holds this query
    /// - `Closed` if the bus has been closed
    pub fn subscribe(
        &self,
        subscriber: &str,
        filter: EventFilter,
    ) -> Result<Subscription, SubscriptionError> {
        let guard = self.sender.read();
        let Some(sender) = guard.as_ref() else {
            return Err(SubscriptionError::Closed);
        };

        let key = filter.key();
        let state = {
            let mut registry = self.registry.write();
            let queries = registry.entry(subscriber.to_string()).or_default();
            if queries.contains_key(&key) {
                return Err(SubscriptionError::AlreadySubscribed {
                    subscriber: subscriber.to_string(),
                    query: key,
                });
            }
            let state = Arc::new(SubscriptionState::new(
                subscriber.to_string(),
                key.clone(),
                Arc::downgrade(&self.registry),
            ));
            queries.insert(key.clone(), Arc::clone(&state));
            state
        };

        debug!(subscriber, query = %key, "New subscription created");
        Ok(Subscription::new(sender.subscribe(), filter, state))
    }

    /// Attach a lossless feed receiving every published event.
    ///
    /// The feed holds up to the bus capacity; beyond that `publish` waits
    /// until the receiver catches up. Dropping the receiver detaches it.
    ///
    /// # Errors
    ///
    /// - `AlreadySubscribed` if a sink named `name` is attached
    /// - `Closed` if the bus has been closed
    pub fn attach_sink(&self, name: &str) -> Result<mpsc::Receiver<NodeEvent>, SubscriptionError> {
        let guard = self.sender.read();
        if guard.is_none() {
            return Err(SubscriptionError::Closed);
        }

        let mut sinks = self.sinks.write();
        if sinks.get(name).is_some_and(|s| !s.is_closed()) {
            return Err(SubscriptionError::AlreadySubscribed {
                subscriber: name.to_string(),
                query: String::new(),
            });
        }
        let (tx, rx) = mpsc::channel(self.capacity);
        sinks.insert(name.to_string(), tx);
        debug!(sink = name, "Sink attached");
        Ok(rx)
    }

    /// Number of attached sinks.
    #[must_use]
    pub fn sink_count(&self) -> usize {
        self.sinks.read().len()
    }

    /// Subscribe and wrap the subscription in an [`EventStream`].
    pub fn event_stream(
        &self,
        subscriber: &str,
        filter: EventFilter,
    ) -> Result<EventStream, SubscriptionError> {
        self.subscribe(subscriber, filter).map(Subscription::into_stream)
    }

    /// Cancel one subscription of `subscriber`.
    ///
    /// # Errors
    ///
    /// `NotFound` if no such subscription is live.
    pub fn unsubscribe(&self, subscriber: &str, filter: &EventFilter) -> Result<(), SubscriptionError> {
        let key = filter.key();
        let removed = {
            let mut registry = self.registry.write();
            let removed = registry.get_mut(subscriber).and_then(|q| q.remove(&key));
            if registry.get(subscriber).is_some_and(HashMap::is_empty) {
                registry.remove(subscriber);
            }
            removed
        };
        match removed {
            Some(state) => {
                state.cancel();
                debug!(subscriber, query = %key, "Unsubscribed");
                Ok(())
            }
            None => Err(SubscriptionError::NotFound {
                subscriber: subscriber.to_string(),
                query: key,
            }),
        }
    }

    /// Cancel every subscription of `subscriber`. Returns how many ended.
    pub fn unsubscribe_all(&self, subscriber: &str) -> usize {
        let removed = self.registry.write().remove(subscriber).unwrap_or_default();
        let count = removed.len();
        for state in removed.into_values() {
            state.cancel();
        }
        if count > 0 {
            debug!(subscriber, count, "Unsubscribed all");
        }
        count
    }

    /// Close the bus. Receivers drain what is buffered and then end.
    pub fn close(&self) {
        let sender = self.sender.write().take();
        if sender.is_some() {
            let removed: Vec<_> = self.registry.write().drain().collect();
            let sinks = self.sinks.write().drain().count();
            info!(subscribers = removed.len(), sinks, "Event bus closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.read().is_none()
    }

    /// Get the number of live broadcast receivers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.read().as_ref().map_or(0, broadcast::Sender::receiver_count)
    }

    /// Number of distinct subscribers holding at least one subscription.
    #[must_use]
    pub fn num_clients(&self) -> usize {
        self.registry.read().len()
    }

    /// Number of subscriptions held by `subscriber`.
    #[must_use]
    pub fn num_client_subscriptions(&self, subscriber: &str) -> usize {
        self.registry.read().get(subscriber).map_or(0, HashMap::len)
    }

    /// Get the channel capacity.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl Default for InMemoryEventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventPublisher for InMemoryEventBus {
    async fn publish(&self, event: NodeEvent) -> usize {
        let event_type = event.event_type();
        let height = event.height();

        // Always increment counter (event was attempted)
        self.events_published.fetch_add(1, Ordering::Relaxed);

        let sender = self.sender.read().clone();
        let Some(sender) = sender else {
            warn!(event_type = %event_type, "Event dropped (bus closed)");
            return 0;
        };

        let sinks: Vec<_> = self
            .sinks
            .read()
            .iter()
            .map(|(name, tx)| (name.clone(), tx.clone()))
            .collect();
        let mut delivered = 0;
        let mut detached = Vec::new();
        for (name, tx) in sinks {
            if tx.send(event.clone()).await.is_ok() {
                delivered += 1;
            } else {
                detached.push(name);
            }
        }
        if !detached.is_empty() {
            let mut sinks = self.sinks.write();
            for name in &detached {
                if sinks.get(name).is_some_and(mpsc::Sender::is_closed) {
                    sinks.remove(name);
                    warn!(sink = %name, "Sink receiver gone, detached");
                }
            }
        }

        match sender.send(event) {
            Ok(receiver_count) => {
                debug!(
                    event_type = %event_type,
                    height = ?height,
                    receivers = receiver_count,
                    sinks = delivered,
                    "Event published"
                );
                receiver_count + delivered
            }
            Err(_) => {
                debug!(event_type = %event_type, height = ?height, sinks = delivered, "Event published to sinks only");
                delivered
            }
        }
    }

    fn events_published(&self) -> u64 {
        self.events_published.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{EventType, NewBlockEvent};
    use crate::query::Query;

    fn new_block() -> NodeEvent {
        NodeEvent::NewBlock(NewBlockEvent::default())
    }

    #[tokio::test]
    async fn test_publish_no_subscribers() {
        let bus = InMemoryEventBus::new();
        let receivers = bus.publish(new_block()).await;
        assert_eq!(receivers, 0);
        assert_eq!(bus.events_published(), 1);
    }

    #[tokio::test]
    async fn test_publish_with_subscriber() {
        let bus = InMemoryEventBus::new();
        let _sub = bus.subscribe("a", EventFilter::all()).unwrap();

        let receivers = bus.publish(new_block()).await;
        assert_eq!(receivers, 1);
        assert_eq!(bus.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = InMemoryEventBus::new();
        let _sub1 = bus.subscribe("a", EventFilter::all()).unwrap();
        let _sub2 = bus.subscribe("b", EventFilter::all()).unwrap();
        let _sub3 = bus
            .subscribe("a", EventFilter::event_type(EventType::Tx))
            .unwrap();

        assert_eq!(bus.publish(new_block()).await, 3);
        assert_eq!(bus.num_clients(), 2);
        assert_eq!(bus.num_client_subscriptions("a"), 2);
    }

    #[test]
    fn test_duplicate_subscription_rejected() {
        let bus = InMemoryEventBus::new();
        let _sub = bus
            .subscribe("a", EventFilter::query(Query::parse("tm.event='NewBlock'").unwrap()))
            .unwrap();
        let err = bus
            .subscribe("a", EventFilter::event_type(EventType::NewBlock))
            .unwrap_err();
        assert!(matches!(err, SubscriptionError::AlreadySubscribed { .. }));

        // Another subscriber may use the same query.
        assert!(bus.subscribe("b", EventFilter::event_type(EventType::NewBlock)).is_ok());
    }

    #[test]
    fn test_drop_releases_registry_entry() {
        let bus = InMemoryEventBus::new();
        {
            let _sub = bus.subscribe("a", EventFilter::all()).unwrap();
            assert_eq!(bus.num_clients(), 1);
        }
        assert_eq!(bus.num_clients(), 0);
        assert_eq!(bus.subscriber_count(), 0);
        assert!(bus.subscribe("a", EventFilter::all()).is_ok());
    }

    #[tokio::test]
    async fn test_unsubscribe() {
        let bus = InMemoryEventBus::new();
        let mut sub = bus.subscribe("a", EventFilter::all()).unwrap();

        bus.unsubscribe("a", &EventFilter::all()).unwrap();
        assert_eq!(sub.recv().await, Err(SubscriptionError::Cancelled));
        assert!(matches!(
            bus.unsubscribe("a", &EventFilter::all()),
            Err(SubscriptionError::NotFound { .. })
        ));
    }

    #[test]
    fn test_unsubscribe_all() {
        let bus = InMemoryEventBus::new();
        let _s1 = bus.subscribe("a", EventFilter::all()).unwrap();
        let _s2 = bus.subscribe("a", EventFilter::event_type(EventType::Tx)).unwrap();
        let _s3 = bus.subscribe("b", EventFilter::all()).unwrap();

        assert_eq!(bus.unsubscribe_all("a"), 2);
        assert_eq!(bus.num_clients(), 1);
        assert_eq!(bus.unsubscribe_all("a"), 0);
    }

    #[tokio::test]
    async fn test_closed_bus() {
        let bus = InMemoryEventBus::new();
        bus.close();
        bus.close();
        assert!(bus.is_closed());
        assert_eq!(bus.publish(new_block()).await, 0);
        assert!(matches!(
            bus.subscribe("a", EventFilter::all()),
            Err(SubscriptionError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_sink_never_drops_events() {
        let bus = Arc::new(InMemoryEventBus::with_capacity(2));
        let mut feed = bus.attach_sink("indexer").unwrap();

        let publisher = {
            let bus = Arc::clone(&bus);
            tokio::spawn(async move {
                for _ in 0..10 {
                    bus.publish(new_block()).await;
                }
            })
        };
        for _ in 0..10 {
            assert!(feed.recv().await.is_some());
        }
        publisher.await.unwrap();
        assert_eq!(bus.events_published(), 10);
    }

    #[tokio::test]
    async fn test_sink_lifecycle() {
        let bus = InMemoryEventBus::new();
        let feed = bus.attach_sink("indexer").unwrap();
        assert!(matches!(
            bus.attach_sink("indexer"),
            Err(SubscriptionError::AlreadySubscribed { .. })
        ));
        assert_eq!(bus.publish(new_block()).await, 1);

        // A dropped receiver is detached on the next publish.
        drop(feed);
        assert_eq!(bus.publish(new_block()).await, 0);
        assert_eq!(bus.sink_count(), 0);
        let mut feed = bus.attach_sink("indexer").unwrap();

        bus.close();
        assert!(feed.recv().await.is_none());
        assert!(matches!(bus.attach_sink("other"), Err(SubscriptionError::Closed)));
    }

    #[test]
    fn test_default_bus() {
        let bus = InMemoryEventBus::default();
        assert_eq!(bus.capacity(), DEFAULT_CHANNEL_CAPACITY);
        assert_eq!(bus.subscriber_count(), 0);
        assert_eq!(bus.events_published(), 0);
        assert_eq!(InMemoryEventBus::with_capacity(0).capacity(), 1);
    }
}
