//! # Event Subscriber
//!
//! Defines the subscription side of the event bus.
//!
//! A [`Subscription`] is registered under `(subscriber, query)` in the bus
//! registry. It is released exactly once, whichever of these happens first:
//! [`CancelHandle::cancel`], dropping the subscription (or its
//! [`EventStream`]), the subscriber falling behind the channel, or
//! [`InMemoryEventBus::unsubscribe`](crate::InMemoryEventBus::unsubscribe).

use std::collections::HashMap;
use std::fmt;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::task::{Context, Poll};

use futures::stream::{self, Stream, StreamExt};
use parking_lot::RwLock;
use thiserror::Error;
use tokio::sync::{broadcast, Notify};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::events::{EventFilter, NodeEvent};

/// Errors from subscription operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    /// The event bus was closed.
    #[error("event bus closed")]
    Closed,

    /// The subscription was cancelled by its owner.
    #[error("subscription cancelled")]
    Cancelled,

    /// The subscriber fell behind and events were dropped.
    #[error("subscriber lagged behind by {missed} events")]
    Lagged { missed: u64 },

    /// The subscriber already holds a subscription for this query.
    #[error("{subscriber} is already subscribed to {query:?}")]
    AlreadySubscribed { subscriber: String, query: String },

    /// No such subscription.
    #[error("{subscriber} has no subscription for {query:?}")]
    NotFound { subscriber: String, query: String },
}

/// subscriber -> query key -> live subscription.
pub(crate) type Registry = HashMap<String, HashMap<String, Arc<SubscriptionState>>>;

/// Shared state between a subscription, its cancel handles and the registry.
pub(crate) struct SubscriptionState {
    id: Uuid,
    subscriber: String,
    query: String,
    cancelled: AtomicBool,
    notify: Notify,
    registry: Weak<RwLock<Registry>>,
}

impl SubscriptionState {
    pub(crate) fn new(
        subscriber: String,
        query: String,
        registry: Weak<RwLock<Registry>>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            subscriber,
            query,
            cancelled: AtomicBool::new(false),
            notify: Notify::new(),
            registry,
        }
    }

    fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    /// Mark cancelled, wake the receiver and release the registry entry.
    ///
    /// Returns `false` if already cancelled. Must not be called while the
    /// registry lock is held.
    pub(crate) fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        self.notify.notify_waiters();
        self.release();
        true
    }

    fn release(&self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        let mut registry = registry.write();
        let Some(queries) = registry.get_mut(&self.subscriber) else {
            return;
        };
        if queries.get(&self.query).is_some_and(|s| s.id == self.id) {
            queries.remove(&self.query);
        }
        if queries.is_empty() {
            registry.remove(&self.subscriber);
        }
    }
}

/// Cloneable handle that ends a subscription from anywhere.
#[derive(Clone)]
pub struct CancelHandle {
    state: Arc<SubscriptionState>,
}

impl CancelHandle {
    /// End the subscription. Idempotent.
    pub fn cancel(&self) {
        if self.state.cancel() {
            debug!(
                subscriber = %self.state.subscriber,
                query = %self.state.query,
                "Subscription cancelled"
            );
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.is_cancelled()
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("id", &self.state.id)
            .field("cancelled", &self.state.is_cancelled())
            .finish()
    }
}

/// A subscription handle for receiving events.
///
/// When dropped, the subscription is automatically released.
pub struct Subscription {
    /// The broadcast receiver.
    receiver: broadcast::Receiver<NodeEvent>,

    /// Filter for this subscription.
    filter: EventFilter,

    state: Arc<SubscriptionState>,
}

impl Subscription {
    pub(crate) fn new(
        receiver: broadcast::Receiver<NodeEvent>,
        filter: EventFilter,
        state: Arc<SubscriptionState>,
    ) -> Self {
        Self {
            receiver,
            filter,
            state,
        }
    }

    /// Receive the next event that matches the filter.
    ///
    /// Falling behind the channel ends the subscription with
    /// [`SubscriptionError::Lagged`]; every later call returns
    /// [`SubscriptionError::Cancelled`].
    pub async fn recv(&mut self) -> Result<NodeEvent, SubscriptionError> {
        loop {
            // Register interest before checking the flag so a concurrent
            // cancel cannot slip between the two.
            let notified = self.state.notify.notified();
            if self.state.is_cancelled() {
                return Err(SubscriptionError::Cancelled);
            }

            let received = tokio::select! {
                biased;
                () = notified => return Err(SubscriptionError::Cancelled),
                received = self.receiver.recv() => received,
            };

            match received {
                Ok(event) => {
                    if self.filter.matches(&event) {
                        return Ok(event);
                    }
                }
                Err(broadcast::error::RecvError::Closed) => return Err(SubscriptionError::Closed),
                Err(broadcast::error::RecvError::Lagged(missed)) => {
                    return Err(self.terminate_lagged(missed));
                }
            }
        }
    }

    /// Try to receive the next event without blocking.
    ///
    /// # Returns
    ///
    /// - `Ok(Some(event))` - An event was available and matched
    /// - `Ok(None)` - No event available (would block)
    /// - `Err(_)` - The subscription has ended
    pub fn try_recv(&mut self) -> Result<Option<NodeEvent>, SubscriptionError> {
        loop {
            if self.state.is_cancelled() {
                return Err(SubscriptionError::Cancelled);
            }
            let event = match self.receiver.try_recv() {
                Ok(e) => e,
                Err(broadcast::error::TryRecvError::Empty) => return Ok(None),
                Err(broadcast::error::TryRecvError::Closed) => {
                    return Err(SubscriptionError::Closed)
                }
                Err(broadcast::error::TryRecvError::Lagged(missed)) => {
                    return Err(self.terminate_lagged(missed));
                }
            };

            if self.filter.matches(&event) {
                return Ok(Some(event));
            }
        }
    }

    fn terminate_lagged(&self, missed: u64) -> SubscriptionError {
        warn!(
            subscriber = %self.state.subscriber,
            query = %self.state.query,
            missed,
            "Subscriber lagged, terminating subscription"
        );
        self.state.cancel();
        SubscriptionError::Lagged { missed }
    }

    /// Handle that cancels this subscription.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            state: Arc::clone(&self.state),
        }
    }

    /// Get the filter for this subscription.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.state.id
    }

    #[must_use]
    pub fn subscriber(&self) -> &str {
        &self.state.subscriber
    }

    /// Convert into a stream of matching events.
    #[must_use]
    pub fn into_stream(self) -> EventStream {
        EventStream::new(self)
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.state.id)
            .field("subscriber", &self.state.subscriber)
            .field("query", &self.state.query)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if self.state.cancel() {
            debug!(
                subscriber = %self.state.subscriber,
                query = %self.state.query,
                "Subscription dropped"
            );
        }
    }
}

/// A stream of events for one subscription.
///
/// Ends when the subscription is cancelled, lags, or the bus closes.
pub struct EventStream {
    inner: Pin<Box<dyn Stream<Item = NodeEvent> + Send>>,
    filter: EventFilter,
    id: Uuid,
}

impl EventStream {
    /// Create a new event stream from a subscription.
    #[must_use]
    pub fn new(subscription: Subscription) -> Self {
        let filter = subscription.filter().clone();
        let id = subscription.id();
        let inner = stream::unfold(subscription, |mut sub| async move {
            match sub.recv().await {
                Ok(event) => Some((event, sub)),
                Err(reason) => {
                    debug!(id = %sub.id(), reason = %reason, "Event stream ended");
                    None
                }
            }
        });
        Self {
            inner: Box::pin(inner),
            filter,
            id,
        }
    }

    /// Get the filter for this stream.
    #[must_use]
    pub fn filter(&self) -> &EventFilter {
        &self.filter
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }
}

impl Stream for EventStream {
    type Item = NodeEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("id", &self.id)
            .field("filter", &self.filter)
            .finish()
    }
}
