//! # Shared Bus - Node Event Bus
//!
//! Carries the events a node emits after committing a block (`NewBlock`,
//! `NewBlockHeader`, `Tx`, `ValidatorSetUpdates`) to any number of
//! in-process subscribers.
//!
//! ```text
//! ┌──────────────┐   publish()   ┌──────────────┐  subscribe(subscriber, query)
//! │  Consensus / │ ────────────► │  Event Bus   │ ─────────────► Subscription
//! │  Execution   │               │  (registry)  │                  └─► EventStream
//! └──────────────┘               └──────────────┘
//! ```
//!
//! ## Subscriptions
//!
//! - Filters are [`Query`] expressions evaluated against each event's tags.
//! - A subscriber holds at most one subscription per normalized query.
//! - A subscriber that falls more than the channel capacity behind is
//!   terminated rather than silently skipping events.

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod events;
pub mod publisher;
pub mod query;
pub mod subscriber;

// Re-export main types
pub use events::{EventFilter, EventType, NewBlockEvent, NodeEvent, BLOCK_HEIGHT_KEY, EVENT_TYPE_KEY};
pub use publisher::{EventPublisher, InMemoryEventBus};
pub use query::{Condition, Operand, Operator, Query, QueryParseError};
pub use subscriber::{CancelHandle, EventStream, Subscription, SubscriptionError};

/// Maximum events to buffer per subscriber before it is considered lagging.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 1000;
