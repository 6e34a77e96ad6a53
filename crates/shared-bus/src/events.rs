//! # Node Events
//!
//! Defines the events the node publishes on the shared bus once a block has
//! been committed, and the query-based filter subscribers attach to them.
//!
//! Every event carries a set of composite-key tags (`tm.event` plus the
//! indexed attributes of its payload) that [`Query`] conditions are
//! evaluated against.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use shared_types::entities::{
    collect_event_tags, Block, BlockHeader, BlockId, Event, IndexedTx, ValidatorUpdate,
};

use crate::query::Query;

/// Tag holding the event type of every published event.
pub const EVENT_TYPE_KEY: &str = "tm.event";

/// Tag holding the block height for block-level events.
pub const BLOCK_HEIGHT_KEY: &str = "block.height";

/// Payload of a `NewBlock` event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NewBlockEvent {
    pub block: Block,
    pub block_id: BlockId,
    #[serde(default)]
    pub result_begin_block: Vec<Event>,
    #[serde(default)]
    pub result_end_block: Vec<Event>,
}

/// All events that can be published to the event bus.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeEvent {
    /// A block was committed.
    NewBlock(NewBlockEvent),

    /// Header of a committed block.
    NewBlockHeader(BlockHeader),

    /// A transaction was executed and included in a block.
    Tx(IndexedTx),

    /// The validator set changed at the end of a block.
    ValidatorSetUpdates(Vec<ValidatorUpdate>),
}

/// Event type names used in the `tm.event` tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventType {
    NewBlock,
    NewBlockHeader,
    Tx,
    ValidatorSetUpdates,
}

impl EventType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::NewBlock => "NewBlock",
            EventType::NewBlockHeader => "NewBlockHeader",
            EventType::Tx => "Tx",
            EventType::ValidatorSetUpdates => "ValidatorSetUpdates",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl NodeEvent {
    /// Get the event type (for filtering and logging).
    #[must_use]
    pub fn event_type(&self) -> EventType {
        match self {
            Self::NewBlock(_) => EventType::NewBlock,
            Self::NewBlockHeader(_) => EventType::NewBlockHeader,
            Self::Tx(_) => EventType::Tx,
            Self::ValidatorSetUpdates(_) => EventType::ValidatorSetUpdates,
        }
    }

    /// Height the event belongs to, if any.
    #[must_use]
    pub fn height(&self) -> Option<i64> {
        match self {
            Self::NewBlock(ev) => Some(ev.block.header.height),
            Self::NewBlockHeader(header) => Some(header.height),
            Self::Tx(tx) => Some(tx.height),
            Self::ValidatorSetUpdates(_) => None,
        }
    }

    /// Composite-key tags a subscription query is matched against.
    #[must_use]
    pub fn tags(&self) -> BTreeMap<String, Vec<String>> {
        let mut tags = match self {
            Self::Tx(tx) => tx.tags(),
            Self::NewBlock(ev) => {
                let mut tags = BTreeMap::new();
                collect_event_tags(&ev.result_begin_block, &mut tags);
                collect_event_tags(&ev.result_end_block, &mut tags);
                tags
            }
            _ => BTreeMap::new(),
        };
        if let Some(height) = self.height().filter(|_| !matches!(self, Self::Tx(_))) {
            tags.insert(BLOCK_HEIGHT_KEY.to_string(), vec![height.to_string()]);
        }
        tags.insert(
            EVENT_TYPE_KEY.to_string(),
            vec![self.event_type().as_str().to_string()],
        );
        tags
    }
}

/// Filter for subscribing to specific events.
///
/// A filter without a query accepts every event.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventFilter {
    query: Option<Query>,
}

impl EventFilter {
    /// Create a filter that accepts all events.
    #[must_use]
    pub fn all() -> Self {
        Self::default()
    }

    /// Create a filter from a parsed query.
    #[must_use]
    pub fn query(query: Query) -> Self {
        Self { query: Some(query) }
    }

    /// Create a filter for a single event type.
    #[must_use]
    pub fn event_type(event_type: EventType) -> Self {
        Self::query(Query::event_type(event_type.as_str()))
    }

    #[must_use]
    pub fn as_query(&self) -> Option<&Query> {
        self.query.as_ref()
    }

    /// Normalized key identifying this filter in the subscription registry.
    #[must_use]
    pub fn key(&self) -> String {
        self.query.as_ref().map(ToString::to_string).unwrap_or_default()
    }

    /// Check if an event matches this filter.
    #[must_use]
    pub fn matches(&self, event: &NodeEvent) -> bool {
        match &self.query {
            None => true,
            Some(query) => query.matches(&event.tags()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_types::entities::{ExecTxResult, Transaction};

    fn tx_event(height: i64, sender: &str) -> NodeEvent {
        let tx = Transaction {
            memo: format!("from {}", sender),
            ..Default::default()
        };
        NodeEvent::Tx(IndexedTx {
            height,
            index: 0,
            result: ExecTxResult {
                events: vec![Event::new("transfer").with_attr("sender", sender)],
                ..Default::default()
            },
            tx: tx.encode().unwrap(),
        })
    }

    fn block_event(height: i64) -> NodeEvent {
        let mut ev = NewBlockEvent::default();
        ev.block.header.height = height;
        NodeEvent::NewBlock(ev)
    }

    #[test]
    fn test_event_type_tag() {
        let tags = block_event(3).tags();
        assert_eq!(tags.get(EVENT_TYPE_KEY), Some(&vec!["NewBlock".to_string()]));
        assert_eq!(tags.get(BLOCK_HEIGHT_KEY), Some(&vec!["3".to_string()]));
    }

    #[test]
    fn test_tx_tags_include_indexed_attributes() {
        let tags = tx_event(9, "alice").tags();
        assert_eq!(tags.get("tm.event"), Some(&vec!["Tx".to_string()]));
        assert_eq!(tags.get("tx.height"), Some(&vec!["9".to_string()]));
        assert_eq!(tags.get("transfer.sender"), Some(&vec!["alice".to_string()]));
        assert!(tags.contains_key("tx.hash"));
        assert!(!tags.contains_key(BLOCK_HEIGHT_KEY));
    }

    #[test]
    fn test_filter_all() {
        let filter = EventFilter::all();
        assert!(filter.matches(&block_event(1)));
        assert!(filter.matches(&tx_event(1, "bob")));
        assert_eq!(filter.key(), "");
    }

    #[test]
    fn test_filter_by_event_type() {
        let filter = EventFilter::event_type(EventType::NewBlock);
        assert!(filter.matches(&block_event(1)));
        assert!(!filter.matches(&tx_event(1, "bob")));
        assert!(!filter.matches(&NodeEvent::ValidatorSetUpdates(vec![])));
        assert_eq!(filter.key(), "tm.event = 'NewBlock'");
    }

    #[test]
    fn test_filter_by_attribute() {
        let filter =
            EventFilter::query(Query::parse("tm.event = 'Tx' AND transfer.sender = 'alice'").unwrap());
        assert!(filter.matches(&tx_event(2, "alice")));
        assert!(!filter.matches(&tx_event(2, "bob")));
    }
}
