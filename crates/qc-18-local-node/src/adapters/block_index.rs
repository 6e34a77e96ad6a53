//! # Keyed Block Index
//!
//! Records which heights were indexed and the indexed attributes of their
//! begin/end block events.

use crate::domain::errors::IndexerError;
use crate::ports::outbound::{BatchOperation, BlockIndex, KeyValueStore};
use shared_bus::BLOCK_HEIGHT_KEY;
use shared_types::{collect_event_tags, Event, Height};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

const HEIGHT_PREFIX: &[u8] = b"block_height\0";
const EVENT_PREFIX: &[u8] = b"block_events\0";

/// Block event index backed by a key-value store.
pub struct KvBlockIndex {
    store: Arc<dyn KeyValueStore>,
}

impl KvBlockIndex {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn height_key(height: Height) -> Vec<u8> {
        let mut key = HEIGHT_PREFIX.to_vec();
        key.extend_from_slice(format!("{:020}", height).as_bytes());
        key
    }

    fn event_key(tag: &str, value: &str, height: Height) -> Vec<u8> {
        let mut key = EVENT_PREFIX.to_vec();
        key.extend_from_slice(tag.as_bytes());
        key.push(0);
        key.extend_from_slice(value.as_bytes());
        key.push(0);
        key.extend_from_slice(format!("{:020}", height).as_bytes());
        key
    }

    /// Heights whose events carry `tag = value`, ascending.
    pub fn heights_with(&self, tag: &str, value: &str) -> Result<Vec<Height>, IndexerError> {
        let mut prefix = EVENT_PREFIX.to_vec();
        prefix.extend_from_slice(tag.as_bytes());
        prefix.push(0);
        prefix.extend_from_slice(value.as_bytes());
        prefix.push(0);

        self.store
            .prefix_scan(&prefix)?
            .into_iter()
            .map(|(key, _)| {
                std::str::from_utf8(&key[prefix.len()..])
                    .ok()
                    .and_then(|h| h.parse().ok())
                    .ok_or_else(|| IndexerError::Codec("malformed block event key".to_string()))
            })
            .collect()
    }
}

impl BlockIndex for KvBlockIndex {
    fn index(&self, height: Height, events: &[Event]) -> Result<(), IndexerError> {
        let mut tags = BTreeMap::new();
        collect_event_tags(events, &mut tags);
        tags.insert(BLOCK_HEIGHT_KEY.to_string(), vec![height.to_string()]);

        let mut ops = vec![BatchOperation::put(Self::height_key(height), Vec::new())];
        for (tag, values) in &tags {
            for value in values {
                ops.push(BatchOperation::put(
                    Self::event_key(tag, value, height),
                    Vec::new(),
                ));
            }
        }
        self.store.atomic_batch_write(ops)?;
        debug!(height, tags = tags.len(), "Indexed block events");
        Ok(())
    }

    fn has(&self, height: Height) -> Result<bool, IndexerError> {
        Ok(self.store.exists(&Self::height_key(height))?)
    }
}
