//! # Keyed Transaction Index
//!
//! [`TxIndex`] over a [`KeyValueStore`].
//!
//! ## Key Layout
//!
//! | Key | Value |
//! |-----|-------|
//! | `tx \0 <HASH>` | bincode `IndexedTx` |
//! | `tag \0 <tag> \0 <value> \0 <height> \0 <index>` | `<HASH>` |
//!
//! Heights and indexes are zero-padded so keys of one tag sort by chain
//! position. Every tag of [`IndexedTx::tags`] is written, including
//! `tx.hash` and `tx.height`.

use crate::domain::errors::IndexerError;
use crate::ports::outbound::{BatchOperation, KeyValueStore, TxIndex};
use shared_bus::{Condition, Operand, Operator, Query};
use shared_types::{hash_from_hex, hash_to_hex, Hash, IndexedTx};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, warn};

const TX_PREFIX: &[u8] = b"tx\0";
const TAG_PREFIX: &[u8] = b"tag\0";
const SEP: u8 = 0;
const TX_HASH_TAG: &str = "tx.hash";

/// Transaction index backed by a key-value store.
pub struct KvTxIndex {
    store: Arc<dyn KeyValueStore>,
}

impl KvTxIndex {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn primary_key(hash_hex: &str) -> Vec<u8> {
        let mut key = TX_PREFIX.to_vec();
        key.extend_from_slice(hash_hex.as_bytes());
        key
    }

    fn tag_prefix(tag: &str) -> Vec<u8> {
        let mut key = TAG_PREFIX.to_vec();
        key.extend_from_slice(tag.as_bytes());
        key.push(SEP);
        key
    }

    fn tag_key(tag: &str, value: &str, tx: &IndexedTx) -> Vec<u8> {
        let mut key = Self::tag_prefix(tag);
        key.extend_from_slice(value.as_bytes());
        key.push(SEP);
        key.extend_from_slice(format!("{:020}", tx.height).as_bytes());
        key.push(SEP);
        key.extend_from_slice(format!("{:010}", tx.index).as_bytes());
        key
    }

    /// Tag value embedded in a tag key, given the key with its tag prefix
    /// stripped: `<value> \0 <height> \0 <index>`.
    fn value_of(rest: &[u8]) -> Option<&str> {
        let mut parts = rest.rsplitn(3, |b| *b == SEP);
        let _index = parts.next()?;
        let _height = parts.next()?;
        std::str::from_utf8(parts.next()?).ok()
    }

    fn load(&self, hash_hex: &str) -> Result<Option<IndexedTx>, IndexerError> {
        let Some(bytes) = self.store.get(&Self::primary_key(hash_hex))? else {
            return Ok(None);
        };
        bincode::deserialize(&bytes)
            .map(Some)
            .map_err(|e| IndexerError::Codec(e.to_string()))
    }

    /// Hashes (upper hex) of every transaction satisfying `condition`.
    fn candidates(&self, condition: &Condition) -> Result<HashSet<String>, IndexerError> {
        if let Some(hash) = hash_equality(condition) {
            return Ok(HashSet::from([hash_to_hex(&hash)]));
        }

        let prefix = match (&condition.op, &condition.operand) {
            (Operator::Eq, Some(Operand::Str(value))) => {
                let mut p = Self::tag_prefix(&condition.tag);
                p.extend_from_slice(value.as_bytes());
                p.push(SEP);
                p
            }
            _ => Self::tag_prefix(&condition.tag),
        };
        let tag_len = Self::tag_prefix(&condition.tag).len();

        let mut hashes = HashSet::new();
        for (key, value) in self.store.prefix_scan(&prefix)? {
            let Some(tag_value) = Self::value_of(&key[tag_len..]) else {
                warn!(key = ?key, "Skipping malformed tag key");
                continue;
            };
            if condition.matches_value(tag_value) {
                let hash = String::from_utf8(value).map_err(|e| IndexerError::Codec(e.to_string()))?;
                hashes.insert(hash);
            }
        }
        Ok(hashes)
    }
}

/// `tx.hash = '<hex>'` is matched on decoded bytes so hex case is ignored.
fn hash_equality(condition: &Condition) -> Option<Hash> {
    match (&condition.op, &condition.operand) {
        (Operator::Eq, Some(Operand::Str(value))) if condition.tag == TX_HASH_TAG => {
            hash_from_hex(value).ok()
        }
        _ => None,
    }
}

fn record_matches(query: &Query, tx: &IndexedTx) -> bool {
    let tags = tx.tags();
    query.conditions().iter().all(|c| match hash_equality(c) {
        Some(hash) => hash == tx.hash(),
        None => c.matches(&tags),
    })
}

impl TxIndex for KvTxIndex {
    fn get(&self, hash: &Hash) -> Result<Option<IndexedTx>, IndexerError> {
        self.load(&hash_to_hex(hash))
    }

    fn search(&self, query: &Query) -> Result<Vec<IndexedTx>, IndexerError> {
        let mut matched: Option<HashSet<String>> = None;
        for condition in query.conditions() {
            let found = self.candidates(condition)?;
            let narrowed = match matched {
                None => found,
                Some(prev) => prev.intersection(&found).cloned().collect(),
            };
            let empty = narrowed.is_empty();
            matched = Some(narrowed);
            if empty {
                break;
            }
        }

        let mut results = Vec::new();
        for hash in matched.unwrap_or_default() {
            if let Some(tx) = self.load(&hash)? {
                if record_matches(query, &tx) {
                    results.push(tx);
                }
            }
        }
        debug!(query = %query, hits = results.len(), "Tx search complete");
        Ok(results)
    }

    fn index(&self, tx: &IndexedTx) -> Result<(), IndexerError> {
        if tx.tx.is_empty() {
            return Err(IndexerError::EmptyTx {
                height: tx.height,
                index: tx.index,
            });
        }
        let hash_hex = hash_to_hex(&tx.hash());
        let record = bincode::serialize(tx).map_err(|e| IndexerError::Codec(e.to_string()))?;

        let mut ops = vec![BatchOperation::put(Self::primary_key(&hash_hex), record)];
        for (tag, values) in tx.tags() {
            for value in values {
                ops.push(BatchOperation::put(
                    Self::tag_key(&tag, &value, tx),
                    hash_hex.as_bytes().to_vec(),
                ));
            }
        }
        self.store.atomic_batch_write(ops)?;
        debug!(hash = %hash_hex, height = tx.height, index = tx.index, "Indexed tx");
        Ok(())
    }
}
