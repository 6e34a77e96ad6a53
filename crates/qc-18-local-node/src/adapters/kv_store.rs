//! # In-Memory Key-Value Store
//!
//! Ordered in-memory implementation of [`KeyValueStore`], plus the
//! [`DbProvider`] that hands out one store per database id.

use crate::domain::errors::KVStoreError;
use crate::ports::outbound::{BatchOperation, DbProvider, KeyValueStore, ScanResult};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use std::sync::Arc;
use tracing::debug;

/// In-memory key-value store.
///
/// Keys are kept ordered so prefix scans return in key order. Batch writes
/// apply under a single write lock.
#[derive(Default)]
pub struct InMemoryKVStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl InMemoryKVStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

impl KeyValueStore for InMemoryKVStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError> {
        Ok(self.data.read().get(key).cloned())
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError> {
        self.data.write().remove(key);
        Ok(())
    }

    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError> {
        let mut data = self.data.write();
        for op in operations {
            match op {
                BatchOperation::Put { key, value } => {
                    data.insert(key, value);
                }
                BatchOperation::Delete { key } => {
                    data.remove(&key);
                }
            }
        }
        Ok(())
    }

    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError> {
        Ok(self.data.read().contains_key(key))
    }

    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError> {
        let data = self.data.read();
        let results = data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(results)
    }
}

/// Hands out one shared [`InMemoryKVStore`] per database id.
#[derive(Default)]
pub struct MemDbProvider {
    dbs: RwLock<HashMap<String, Arc<InMemoryKVStore>>>,
}

impl MemDbProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ids opened so far.
    pub fn opened(&self) -> Vec<String> {
        let mut ids: Vec<_> = self.dbs.read().keys().cloned().collect();
        ids.sort();
        ids
    }
}

impl DbProvider for MemDbProvider {
    fn open(&self, id: &str) -> Result<Arc<dyn KeyValueStore>, KVStoreError> {
        if id.is_empty() {
            return Err(KVStoreError::UnknownDatabase { id: id.to_string() });
        }
        let db: Arc<InMemoryKVStore> = Arc::clone(
            self.dbs
                .write()
                .entry(id.to_string())
                .or_insert_with(|| {
                    debug!(db = id, "Opening in-memory database");
                    Arc::new(InMemoryKVStore::new())
                }),
        );
        Ok(db as Arc<dyn KeyValueStore>)
    }
}
