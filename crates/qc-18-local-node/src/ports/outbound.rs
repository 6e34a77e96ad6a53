//! # Outbound Ports (Driven Ports)
//!
//! Collaborators the facade reads from. The host node owns and writes to
//! them; the facade only holds shared handles.

use crate::domain::errors::{ConsensusError, GenesisError, IndexerError, KVStoreError, StoreError};
use shared_bus::Query;
use shared_types::{
    Block, BlockMeta, Event, ExecutionResults, GenesisDoc, Hash, Height, IndexedTx, ValidatorSet,
};
use std::fmt;
use std::sync::Arc;

// =============================================================================
// STORAGE
// =============================================================================

/// Committed blocks and their metadata.
pub trait BlockStore: Send + Sync {
    /// Latest committed height, 0 on an empty chain.
    fn height(&self) -> Height;

    /// Lowest height still retained after pruning.
    fn base(&self) -> Height;

    fn load_block(&self, height: Height) -> Option<Block>;

    fn load_block_meta(&self, height: Height) -> Option<BlockMeta>;
}

/// Per-height validator sets and execution results.
pub trait StateStore: Send + Sync {
    fn load_validators(&self, height: Height) -> Result<ValidatorSet, StoreError>;

    /// `Ok(None)` when nothing was recorded for the height.
    fn load_execution_results(
        &self,
        height: Height,
    ) -> Result<Option<ExecutionResults>, StoreError>;
}

/// Result of a prefix scan: `(key, value)` pairs in key order.
pub type ScanResult = Vec<(Vec<u8>, Vec<u8>)>;

/// Abstract interface for key-value database operations.
///
/// Handles are shared between the indexer service (writer) and the query
/// facade (reader), so every method takes `&self`.
pub trait KeyValueStore: Send + Sync {
    /// Get a value by key.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>, KVStoreError>;

    /// Put a single key-value pair.
    fn put(&self, key: &[u8], value: &[u8]) -> Result<(), KVStoreError>;

    /// Delete a key.
    fn delete(&self, key: &[u8]) -> Result<(), KVStoreError>;

    /// Execute an atomic batch write. Either every operation is applied or
    /// none is.
    fn atomic_batch_write(&self, operations: Vec<BatchOperation>) -> Result<(), KVStoreError>;

    /// Check if a key exists.
    fn exists(&self, key: &[u8]) -> Result<bool, KVStoreError>;

    /// Iterate over keys with a prefix.
    fn prefix_scan(&self, prefix: &[u8]) -> Result<ScanResult, KVStoreError>;
}

/// Batch operation for atomic writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchOperation {
    Put { key: Vec<u8>, value: Vec<u8> },
    Delete { key: Vec<u8> },
}

impl BatchOperation {
    pub fn put(key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Put {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<Vec<u8>>) -> Self {
        BatchOperation::Delete { key: key.into() }
    }
}

/// Opens named databases.
pub trait DbProvider: Send + Sync {
    /// Open (or create) the database `id`.
    fn open(&self, id: &str) -> Result<Arc<dyn KeyValueStore>, KVStoreError>;
}

/// Database holding the transaction and block indexes.
pub const TX_INDEX_DB: &str = "tx_index";

/// Database holding block event indexes when kept separately.
pub const BLOCK_INDEX_DB: &str = "block_index";

// =============================================================================
// INDEXERS
// =============================================================================

/// A transaction index.
pub trait TxIndex: Send + Sync {
    fn get(&self, hash: &Hash) -> Result<Option<IndexedTx>, IndexerError>;

    /// Every indexed transaction matching `query`, in no particular order.
    fn search(&self, query: &Query) -> Result<Vec<IndexedTx>, IndexerError>;

    fn index(&self, tx: &IndexedTx) -> Result<(), IndexerError>;
}

/// The transaction indexer selected at bootstrap.
#[derive(Clone)]
pub enum TxIndexer {
    /// Indexing disabled: lookups miss, searches are empty, writes vanish.
    Null,
    Keyed(Arc<dyn TxIndex>),
}

impl TxIndexer {
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        matches!(self, TxIndexer::Keyed(_))
    }

    pub fn get(&self, hash: &Hash) -> Result<Option<IndexedTx>, IndexerError> {
        match self {
            TxIndexer::Null => Ok(None),
            TxIndexer::Keyed(index) => index.get(hash),
        }
    }

    pub fn search(&self, query: &Query) -> Result<Vec<IndexedTx>, IndexerError> {
        match self {
            TxIndexer::Null => Ok(Vec::new()),
            TxIndexer::Keyed(index) => index.search(query),
        }
    }

    pub fn index(&self, tx: &IndexedTx) -> Result<(), IndexerError> {
        match self {
            TxIndexer::Null => Ok(()),
            TxIndexer::Keyed(index) => index.index(tx),
        }
    }
}

impl fmt::Debug for TxIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TxIndexer::Null => f.write_str("TxIndexer::Null"),
            TxIndexer::Keyed(_) => f.write_str("TxIndexer::Keyed"),
        }
    }
}

/// A block event index.
pub trait BlockIndex: Send + Sync {
    /// Record the begin/end block events of `height`.
    fn index(&self, height: Height, events: &[Event]) -> Result<(), IndexerError>;

    fn has(&self, height: Height) -> Result<bool, IndexerError>;
}

/// The block indexer selected at bootstrap.
#[derive(Clone)]
pub enum BlockIndexer {
    Null,
    Keyed(Arc<dyn BlockIndex>),
}

impl BlockIndexer {
    pub fn index(&self, height: Height, events: &[Event]) -> Result<(), IndexerError> {
        match self {
            BlockIndexer::Null => Ok(()),
            BlockIndexer::Keyed(index) => index.index(height, events),
        }
    }

    pub fn has(&self, height: Height) -> Result<bool, IndexerError> {
        match self {
            BlockIndexer::Null => Ok(false),
            BlockIndexer::Keyed(index) => index.has(height),
        }
    }
}

impl fmt::Debug for BlockIndexer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockIndexer::Null => f.write_str("BlockIndexer::Null"),
            BlockIndexer::Keyed(_) => f.write_str("BlockIndexer::Keyed"),
        }
    }
}

// =============================================================================
// CONSENSUS / GENESIS
// =============================================================================

/// Read access to the consensus engine's round state.
pub trait ConsensusReader: Send + Sync {
    /// JSON snapshot of the current round state.
    fn round_state_snapshot(&self) -> Result<Vec<u8>, ConsensusError>;
}

/// Source of the genesis document, consulted once at bootstrap.
pub trait GenesisProvider: Send + Sync {
    fn genesis_doc(&self) -> Result<GenesisDoc, GenesisError>;
}
