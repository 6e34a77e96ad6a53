//! # Adapters
//!
//! Implementations of the outbound ports.
//!
//! - `kv_store` - ordered in-memory KV store and DB provider
//! - `stores` - in-memory block and state stores
//! - `tx_index` / `block_index` - keyed indexers over a KV store
//! - `indexer_service` - bus-driven background indexing
//! - `genesis` - static and JSON-file genesis providers
//! - `consensus` - round-state snapshot reader

pub mod block_index;
pub mod consensus;
pub mod genesis;
pub mod indexer_service;
pub mod kv_store;
pub mod stores;
pub mod tx_index;

pub use block_index::KvBlockIndex;
pub use consensus::SnapshotConsensusReader;
pub use genesis::{JsonFileGenesisProvider, StaticGenesisProvider};
pub use indexer_service::{IndexerService, IndexerStats, INDEXER_SUBSCRIBER};
pub use kv_store::{InMemoryKVStore, MemDbProvider};
pub use stores::{InMemoryBlockStore, InMemoryStateStore};
pub use tx_index::KvTxIndex;
