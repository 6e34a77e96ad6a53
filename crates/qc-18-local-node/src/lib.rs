//! # QC-18 Local Node
//!
//! Read-only query facade for applications embedded in the same process as
//! a node. It answers questions about the chain without going through a
//! network RPC layer.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   LocalNodeApi   ┌──────────────────┐
//! │ Application │ ───────────────► │ LocalQueryService│
//! └─────────────┘                  └────────┬─────────┘
//!                                           │ reads
//!        ┌───────────────┬──────────────────┼───────────────┬──────────────┐
//!        ▼               ▼                  ▼               ▼              ▼
//!   BlockStore      StateStore          TxIndexer    ConsensusReader   Event Bus
//!                                           ▲                              │
//!                                           └──── IndexerService ◄─────────┘
//! ```
//!
//! ## Queries
//!
//! | Query | Notes |
//! |-------|-------|
//! | `block`, `validators`, `block_results` | Height optional, bounded by `[base, latest]` |
//! | `tx`, `txs` | Needs the keyed indexer |
//! | `tx_search` | Sorted by `(height, index)` then paginated (default 30, max 100) |
//! | `consensus_state` | Latest round state snapshot |
//! | `subscribe_events` | Live bus subscription with a cancel handle |
//!
//! ## Usage
//!
//! ```ignore
//! let node = LocalNode::bootstrap(NodeConfig::from_env(), collaborators).await?;
//! let hits = node.tx_search("transfer.sender = 'alice'", Some(1), Some(30), "desc")?;
//! node.stop().await;
//! ```

// Nursery lints that are too strict
#![allow(clippy::missing_const_for_fn)]
// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]
#![cfg_attr(test, allow(clippy::panic))]

pub mod adapters;
pub mod config;
pub mod domain;
pub mod lifecycle;
pub mod logging;
pub mod ports;
pub mod service;

// Re-export main types
pub use config::{
    ConfigError, EventBusConfig, IndexerKind, LoggingConfig, NodeConfig, TxIndexConfig,
};
pub use domain::*;
pub use lifecycle::{Collaborators, LocalNode};
pub use logging::{init_logging, LoggingError};
pub use ports::inbound::LocalNodeApi;
pub use ports::outbound::{
    BlockIndex, BlockIndexer, BlockStore, ConsensusReader, DbProvider, GenesisProvider,
    KeyValueStore, StateStore, TxIndex, TxIndexer,
};
pub use service::{LocalQueryDependencies, LocalQueryService};
