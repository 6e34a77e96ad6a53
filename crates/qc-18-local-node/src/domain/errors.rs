//! # Domain Errors
//!
//! Error types for the local node facade.
//!
//! ## Design Principles
//!
//! - Every query failure names the stage that produced it
//! - Collaborator failures are wrapped verbatim, never reinterpreted
//! - No panics in query paths (use Result instead)

use shared_bus::{QueryParseError, SubscriptionError};
use shared_types::Height;
use std::fmt;
use thiserror::Error;

/// Pipeline stage a query error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    HeightResolution,
    Pagination,
    Ordering,
    QueryParse,
    Indexer,
    BlockStore,
    StateStore,
    Decode,
    Consensus,
    EventBus,
    Lifecycle,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::HeightResolution => "height resolution",
            Stage::Pagination => "pagination",
            Stage::Ordering => "ordering",
            Stage::QueryParse => "query parse",
            Stage::Indexer => "tx indexer",
            Stage::BlockStore => "block store",
            Stage::StateStore => "state store",
            Stage::Decode => "decode",
            Stage::Consensus => "consensus",
            Stage::EventBus => "event bus",
            Stage::Lifecycle => "lifecycle",
        };
        f.write_str(name)
    }
}

/// Errors returned by facade queries.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryError {
    #[error("height must be greater than 0, but got {height}")]
    InvalidHeight { height: Height },

    #[error("height {requested} must be less than or equal to the current blockchain height {latest}")]
    HeightOutOfRange { requested: Height, latest: Height },

    #[error("height {requested} is not available, lowest height is {base}")]
    HeightPruned { requested: Height, base: Height },

    #[error("page should be within [1, {pages}] range, given {page}")]
    PageOutOfRange { page: i64, pages: usize },

    #[error("expected order_by to be either `asc` or `desc` or empty, got {given:?}")]
    InvalidOrderBy { given: String },

    #[error("transaction indexing is disabled")]
    IndexingDisabled,

    #[error("{what} not found")]
    NotFound { stage: Stage, what: String },

    #[error("failed to decode {what}: {message}")]
    DecodeError { what: &'static str, message: String },

    #[error(transparent)]
    QueryParseError(#[from] QueryParseError),

    #[error("{stage} failed: {message}")]
    Upstream { stage: Stage, message: String },

    #[error("local node is not running")]
    NotRunning,
}

impl QueryError {
    /// Wrap a collaborator failure.
    pub fn upstream(stage: Stage, err: impl fmt::Display) -> Self {
        QueryError::Upstream {
            stage,
            message: err.to_string(),
        }
    }

    pub fn not_found(stage: Stage, what: impl Into<String>) -> Self {
        QueryError::NotFound {
            stage,
            what: what.into(),
        }
    }

    pub fn decode(what: &'static str, err: impl fmt::Display) -> Self {
        QueryError::DecodeError {
            what,
            message: err.to_string(),
        }
    }

    /// Stage that produced this error.
    #[must_use]
    pub fn stage(&self) -> Stage {
        match self {
            QueryError::InvalidHeight { .. }
            | QueryError::HeightOutOfRange { .. }
            | QueryError::HeightPruned { .. } => Stage::HeightResolution,
            QueryError::PageOutOfRange { .. } => Stage::Pagination,
            QueryError::InvalidOrderBy { .. } => Stage::Ordering,
            QueryError::IndexingDisabled => Stage::Indexer,
            QueryError::NotFound { stage, .. } | QueryError::Upstream { stage, .. } => *stage,
            QueryError::DecodeError { .. } => Stage::Decode,
            QueryError::QueryParseError(_) => Stage::QueryParse,
            QueryError::NotRunning => Stage::Lifecycle,
        }
    }
}

impl From<SubscriptionError> for QueryError {
    fn from(err: SubscriptionError) -> Self {
        QueryError::upstream(Stage::EventBus, err)
    }
}

/// Key-value store errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KVStoreError {
    /// I/O error during read/write.
    IOError { message: String },
    /// Data corruption in the store.
    CorruptionError { message: String },
    /// No database registered under this id.
    UnknownDatabase { id: String },
}

impl fmt::Display for KVStoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KVStoreError::IOError { message } => write!(f, "KV store I/O error: {}", message),
            KVStoreError::CorruptionError { message } => {
                write!(f, "KV store corruption: {}", message)
            }
            KVStoreError::UnknownDatabase { id } => write!(f, "unknown database {:?}", id),
        }
    }
}

impl std::error::Error for KVStoreError {}

/// Block and state store errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("no validator set recorded for height {height}")]
    ValidatorsMissing { height: Height },

    #[error("corrupt record at height {height}: {message}")]
    Corrupt { height: Height, message: String },

    #[error("store I/O error: {0}")]
    Io(String),
}

/// Transaction and block indexer errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IndexerError {
    #[error(transparent)]
    Store(#[from] KVStoreError),

    #[error("indexer codec error: {0}")]
    Codec(String),

    #[error("transaction at height {height} index {index} has an empty payload")]
    EmptyTx { height: Height, index: u32 },
}

/// Consensus reader errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConsensusError {
    #[error("consensus state unavailable: {0}")]
    Unavailable(String),
}

/// Genesis provider errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenesisError {
    #[error("failed to read genesis file {path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid genesis document: {0}")]
    Invalid(String),
}

/// Bootstrap step a lifecycle error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Config,
    Genesis,
    Database,
    IndexerService,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Config => "config",
            BootstrapStage::Genesis => "genesis",
            BootstrapStage::Database => "database",
            BootstrapStage::IndexerService => "indexer service",
        };
        f.write_str(name)
    }
}

/// Lifecycle failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LifecycleError {
    #[error("bootstrap failed at {stage}: {message}")]
    Bootstrap {
        stage: BootstrapStage,
        message: String,
    },
}

impl LifecycleError {
    pub fn bootstrap(stage: BootstrapStage, err: impl fmt::Display) -> Self {
        LifecycleError::Bootstrap {
            stage,
            message: err.to_string(),
        }
    }

    #[must_use]
    pub fn stage(&self) -> BootstrapStage {
        match self {
            LifecycleError::Bootstrap { stage, .. } => *stage,
        }
    }
}
