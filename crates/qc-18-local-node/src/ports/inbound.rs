//! # Inbound Ports (Driving Ports)
//!
//! The query surface exposed to applications embedding a local node.

use crate::domain::entities::{
    ResultBlock, ResultBlockResults, ResultTxSearch, ResultValidators, TxResponse,
};
use crate::domain::errors::QueryError;
use shared_bus::{CancelHandle, EventStream};
use shared_types::{GenesisDoc, Height, RoundStateSimple};

/// Read-only queries against a local node.
///
/// Every height parameter is optional; `None` means the latest committed
/// height. Explicit heights must lie in `[base, latest]`.
pub trait LocalNodeApi: Send + Sync {
    /// The genesis document loaded at bootstrap.
    fn genesis(&self) -> Result<GenesisDoc, QueryError>;

    /// Latest committed height.
    fn latest_height(&self) -> Result<Height, QueryError>;

    fn chain_id(&self) -> Result<String, QueryError>;

    /// Validator set at `height`.
    fn validators(&self, height: Option<Height>) -> Result<ResultValidators, QueryError>;

    /// Block at `height`.
    ///
    /// ## Errors
    ///
    /// - Height resolution errors
    /// - `NotFound` if the store has no block body at the resolved height
    fn block(&self, height: Option<Height>) -> Result<ResultBlock, QueryError>;

    /// Execution results recorded for `height`.
    fn block_results(&self, height: Option<Height>) -> Result<ResultBlockResults, QueryError>;

    /// Look up one transaction by hex hash (case-insensitive).
    ///
    /// ## Errors
    ///
    /// - `IndexingDisabled` before touching any store when indexing is off
    /// - `DecodeError` for malformed hex or a payload that fails to decode
    /// - `NotFound` if the indexer has no such transaction
    fn tx(&self, hash: &str) -> Result<TxResponse, QueryError>;

    /// Resolve every transaction of `block` in block order. Fails fast.
    fn txs(&self, block: &ResultBlock) -> Result<Vec<TxResponse>, QueryError>;

    /// Search indexed transactions.
    ///
    /// The full match set is sorted by `(height, index)` in `order_by`
    /// direction (`""`/`"asc"`/`"desc"`) before the requested page is cut.
    fn tx_search(
        &self,
        query: &str,
        page: Option<i64>,
        per_page: Option<i64>,
        order_by: &str,
    ) -> Result<ResultTxSearch, QueryError>;

    /// Current consensus round state.
    fn consensus_state(&self) -> Result<RoundStateSimple, QueryError>;

    /// Subscribe `subscriber` to bus events matching `query`.
    ///
    /// The stream ends once the handle is cancelled, the subscriber lags,
    /// or the bus closes.
    fn subscribe_events(
        &self,
        subscriber: &str,
        query: &str,
    ) -> Result<(EventStream, CancelHandle), QueryError>;

    /// Shorthand for `subscribe_events(subscriber, "tm.event = 'NewBlock'")`.
    fn subscribe_new_blocks(
        &self,
        subscriber: &str,
    ) -> Result<(EventStream, CancelHandle), QueryError>;
}
