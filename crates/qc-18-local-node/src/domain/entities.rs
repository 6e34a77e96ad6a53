//! # Query Results
//!
//! Values returned by the facade. All are computed fresh per call.

use serde::{Deserialize, Serialize};
use shared_types::{
    hash_to_hex, Block, BlockId, ConsensusParams, Event, ExecTxResult, Height, IndexedTx,
    Transaction, Validator, ValidatorUpdate,
};

/// A block together with its identifier.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultBlock {
    /// Empty when the store holds no metadata for the block.
    pub block_id: BlockId,
    pub block: Block,
}

/// Validator set at a height.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultValidators {
    pub block_height: Height,
    pub validators: Vec<Validator>,
    /// Validators in this response.
    pub count: usize,
    /// Validators in the set.
    pub total: usize,
}

/// Execution results recorded for a block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultBlockResults {
    pub height: Height,
    pub txs_results: Vec<ExecTxResult>,
    pub begin_block_events: Vec<Event>,
    pub end_block_events: Vec<Event>,
    pub validator_updates: Vec<ValidatorUpdate>,
    pub consensus_param_updates: Option<ConsensusParams>,
}

/// One transaction search hit as returned to callers.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultTx {
    /// Upper-case hex of the hash recomputed from `tx`.
    pub hash: String,
    pub height: Height,
    pub index: u32,
    pub tx_result: ExecTxResult,
    pub tx: Vec<u8>,
}

impl From<IndexedTx> for ResultTx {
    fn from(hit: IndexedTx) -> Self {
        Self {
            hash: hash_to_hex(&hit.hash()),
            height: hit.height,
            index: hit.index,
            tx_result: hit.result,
            tx: hit.tx,
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ResultTxSearch {
    pub txs: Vec<ResultTx>,
    /// Size of the full match set, not of this page.
    pub total_count: usize,
}

/// A fully resolved transaction: execution outcome, decoded payload and the
/// block that includes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxResponse {
    pub hash: String,
    pub height: Height,
    pub index: u32,
    pub result: ExecTxResult,
    pub tx: Transaction,
    pub block_id: BlockId,
    /// Unix seconds of the enclosing block.
    pub timestamp: u64,
}

impl TxResponse {
    #[must_use]
    pub fn is_successful(&self) -> bool {
        self.result.is_ok()
    }
}
