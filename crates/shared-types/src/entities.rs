//! # Core Domain Entities
//!
//! Defines the chain value objects exchanged between the local node's
//! storage, indexers, event bus and query facade.
//!
//! ## Clusters
//!
//! - **Chain**: `Block`, `BlockHeader`, `BlockId`, `BlockMeta`
//! - **Transactions**: `Transaction` (decoded payload), `IndexedTx` (indexer hit)
//! - **Execution**: `ExecTxResult`, `Event`, `ExecutionResults`
//! - **Validators**: `Validator`, `ValidatorSet`, `ValidatorUpdate`
//!
//! None of these types are produced by the facade itself; storage and the
//! indexers own them and the facade only forwards or reshapes them.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

use crate::errors::DecodeError;

// =============================================================================
// CLUSTER A: THE CHAIN
// =============================================================================

/// A 32-byte SHA-256 hash.
pub type Hash = [u8; 32];

/// A 20-byte validator/proposer address.
pub type Address = [u8; 20];

/// A committed chain height.
///
/// Signed on purpose: callers may hand in zero or negative heights and the
/// height resolver is expected to reject them rather than the type system.
pub type Height = i64;

/// Header of the part set a block was gossiped as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PartSetHeader {
    pub total: u32,
    pub hash: Hash,
}

/// Identifier of a committed block.
///
/// The default value (all zeros) is the "empty" identifier returned when
/// block metadata is unavailable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockId {
    pub hash: Hash,
    pub part_set_header: PartSetHeader,
}

impl BlockId {
    /// True for the zero-valued identifier.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// The header of a block containing metadata and root hashes.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockHeader {
    /// Chain this block belongs to.
    pub chain_id: String,
    /// Block height in the chain.
    pub height: Height,
    /// Unix timestamp (seconds) when the block was proposed.
    pub time: u64,
    /// Identifier of the previous block.
    pub last_block_id: BlockId,
    /// Hash over the block's transactions.
    pub data_hash: Hash,
    /// Hash of the validator set for this height.
    pub validators_hash: Hash,
    /// Application state hash after the previous block.
    pub app_hash: Hash,
    /// Address of the proposer.
    pub proposer_address: Address,
}

/// A committed block: header plus raw transaction bytes in block order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Block {
    pub header: BlockHeader,
    pub txs: Vec<Vec<u8>>,
}

impl Block {
    /// Hashes of every transaction in block order.
    #[must_use]
    pub fn tx_hashes(&self) -> Vec<Hash> {
        self.txs.iter().map(|tx| tx_hash(tx)).collect()
    }
}

/// Block metadata kept alongside the block body.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockMeta {
    pub block_id: BlockId,
    pub block_size: u64,
    pub header: BlockHeader,
    pub num_txs: u64,
}

// =============================================================================
// CLUSTER B: TRANSACTIONS
// =============================================================================

/// A single coin amount.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Coin {
    pub denom: String,
    pub amount: u128,
}

/// Fee paid by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Fee {
    pub amount: Vec<Coin>,
    pub gas_limit: u64,
    pub payer: Option<String>,
}

/// One message carried by a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TxMessage {
    /// Fully qualified message type, e.g. `/bank.v1.MsgSend`.
    pub type_url: String,
    /// Opaque message body.
    pub value: Vec<u8>,
}

/// Decoded transaction payload.
///
/// The raw bytes stored in blocks and in the indexer are the canonical
/// (`bincode`) encoding of this type, see [`Transaction::encode`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Transaction {
    pub messages: Vec<TxMessage>,
    pub memo: String,
    pub timeout_height: u64,
    pub fee: Fee,
    pub signatures: Vec<Vec<u8>>,
}

impl Transaction {
    /// Canonical byte encoding.
    pub fn encode(&self) -> Result<Vec<u8>, DecodeError> {
        bincode::serialize(self).map_err(|e| DecodeError::Encoding(e.to_string()))
    }

    /// Decode canonical bytes, rejecting trailing garbage.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let tx: Self =
            bincode::deserialize(bytes).map_err(|e| DecodeError::Payload(e.to_string()))?;
        let consumed = bincode::serialized_size(&tx)
            .map_err(|e| DecodeError::Payload(e.to_string()))?;
        if consumed != bytes.len() as u64 {
            return Err(DecodeError::Payload(format!(
                "{} trailing bytes after transaction",
                bytes.len() as u64 - consumed
            )));
        }
        Ok(tx)
    }
}

/// SHA-256 of raw transaction bytes.
#[must_use]
pub fn tx_hash(raw: &[u8]) -> Hash {
    Sha256::digest(raw).into()
}

/// Upper-case hex rendering used for transaction hashes everywhere.
#[must_use]
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode_upper(hash)
}

/// Parse a hex transaction hash (case-insensitive).
pub fn hash_from_hex(s: &str) -> Result<Hash, DecodeError> {
    let bytes = hex::decode(s).map_err(|e| DecodeError::Hash(e.to_string()))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| DecodeError::Hash(format!("expected 32 bytes, got {}", bytes.len())))
}

/// A transaction as stored by the transaction indexer.
///
/// This is the raw search hit: position in the chain, execution outcome and
/// the undecoded payload.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IndexedTx {
    pub height: Height,
    /// Position of the transaction within its block.
    pub index: u32,
    pub result: ExecTxResult,
    pub tx: Vec<u8>,
}

impl IndexedTx {
    /// Hash of the raw transaction bytes.
    #[must_use]
    pub fn hash(&self) -> Hash {
        tx_hash(&self.tx)
    }

    /// Chain position used for ordering: `(height, index)`.
    #[must_use]
    pub fn position(&self) -> (Height, u32) {
        (self.height, self.index)
    }

    /// Composite-key tags this transaction is searchable by.
    ///
    /// Always contains `tx.hash` and `tx.height`; every event attribute
    /// flagged for indexing contributes `<event type>.<key>`.
    #[must_use]
    pub fn tags(&self) -> BTreeMap<String, Vec<String>> {
        let mut tags = BTreeMap::new();
        tags.insert("tx.hash".to_string(), vec![hash_to_hex(&self.hash())]);
        tags.insert("tx.height".to_string(), vec![self.height.to_string()]);
        collect_event_tags(&self.result.events, &mut tags);
        tags
    }
}

/// Add `<type>.<key> -> value` for every indexed attribute.
pub fn collect_event_tags(events: &[Event], tags: &mut BTreeMap<String, Vec<String>>) {
    for event in events {
        if event.kind.is_empty() {
            continue;
        }
        for attr in event.attributes.iter().filter(|a| a.index && !a.key.is_empty()) {
            tags.entry(format!("{}.{}", event.kind, attr.key))
                .or_default()
                .push(attr.value.clone());
        }
    }
}

// =============================================================================
// CLUSTER C: EXECUTION RESULTS
// =============================================================================

/// A key/value attribute emitted by the application.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct EventAttribute {
    pub key: String,
    pub value: String,
    /// Whether indexers should make this attribute searchable.
    pub index: bool,
}

/// An application event.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Event {
    #[serde(rename = "type")]
    pub kind: String,
    pub attributes: Vec<EventAttribute>,
}

impl Event {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            attributes: Vec::new(),
        }
    }

    /// Builder-style helper adding an indexed attribute.
    #[must_use]
    pub fn with_attr(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.push(EventAttribute {
            key: key.into(),
            value: value.into(),
            index: true,
        });
        self
    }
}

/// Outcome of executing one transaction.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecTxResult {
    pub code: u32,
    pub data: Vec<u8>,
    pub log: String,
    pub info: String,
    pub gas_wanted: i64,
    pub gas_used: i64,
    pub events: Vec<Event>,
    pub codespace: String,
}

impl ExecTxResult {
    #[must_use]
    pub fn is_ok(&self) -> bool {
        self.code == 0
    }
}

/// Consensus parameter limits on blocks.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BlockParams {
    pub max_bytes: i64,
    pub max_gas: i64,
}

/// Consensus parameters (or updates to them).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ConsensusParams {
    pub block: Option<BlockParams>,
    pub evidence_max_age_num_blocks: Option<i64>,
    pub validator_pub_key_types: Vec<String>,
}

/// Voting power change emitted at end of block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorUpdate {
    pub pub_key: Vec<u8>,
    pub power: i64,
}

/// Recorded outcome of applying a whole block.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ExecutionResults {
    pub deliver_txs: Vec<ExecTxResult>,
    pub begin_block_events: Vec<Event>,
    pub end_block_events: Vec<Event>,
    pub validator_updates: Vec<ValidatorUpdate>,
    pub consensus_param_updates: Option<ConsensusParams>,
}

// =============================================================================
// CLUSTER D: VALIDATORS
// =============================================================================

/// A validator as known to the state store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Validator {
    pub address: Address,
    pub pub_key: Vec<u8>,
    pub voting_power: i64,
    pub proposer_priority: i64,
}

/// The validator set active at some height.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidatorSet {
    pub validators: Vec<Validator>,
    pub proposer: Option<Validator>,
}

impl ValidatorSet {
    #[must_use]
    pub fn total_voting_power(&self) -> i64 {
        self.validators.iter().map(|v| v.voting_power).sum()
    }
}
