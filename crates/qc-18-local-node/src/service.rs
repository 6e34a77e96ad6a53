//! # Local Query Service
//!
//! Implements [`LocalNodeApi`] over injected stores, the tx indexer, the
//! consensus reader and the event bus.
//!
//! ## Architecture
//!
//! The service holds only shared handles and never caches query results:
//! every call reads the collaborators' current state. Queries may run
//! concurrently; no locks are held across calls.
//!
//! ```text
//! tx_search: parse query → parse order → search → sort → paginate
//! tx:        indexer check → hex decode → get → block linkage → decode
//! ```

use crate::domain::entities::{
    ResultBlock, ResultBlockResults, ResultTx, ResultTxSearch, ResultValidators, TxResponse,
};
use crate::domain::errors::{QueryError, Stage};
use crate::domain::height::resolve_height;
use crate::domain::ordering::{sort_hits, OrderBy};
use crate::domain::pagination::{compute_skip, normalize_per_page, page_len, resolve_page};
use crate::ports::inbound::LocalNodeApi;
use crate::ports::outbound::{BlockStore, ConsensusReader, StateStore, TxIndexer};
use shared_bus::{
    CancelHandle, EventFilter, EventStream, EventType, InMemoryEventBus, Query, EVENT_TYPE_KEY,
};
use shared_types::{
    hash_from_hex, hash_to_hex, tx_hash, GenesisDoc, Height, RoundStateSimple, Transaction,
};
use std::sync::Arc;
use tracing::{debug, instrument};

/// Dependencies for [`LocalQueryService`].
pub struct LocalQueryDependencies {
    pub block_store: Arc<dyn BlockStore>,
    pub state_store: Arc<dyn StateStore>,
    pub consensus: Arc<dyn ConsensusReader>,
    pub tx_indexer: TxIndexer,
    pub bus: Arc<InMemoryEventBus>,
    /// Loaded once at bootstrap.
    pub genesis: GenesisDoc,
}

/// Read-only query service.
pub struct LocalQueryService {
    block_store: Arc<dyn BlockStore>,
    state_store: Arc<dyn StateStore>,
    consensus: Arc<dyn ConsensusReader>,
    tx_indexer: TxIndexer,
    bus: Arc<InMemoryEventBus>,
    genesis: GenesisDoc,
}

impl LocalQueryService {
    pub fn new(deps: LocalQueryDependencies) -> Self {
        Self {
            block_store: deps.block_store,
            state_store: deps.state_store,
            consensus: deps.consensus,
            tx_indexer: deps.tx_indexer,
            bus: deps.bus,
            genesis: deps.genesis,
        }
    }

    pub fn tx_indexer(&self) -> &TxIndexer {
        &self.tx_indexer
    }

    /// Resolve against the block store's current bounds.
    fn resolve(&self, requested: Option<Height>) -> Result<Height, QueryError> {
        resolve_height(self.block_store.height(), self.block_store.base(), requested)
    }
}

impl LocalNodeApi for LocalQueryService {
    fn genesis(&self) -> Result<GenesisDoc, QueryError> {
        Ok(self.genesis.clone())
    }

    fn latest_height(&self) -> Result<Height, QueryError> {
        Ok(self.block_store.height())
    }

    fn chain_id(&self) -> Result<String, QueryError> {
        Ok(self.genesis.chain_id.clone())
    }

    fn validators(&self, height: Option<Height>) -> Result<ResultValidators, QueryError> {
        let height = self.resolve(height)?;
        let set = self
            .state_store
            .load_validators(height)
            .map_err(|e| QueryError::upstream(Stage::StateStore, e))?;

        let count = set.validators.len();
        Ok(ResultValidators {
            block_height: height,
            validators: set.validators,
            count,
            total: count,
        })
    }

    fn block(&self, height: Option<Height>) -> Result<ResultBlock, QueryError> {
        let height = self.resolve(height)?;
        let block = self.block_store.load_block(height).ok_or_else(|| {
            QueryError::not_found(Stage::BlockStore, format!("block at height {}", height))
        })?;

        let block_id = match self.block_store.load_block_meta(height) {
            Some(meta) => meta.block_id,
            None => {
                debug!(height, "No block meta, returning empty block id");
                Default::default()
            }
        };
        Ok(ResultBlock { block_id, block })
    }

    fn block_results(&self, height: Option<Height>) -> Result<ResultBlockResults, QueryError> {
        let height = self.resolve(height)?;
        let results = self
            .state_store
            .load_execution_results(height)
            .map_err(|e| QueryError::upstream(Stage::StateStore, e))?
            .ok_or_else(|| {
                QueryError::not_found(Stage::StateStore, format!("results for height {}", height))
            })?;

        Ok(ResultBlockResults {
            height,
            txs_results: results.deliver_txs,
            begin_block_events: results.begin_block_events,
            end_block_events: results.end_block_events,
            validator_updates: results.validator_updates,
            consensus_param_updates: results.consensus_param_updates,
        })
    }

    #[instrument(skip(self), level = "debug")]
    fn tx(&self, hash: &str) -> Result<TxResponse, QueryError> {
        if !self.tx_indexer.is_enabled() {
            return Err(QueryError::IndexingDisabled);
        }

        let key = hash_from_hex(hash).map_err(|e| QueryError::decode("tx hash", e))?;
        let hit = self
            .tx_indexer
            .get(&key)
            .map_err(|e| QueryError::upstream(Stage::Indexer, e))?
            .ok_or_else(|| QueryError::not_found(Stage::Indexer, format!("tx {}", hash)))?;

        let block = self.block(Some(hit.height))?;
        let tx = Transaction::decode(&hit.tx).map_err(|e| QueryError::decode("tx", e))?;

        Ok(TxResponse {
            hash: hash_to_hex(&key),
            height: hit.height,
            index: hit.index,
            result: hit.result,
            tx,
            block_id: block.block_id,
            timestamp: block.block.header.time,
        })
    }

    fn txs(&self, block: &ResultBlock) -> Result<Vec<TxResponse>, QueryError> {
        block
            .block
            .txs
            .iter()
            .map(|raw| self.tx(&hash_to_hex(&tx_hash(raw))))
            .collect()
    }

    #[instrument(skip(self), level = "debug")]
    fn tx_search(
        &self,
        query: &str,
        page: Option<i64>,
        per_page: Option<i64>,
        order_by: &str,
    ) -> Result<ResultTxSearch, QueryError> {
        let query = Query::parse(query)?;
        let order = OrderBy::parse(order_by)?;

        let mut hits = self
            .tx_indexer
            .search(&query)
            .map_err(|e| QueryError::upstream(Stage::Indexer, e))?;
        sort_hits(&mut hits, order);

        let total_count = hits.len();
        let per_page = normalize_per_page(per_page);
        let page = resolve_page(page, per_page, total_count)?;
        let skip = compute_skip(page, per_page);
        let len = page_len(total_count, skip, per_page);

        debug!(total_count, page, per_page, "Tx search resolved");
        let txs = hits
            .into_iter()
            .skip(skip)
            .take(len)
            .map(ResultTx::from)
            .collect();
        Ok(ResultTxSearch { txs, total_count })
    }

    fn consensus_state(&self) -> Result<RoundStateSimple, QueryError> {
        let bytes = self
            .consensus
            .round_state_snapshot()
            .map_err(|e| QueryError::upstream(Stage::Consensus, e))?;
        RoundStateSimple::from_json(&bytes).map_err(|e| QueryError::decode("round state", e))
    }

    fn subscribe_events(
        &self,
        subscriber: &str,
        query: &str,
    ) -> Result<(EventStream, CancelHandle), QueryError> {
        let query = Query::parse(query)?;
        let subscription = self.bus.subscribe(subscriber, EventFilter::query(query))?;
        let handle = subscription.cancel_handle();
        debug!(subscriber, query = %subscription.filter().key(), "Subscribed");
        Ok((subscription.into_stream(), handle))
    }

    fn subscribe_new_blocks(
        &self,
        subscriber: &str,
    ) -> Result<(EventStream, CancelHandle), QueryError> {
        let query = format!("{} = '{}'", EVENT_TYPE_KEY, EventType::NewBlock);
        self.subscribe_events(subscriber, &query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{
        InMemoryBlockStore, InMemoryKVStore, InMemoryStateStore, KvTxIndex,
        SnapshotConsensusReader,
    };
    use crate::ports::outbound::TxIndex;
    use shared_types::{
        Block, BlockHeader, BlockId, BlockMeta, Event, ExecTxResult, ExecutionResults, IndexedTx,
        Validator, ValidatorSet,
    };

    struct Fixture {
        blocks: Arc<InMemoryBlockStore>,
        state: Arc<InMemoryStateStore>,
        consensus: Arc<SnapshotConsensusReader>,
        index: Arc<KvTxIndex>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                blocks: Arc::new(InMemoryBlockStore::new()),
                state: Arc::new(InMemoryStateStore::new()),
                consensus: Arc::new(SnapshotConsensusReader::new()),
                index: Arc::new(KvTxIndex::new(Arc::new(InMemoryKVStore::new()))),
            }
        }

        fn service(&self, indexed: bool) -> LocalQueryService {
            let tx_indexer = if indexed {
                TxIndexer::Keyed(self.index.clone())
            } else {
                TxIndexer::Null
            };
            LocalQueryService::new(LocalQueryDependencies {
                block_store: self.blocks.clone(),
                state_store: self.state.clone(),
                consensus: self.consensus.clone(),
                tx_indexer,
                bus: Arc::new(InMemoryEventBus::new()),
                genesis: GenesisDoc {
                    chain_id: "test-chain".into(),
                    initial_height: 1,
                    ..Default::default()
                },
            })
        }

        /// Commit a block carrying `memos` as transactions and index them.
        fn commit(&self, height: Height, memos: &[&str], with_meta: bool) -> Vec<Vec<u8>> {
            let raws: Vec<Vec<u8>> = memos
                .iter()
                .map(|memo| {
                    Transaction {
                        memo: (*memo).to_string(),
                        ..Default::default()
                    }
                    .encode()
                    .unwrap()
                })
                .collect();
            let block = Block {
                header: BlockHeader {
                    chain_id: "test-chain".into(),
                    height,
                    time: 1_700_000_000 + height as u64,
                    ..Default::default()
                },
                txs: raws.clone(),
            };
            let meta = with_meta.then(|| BlockMeta {
                block_id: BlockId {
                    hash: [height as u8; 32],
                    ..Default::default()
                },
                header: block.header.clone(),
                num_txs: raws.len() as u64,
                ..Default::default()
            });
            self.blocks.save_block(block, meta);

            for (i, raw) in raws.iter().enumerate() {
                self.index
                    .index(&IndexedTx {
                        height,
                        index: i as u32,
                        result: ExecTxResult {
                            events: vec![Event::new("transfer").with_attr("sender", "alice")],
                            ..Default::default()
                        },
                        tx: raw.clone(),
                    })
                    .unwrap();
            }
            raws
        }
    }

    #[test]
    fn test_genesis_and_chain_id() {
        let fx = Fixture::new();
        let service = fx.service(true);
        assert_eq!(service.chain_id().unwrap(), "test-chain");
        assert_eq!(service.genesis().unwrap().initial_height, 1);
    }

    #[test]
    fn test_block_height_resolution() {
        let fx = Fixture::new();
        fx.commit(1, &[], true);
        fx.commit(2, &[], true);
        let service = fx.service(true);

        assert_eq!(service.latest_height().unwrap(), 2);
        assert_eq!(service.block(None).unwrap().block.header.height, 2);
        assert_eq!(
            service.block(Some(0)),
            Err(QueryError::InvalidHeight { height: 0 })
        );
        assert_eq!(
            service.block(Some(3)),
            Err(QueryError::HeightOutOfRange {
                requested: 3,
                latest: 2
            })
        );

        fx.blocks.prune_to(2);
        assert_eq!(
            service.block(Some(1)),
            Err(QueryError::HeightPruned {
                requested: 1,
                base: 2
            })
        );
    }

    #[test]
    fn test_block_without_meta_has_empty_id() {
        let fx = Fixture::new();
        fx.commit(1, &[], false);
        let result = fx.service(true).block(Some(1)).unwrap();
        assert!(result.block_id.is_empty());
        assert_eq!(result.block.header.height, 1);
    }

    #[test]
    fn test_validators_count_equals_total() {
        let fx = Fixture::new();
        fx.commit(1, &[], true);
        fx.state.save_validators(
            1,
            ValidatorSet {
                validators: vec![Validator::default(), Validator::default()],
                proposer: None,
            },
        );
        let result = fx.service(true).validators(None).unwrap();
        assert_eq!(result.block_height, 1);
        assert_eq!(result.count, 2);
        assert_eq!(result.total, 2);
    }

    #[test]
    fn test_block_results_not_found() {
        let fx = Fixture::new();
        fx.commit(1, &[], true);
        let service = fx.service(true);
        let err = service.block_results(Some(1)).unwrap_err();
        assert_eq!(err.stage(), Stage::StateStore);

        fx.state.save_execution_results(
            1,
            ExecutionResults {
                deliver_txs: vec![ExecTxResult::default()],
                ..Default::default()
            },
        );
        assert_eq!(service.block_results(Some(1)).unwrap().txs_results.len(), 1);
    }

    #[test]
    fn test_tx_lookup() {
        let fx = Fixture::new();
        let raws = fx.commit(1, &["hello"], true);
        let service = fx.service(true);

        let hash = hash_to_hex(&tx_hash(&raws[0]));
        let response = service.tx(&hash.to_lowercase()).unwrap();
        assert_eq!(response.hash, hash);
        assert_eq!(response.tx.memo, "hello");
        assert_eq!(response.timestamp, 1_700_000_001);
        assert!(!response.block_id.is_empty());
        assert!(response.is_successful());
    }

    #[test]
    fn test_tx_errors() {
        let fx = Fixture::new();
        fx.commit(1, &["hello"], true);
        let service = fx.service(true);

        assert!(matches!(
            service.tx("zz"),
            Err(QueryError::DecodeError { .. })
        ));
        assert!(matches!(
            service.tx("abcd"),
            Err(QueryError::DecodeError { .. })
        ));
        let missing = hash_to_hex(&[7u8; 32]);
        let err = service.tx(&missing).unwrap_err();
        assert_eq!(err.to_string(), format!("tx {} not found", missing));
        assert_eq!(err.stage(), Stage::Indexer);
    }

    #[test]
    fn test_null_indexer() {
        let fx = Fixture::new();
        fx.commit(1, &["hello"], true);
        let service = fx.service(false);

        assert_eq!(service.tx("not even hex"), Err(QueryError::IndexingDisabled));
        let result = service
            .tx_search("tx.height = 1", None, None, "")
            .unwrap();
        assert_eq!(result.total_count, 0);
        assert!(result.txs.is_empty());
    }

    #[test]
    fn test_txs_in_block_order() {
        let fx = Fixture::new();
        fx.commit(1, &["a", "b", "c"], true);
        let service = fx.service(true);

        let block = service.block(Some(1)).unwrap();
        let memos: Vec<_> = service
            .txs(&block)
            .unwrap()
            .into_iter()
            .map(|r| r.tx.memo)
            .collect();
        assert_eq!(memos, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_tx_search_pages_and_order() {
        let fx = Fixture::new();
        fx.commit(1, &["a", "b", "c", "d"], true);
        fx.commit(2, &["e", "f", "g"], true);
        let service = fx.service(true);
        let query = "transfer.sender = 'alice'";

        let page2 = service.tx_search(query, Some(2), Some(3), "asc").unwrap();
        assert_eq!(page2.total_count, 7);
        let positions: Vec<_> = page2.txs.iter().map(|t| (t.height, t.index)).collect();
        assert_eq!(positions, vec![(1, 3), (2, 0), (2, 1)]);

        let desc = service.tx_search(query, Some(1), Some(3), "desc").unwrap();
        let positions: Vec<_> = desc.txs.iter().map(|t| (t.height, t.index)).collect();
        assert_eq!(positions, vec![(2, 2), (2, 1), (2, 0)]);

        let last = service.tx_search(query, Some(3), Some(3), "").unwrap();
        assert_eq!(last.txs.len(), 1);

        assert_eq!(
            service.tx_search(query, Some(4), Some(3), "asc"),
            Err(QueryError::PageOutOfRange { page: 4, pages: 3 })
        );
        for hit in &page2.txs {
            assert_eq!(hit.hash, hash_to_hex(&tx_hash(&hit.tx)));
        }
    }

    #[test]
    fn test_tx_search_sparse_heights() {
        let fx = Fixture::new();
        fx.commit(1, &["h1-0", "h1-1"], true);
        fx.commit(2, &["h2-0"], true);
        fx.commit(3, &["h3-0", "h3-1", "h3-2"], true);
        fx.commit(4, &[], true);
        fx.commit(5, &["h5-0"], true);
        let service = fx.service(true);
        let query = "transfer.sender = 'alice'";
        let positions = |result: &ResultTxSearch| -> Vec<(Height, u32)> {
            result.txs.iter().map(|t| (t.height, t.index)).collect()
        };

        let page2 = service.tx_search(query, Some(2), Some(3), "asc").unwrap();
        assert_eq!(page2.total_count, 7);
        assert_eq!(positions(&page2), vec![(3, 0), (3, 1), (3, 2)]);

        let desc = service.tx_search(query, Some(1), Some(3), "desc").unwrap();
        assert_eq!(desc.total_count, 7);
        assert_eq!(positions(&desc), vec![(5, 0), (3, 2), (3, 1)]);

        let all = service.tx_search(query, None, None, "").unwrap();
        assert_eq!(
            positions(&all),
            vec![(1, 0), (1, 1), (2, 0), (3, 0), (3, 1), (3, 2), (5, 0)]
        );

        assert_eq!(
            service.tx_search(query, Some(1), Some(3), "bogus"),
            Err(QueryError::InvalidOrderBy {
                given: "bogus".into()
            })
        );
    }

    #[test]
    fn test_tx_search_rejects_bad_input() {
        let fx = Fixture::new();
        let service = fx.service(true);

        assert!(matches!(
            service.tx_search("", None, None, ""),
            Err(QueryError::QueryParseError(_))
        ));
        let err = service
            .tx_search("tx.height = 1", None, None, "sideways")
            .unwrap_err();
        assert_eq!(err.stage(), Stage::Ordering);
        assert!(err
            .to_string()
            .contains("expected order_by to be either `asc` or `desc` or empty"));
    }

    #[test]
    fn test_consensus_state() {
        let fx = Fixture::new();
        let service = fx.service(true);
        assert_eq!(
            service.consensus_state().unwrap_err().stage(),
            Stage::Consensus
        );

        fx.consensus.set_snapshot(b"{broken".to_vec());
        assert!(matches!(
            service.consensus_state(),
            Err(QueryError::DecodeError { .. })
        ));

        let state = RoundStateSimple {
            height_round_step: "3/0/2".into(),
            ..Default::default()
        };
        fx.consensus.set_round_state(&state).unwrap();
        assert_eq!(service.consensus_state().unwrap(), state);
    }

    #[test]
    fn test_duplicate_subscription_is_event_bus_error() {
        let fx = Fixture::new();
        let service = fx.service(true);
        let (_stream, _handle) = service.subscribe_new_blocks("client").unwrap();
        let err = service
            .subscribe_events("client", "tm.event='NewBlock'")
            .unwrap_err();
        assert_eq!(err.stage(), Stage::EventBus);
        assert!(err.to_string().contains("already subscribed"));
    }
}
