//! # Local Node Lifecycle
//!
//! Wires collaborators into a running node and tears it down again.
//!
//! ## Bootstrap Order
//!
//! 1. Validate configuration
//! 2. Load the genesis document
//! 3. Create the event bus
//! 4. Open indexer databases (keyed indexer only)
//! 5. Attach and spawn the indexer service
//!
//! Any failure aborts the whole bootstrap: no node is returned and nothing
//! keeps running.

use crate::adapters::indexer_service::{IndexerService, IndexerStats};
use crate::adapters::{KvBlockIndex, KvTxIndex};
use crate::config::{IndexerKind, NodeConfig};
use crate::domain::entities::{
    ResultBlock, ResultBlockResults, ResultTxSearch, ResultValidators, TxResponse,
};
use crate::domain::errors::{BootstrapStage, LifecycleError, QueryError};
use crate::domain::value_objects::NodeState;
use crate::ports::inbound::LocalNodeApi;
use crate::ports::outbound::{
    BlockIndexer, BlockStore, ConsensusReader, DbProvider, GenesisProvider, StateStore,
    TxIndexer, BLOCK_INDEX_DB, TX_INDEX_DB,
};
use crate::service::{LocalQueryDependencies, LocalQueryService};
use parking_lot::{Mutex, RwLock};
use shared_bus::{CancelHandle, EventStream, InMemoryEventBus};
use shared_types::{GenesisDoc, Height, RoundStateSimple};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Collaborators a node is built from.
pub struct Collaborators {
    pub block_store: Arc<dyn BlockStore>,
    pub state_store: Arc<dyn StateStore>,
    pub consensus: Arc<dyn ConsensusReader>,
    pub genesis: Arc<dyn GenesisProvider>,
    pub db_provider: Arc<dyn DbProvider>,
}

/// A bootstrapped local node.
///
/// Queries are served only while the node is [`NodeState::Running`]; after
/// [`stop`](Self::stop) every query fails with `NotRunning`.
pub struct LocalNode {
    config: NodeConfig,
    service: LocalQueryService,
    bus: Arc<InMemoryEventBus>,
    block_indexer: BlockIndexer,
    state: RwLock<NodeState>,
    shutdown_tx: watch::Sender<bool>,
    indexer_task: Mutex<Option<JoinHandle<()>>>,
    indexer_stats: Arc<IndexerStats>,
}

impl LocalNode {
    /// Bring a node up from `config` and its collaborators.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn bootstrap(
        config: NodeConfig,
        collaborators: Collaborators,
    ) -> Result<Self, LifecycleError> {
        let mut state = NodeState::default();
        transition(&mut state, NodeState::Bootstrapping);
        info!(home = %config.home.display(), indexer = %config.tx_index.indexer, "Bootstrapping local node");

        config
            .validate()
            .map_err(|e| LifecycleError::bootstrap(BootstrapStage::Config, e))?;

        let genesis = collaborators
            .genesis
            .genesis_doc()
            .map_err(|e| LifecycleError::bootstrap(BootstrapStage::Genesis, e))?;
        info!(chain_id = %genesis.chain_id, initial_height = genesis.initial_height, "Genesis loaded");

        let bus = Arc::new(InMemoryEventBus::with_capacity(config.event_bus.capacity));
        debug!(capacity = bus.capacity(), "Event bus created");

        let (tx_indexer, block_indexer) =
            match open_indexers(config.tx_index.indexer, collaborators.db_provider.as_ref()) {
                Ok(indexers) => indexers,
                Err(e) => {
                    bus.close();
                    return Err(e);
                }
            };

        let indexer = match IndexerService::new(tx_indexer.clone(), block_indexer.clone(), &bus) {
            Ok(indexer) => indexer,
            Err(e) => {
                bus.close();
                return Err(LifecycleError::bootstrap(BootstrapStage::IndexerService, e));
            }
        };
        let indexer_stats = indexer.stats();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let indexer_task = indexer.spawn(shutdown_rx);

        let service = LocalQueryService::new(LocalQueryDependencies {
            block_store: collaborators.block_store,
            state_store: collaborators.state_store,
            consensus: collaborators.consensus,
            tx_indexer,
            bus: Arc::clone(&bus),
            genesis,
        });

        transition(&mut state, NodeState::Running);
        info!("Local node running");

        Ok(Self {
            config,
            service,
            bus,
            block_indexer,
            state: RwLock::new(state),
            shutdown_tx,
            indexer_task: Mutex::new(Some(indexer_task)),
            indexer_stats,
        })
    }

    /// Stop the indexer service and close the bus.
    ///
    /// Idempotent. Subscriptions end and their cancel handles stay usable.
    pub async fn stop(&self) {
        {
            let mut state = self.state.write();
            if !state.is_running() {
                debug!(state = %*state, "Stop requested on a node that is not running");
                return;
            }
            transition(&mut state, NodeState::Stopped);
        }
        info!("Initiating local node shutdown...");

        if self.shutdown_tx.send(true).is_err() {
            debug!("Indexer service already exited");
        }
        self.bus.close();

        let task = self.indexer_task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Indexer service task failed");
            }
        }
        info!("Local node stopped");
    }

    pub fn state(&self) -> NodeState {
        *self.state.read()
    }

    pub fn config(&self) -> &NodeConfig {
        &self.config
    }

    /// The bus the host publishes committed-block events on.
    pub fn bus(&self) -> Arc<InMemoryEventBus> {
        Arc::clone(&self.bus)
    }

    pub fn tx_indexer(&self) -> &TxIndexer {
        self.service.tx_indexer()
    }

    pub fn block_indexer(&self) -> &BlockIndexer {
        &self.block_indexer
    }

    pub fn indexer_stats(&self) -> Arc<IndexerStats> {
        Arc::clone(&self.indexer_stats)
    }

    fn running(&self) -> Result<&LocalQueryService, QueryError> {
        if self.state.read().is_running() {
            Ok(&self.service)
        } else {
            Err(QueryError::NotRunning)
        }
    }
}

fn transition(state: &mut NodeState, next: NodeState) {
    debug_assert!(state.can_transition_to(next), "{} -> {}", state, next);
    debug!(from = %state, to = %next, "Node state transition");
    *state = next;
}

fn open_indexers(
    kind: IndexerKind,
    provider: &dyn DbProvider,
) -> Result<(TxIndexer, BlockIndexer), LifecycleError> {
    match kind {
        IndexerKind::Null => {
            info!("Transaction indexing disabled");
            Ok((TxIndexer::Null, BlockIndexer::Null))
        }
        IndexerKind::Kv => {
            let tx_db = provider
                .open(TX_INDEX_DB)
                .map_err(|e| LifecycleError::bootstrap(BootstrapStage::Database, e))?;
            let block_db = provider
                .open(BLOCK_INDEX_DB)
                .map_err(|e| LifecycleError::bootstrap(BootstrapStage::Database, e))?;
            info!("Key-value transaction indexer opened");
            Ok((
                TxIndexer::Keyed(Arc::new(KvTxIndex::new(tx_db))),
                BlockIndexer::Keyed(Arc::new(KvBlockIndex::new(block_db))),
            ))
        }
    }
}

impl LocalNodeApi for LocalNode {
    fn genesis(&self) -> Result<GenesisDoc, QueryError> {
        self.running()?.genesis()
    }

    fn latest_height(&self) -> Result<Height, QueryError> {
        self.running()?.latest_height()
    }

    fn chain_id(&self) -> Result<String, QueryError> {
        self.running()?.chain_id()
    }

    fn validators(&self, height: Option<Height>) -> Result<ResultValidators, QueryError> {
        self.running()?.validators(height)
    }

    fn block(&self, height: Option<Height>) -> Result<ResultBlock, QueryError> {
        self.running()?.block(height)
    }

    fn block_results(&self, height: Option<Height>) -> Result<ResultBlockResults, QueryError> {
        self.running()?.block_results(height)
    }

    fn tx(&self, hash: &str) -> Result<TxResponse, QueryError> {
        self.running()?.tx(hash)
    }

    fn txs(&self, block: &ResultBlock) -> Result<Vec<TxResponse>, QueryError> {
        self.running()?.txs(block)
    }

    fn tx_search(
        &self,
        query: &str,
        page: Option<i64>,
        per_page: Option<i64>,
        order_by: &str,
    ) -> Result<ResultTxSearch, QueryError> {
        self.running()?.tx_search(query, page, per_page, order_by)
    }

    fn consensus_state(&self) -> Result<RoundStateSimple, QueryError> {
        self.running()?.consensus_state()
    }

    fn subscribe_events(
        &self,
        subscriber: &str,
        query: &str,
    ) -> Result<(EventStream, CancelHandle), QueryError> {
        self.running()?.subscribe_events(subscriber, query)
    }

    fn subscribe_new_blocks(
        &self,
        subscriber: &str,
    ) -> Result<(EventStream, CancelHandle), QueryError> {
        self.running()?.subscribe_new_blocks(subscriber)
    }
}
