//! # Indexer Service
//!
//! Background task feeding bus events into the indexers:
//!
//! ```text
//! Event Bus ──Tx──────→ TxIndexer
//!           └─NewBlock─→ BlockIndexer (begin + end block events)
//! ```
//!
//! The service attaches a bus sink when it is constructed, so nothing
//! published after bootstrap is missed. The sink is lossless: a slow indexer
//! holds publishers back instead of falling behind. The service runs until
//! the shutdown signal fires or the bus closes.

use crate::ports::outbound::{BlockIndexer, TxIndexer};
use shared_bus::{InMemoryEventBus, NodeEvent, SubscriptionError};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Sink name the service registers on the bus.
pub const INDEXER_SUBSCRIBER: &str = "IndexerService";

/// Running totals, readable while the service runs.
#[derive(Debug, Default)]
pub struct IndexerStats {
    txs_indexed: AtomicU64,
    blocks_indexed: AtomicU64,
    failures: AtomicU64,
}

impl IndexerStats {
    pub fn txs_indexed(&self) -> u64 {
        self.txs_indexed.load(Ordering::Relaxed)
    }

    pub fn blocks_indexed(&self) -> u64 {
        self.blocks_indexed.load(Ordering::Relaxed)
    }

    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }
}

pub struct IndexerService {
    tx_indexer: TxIndexer,
    block_indexer: BlockIndexer,
    feed: mpsc::Receiver<NodeEvent>,
    stats: Arc<IndexerStats>,
}

impl IndexerService {
    /// Attach to the bus. Fails if the bus is closed or already has an
    /// indexer attached.
    pub fn new(
        tx_indexer: TxIndexer,
        block_indexer: BlockIndexer,
        bus: &InMemoryEventBus,
    ) -> Result<Self, SubscriptionError> {
        let feed = bus.attach_sink(INDEXER_SUBSCRIBER)?;
        Ok(Self {
            tx_indexer,
            block_indexer,
            feed,
            stats: Arc::new(IndexerStats::default()),
        })
    }

    pub fn stats(&self) -> Arc<IndexerStats> {
        Arc::clone(&self.stats)
    }

    /// Run on the tokio runtime until `shutdown` flips or the bus closes.
    pub fn spawn(self, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
        tokio::spawn(async move {
            tokio::select! {
                () = self.run() => {}
                _ = shutdown.changed() => {
                    info!("Indexer service shutdown signal received");
                }
            }
        })
    }

    async fn run(mut self) {
        info!(
            tx_indexing = self.tx_indexer.is_enabled(),
            "Indexer service started"
        );
        while let Some(event) = self.feed.recv().await {
            self.handle(&event);
        }
        info!("Event bus closed, indexer service exiting");
    }

    fn handle(&self, event: &NodeEvent) {
        match event {
            NodeEvent::Tx(tx) => match self.tx_indexer.index(tx) {
                Ok(()) => {
                    self.stats.txs_indexed.fetch_add(1, Ordering::Relaxed);
                }
                Err(e) => {
                    self.stats.failures.fetch_add(1, Ordering::Relaxed);
                    warn!(height = tx.height, index = tx.index, error = %e, "Failed to index tx");
                }
            },
            NodeEvent::NewBlock(block) => {
                let height = block.block.header.height;
                let events: Vec<_> = block
                    .result_begin_block
                    .iter()
                    .chain(&block.result_end_block)
                    .cloned()
                    .collect();
                match self.block_indexer.index(height, &events) {
                    Ok(()) => {
                        self.stats.blocks_indexed.fetch_add(1, Ordering::Relaxed);
                    }
                    Err(e) => {
                        self.stats.failures.fetch_add(1, Ordering::Relaxed);
                        warn!(height, error = %e, "Failed to index block events");
                    }
                }
            }
            other => debug!(event_type = %other.event_type(), "Indexer ignoring event"),
        }
    }
}
