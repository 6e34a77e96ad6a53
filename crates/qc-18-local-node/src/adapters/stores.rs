//! # In-Memory Block and State Stores
//!
//! Host-side stores for embedding and tests. The facade only reads them;
//! `save_*` and `prune_to` are the writer's side.

use crate::domain::errors::StoreError;
use crate::ports::outbound::{BlockStore, StateStore};
use parking_lot::RwLock;
use shared_types::{Block, BlockMeta, ExecutionResults, Height, ValidatorSet};
use std::collections::BTreeMap;

#[derive(Default)]
struct BlockStoreInner {
    blocks: BTreeMap<Height, Block>,
    metas: BTreeMap<Height, BlockMeta>,
    base: Height,
}

/// In-memory block store.
#[derive(Default)]
pub struct InMemoryBlockStore {
    inner: RwLock<BlockStoreInner>,
}

impl InMemoryBlockStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a committed block. `meta` may be absent.
    pub fn save_block(&self, block: Block, meta: Option<BlockMeta>) {
        let height = block.header.height;
        let mut inner = self.inner.write();
        if inner.blocks.is_empty() && inner.base == 0 {
            inner.base = height;
        }
        inner.blocks.insert(height, block);
        if let Some(meta) = meta {
            inner.metas.insert(height, meta);
        }
    }

    /// Drop everything below `base`. Returns how many blocks were pruned.
    pub fn prune_to(&self, base: Height) -> usize {
        let mut inner = self.inner.write();
        let kept_blocks = inner.blocks.split_off(&base);
        let pruned = inner.blocks.len();
        inner.blocks = kept_blocks;
        let kept_metas = inner.metas.split_off(&base);
        inner.metas = kept_metas;
        inner.base = inner.base.max(base);
        pruned
    }
}

impl BlockStore for InMemoryBlockStore {
    fn height(&self) -> Height {
        self.inner
            .read()
            .blocks
            .last_key_value()
            .map_or(0, |(h, _)| *h)
    }

    fn base(&self) -> Height {
        self.inner.read().base
    }

    fn load_block(&self, height: Height) -> Option<Block> {
        self.inner.read().blocks.get(&height).cloned()
    }

    fn load_block_meta(&self, height: Height) -> Option<BlockMeta> {
        self.inner.read().metas.get(&height).cloned()
    }
}

#[derive(Default)]
struct StateStoreInner {
    validators: BTreeMap<Height, ValidatorSet>,
    results: BTreeMap<Height, ExecutionResults>,
}

/// In-memory state store.
///
/// Validator sets are recorded where they change and stay in force until
/// the next change.
#[derive(Default)]
pub struct InMemoryStateStore {
    inner: RwLock<StateStoreInner>,
}

impl InMemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the validator set in force from `height` on.
    pub fn save_validators(&self, height: Height, set: ValidatorSet) {
        self.inner.write().validators.insert(height, set);
    }

    pub fn save_execution_results(&self, height: Height, results: ExecutionResults) {
        self.inner.write().results.insert(height, results);
    }
}

impl StateStore for InMemoryStateStore {
    fn load_validators(&self, height: Height) -> Result<ValidatorSet, StoreError> {
        self.inner
            .read()
            .validators
            .range(..=height)
            .next_back()
            .map(|(_, set)| set.clone())
            .ok_or(StoreError::ValidatorsMissing { height })
    }

    fn load_execution_results(
        &self,
        height: Height,
    ) -> Result<Option<ExecutionResults>, StoreError> {
        Ok(self.inner.read().results.get(&height).cloned())
    }
}
