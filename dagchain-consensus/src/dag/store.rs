use dagchain_core::{DagBlock, Hash};
use std::collections::{BTreeMap, HashMap, HashSet};

/// In-memory representation of the non-finalized part of the DAG.
///
/// Mirrors the teacher's split between a pivot tree (one outgoing edge per
/// block) and the total DAG (pivot + tip edges), spec.md §4.1. Rather than a
/// generic labelled graph library (the original uses `boost::graph`), this
/// keeps the two adjacency views the algorithms actually need: each block's
/// own `pivot`/`tips` fields already encode its parent edges, so the store
/// only needs to additionally index *children* for ghost-path descent and
/// *level* for ordering/pruning.
#[derive(Default)]
pub struct DagStore {
    /// Non-finalized blocks, keyed by hash.
    blocks: HashMap<Hash, DagBlock>,
    /// `non_finalized_blks_` in the teacher: level -> set of non-finalized
    /// block hashes at that level.
    level_index: BTreeMap<u64, HashSet<Hash>>,
    /// Children reachable via a pivot edge only (the pivot tree), keyed by
    /// parent hash. Used for ghost-path descent.
    pivot_children: HashMap<Hash, Vec<Hash>>,
    /// Children reachable via a pivot OR tip edge (the total DAG), keyed by
    /// parent hash. Used for subtree-weight computation and leaf detection.
    total_children: HashMap<Hash, Vec<Hash>>,
    max_level: u64,
}

impl DagStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.blocks.contains_key(hash)
    }

    pub fn get(&self, hash: &Hash) -> Option<&DagBlock> {
        self.blocks.get(hash)
    }

    pub fn level_of(&self, hash: &Hash) -> Option<u64> {
        self.blocks.get(hash).map(|b| b.level)
    }

    pub fn max_level(&self) -> u64 {
        self.max_level
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Inserts a verified block into both adjacency views. Does not verify
    /// anything — verification happens once, before insertion, in
    /// `DagManager::verify_block`.
    pub fn insert(&mut self, block: DagBlock) {
        let hash = block.hash;
        let level = block.level;
        if !block.pivot.is_zero() || block.level == 0 {
            self.pivot_children.entry(block.pivot).or_default().push(hash);
            self.total_children.entry(block.pivot).or_default().push(hash);
        }
        for tip in &block.tips {
            self.total_children.entry(*tip).or_default().push(hash);
        }
        self.level_index.entry(level).or_default().insert(hash);
        self.max_level = self.max_level.max(level);
        self.blocks.insert(hash, block);
    }

    /// Removes a set of finalized blocks from the non-finalized views
    /// (spec.md §4.1 `set_block_order`). Children-index entries pointing at
    /// removed blocks are left in place: once a parent is gone from
    /// `blocks`, ordering/ghost-path traversal treats it as a dead end the
    /// same way it treats any hash absent from `blocks`.
    pub fn remove_finalized(&mut self, hashes: &[Hash]) {
        for hash in hashes {
            if let Some(block) = self.blocks.remove(hash) {
                if let Some(set) = self.level_index.get_mut(&block.level) {
                    set.remove(hash);
                    if set.is_empty() {
                        self.level_index.remove(&block.level);
                    }
                }
            }
        }
    }

    /// Prunes every non-finalized block with `level < expiry_level`,
    /// returning their hashes and the union of their transaction hashes
    /// (spec.md §4.1 "Expiry").
    pub fn prune_expired(&mut self, expiry_level: u64) -> (Vec<Hash>, Vec<Hash>) {
        let expired_hashes: Vec<Hash> = self
            .level_index
            .range(..expiry_level)
            .flat_map(|(_, set)| set.iter().copied())
            .collect();
        let mut trxs = Vec::new();
        for hash in &expired_hashes {
            if let Some(block) = self.blocks.remove(hash) {
                trxs.extend(block.trxs.iter().copied());
            }
        }
        self.level_index.retain(|level, _| *level >= expiry_level);
        (expired_hashes, trxs)
    }

    /// Leaves of the total DAG: blocks with no recorded total-DAG children
    /// among the still-present non-finalized blocks.
    pub fn leaves(&self) -> Vec<Hash> {
        self.blocks
            .keys()
            .filter(|h| {
                self.total_children
                    .get(h)
                    .map(|children| children.iter().all(|c| !self.blocks.contains_key(c)))
                    .unwrap_or(true)
            })
            .copied()
            .collect()
    }

    pub fn pivot_children_of(&self, hash: &Hash) -> &[Hash] {
        self.pivot_children.get(hash).map(|v| v.as_slice()).unwrap_or(&[])
    }

    /// Size of the total-DAG subtree rooted at `hash` (hash plus every
    /// present descendant reachable through pivot or tip child edges),
    /// memoized since ghost-path descent queries overlapping subtrees
    /// repeatedly.
    pub fn subtree_weight(&self, hash: Hash, memo: &mut HashMap<Hash, u64>) -> u64 {
        if let Some(w) = memo.get(&hash) {
            return *w;
        }
        let mut weight = if self.blocks.contains_key(&hash) { 1 } else { 0 };
        if let Some(children) = self.total_children.get(&hash) {
            for child in children {
                if self.blocks.contains_key(child) {
                    weight += self.subtree_weight(*child, memo);
                }
            }
        }
        memo.insert(hash, weight);
        weight
    }
}
