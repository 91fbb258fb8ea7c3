use super::level_period::level_to_period;
use super::ordering::{dag_block_order, ghost_path};
use super::store::DagStore;
use super::vdf_message::{sortition_input, vdf_message};
use dagchain_core::interfaces::{DposOracle, TransactionPoolClient};
use dagchain_core::pbft_block::Period;
use dagchain_core::sortition::{DifficultyClass, VdfFunction, VrfOracle};
use dagchain_core::{ConsensusConfig, DagBlock, DagFrontier, DagVerificationError, Hash};
use dagchain_notify::{EventBus, Notification};
use dagchain_utils::ExpirationCacheMap;
use parking_lot::RwLock;
use std::sync::Arc;

/// Outcome of [`DagManager::add_block`] (spec.md §4.1 `add_block`).
/// Refines the spec's `(added: bool, missing: [H])` pair into an enum so
/// callers can match on the rejection reason instead of inspecting an empty
/// `missing` list to infer "rejected rather than missing".
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddBlockOutcome {
    Added,
    Missing(Vec<Hash>),
    Rejected(DagVerificationError),
}

/// The set of transactions and pruned blocks handed back to the transaction
/// pool after `set_block_order` prunes expired DAG blocks (spec.md §4.1
/// "Expiry").
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExpiryOutcome {
    pub pruned_blocks: Vec<Hash>,
    pub expired_transactions: Vec<Hash>,
}

struct Inner {
    store: DagStore,
    anchor: Hash,
    old_anchor: Hash,
    period: Period,
    dag_expiry_level: u64,
}

/// Maintains the in-memory DAG, validates incoming blocks, and serves
/// ordering/frontier queries (spec.md §4.1). Thread-safe except
/// `set_block_order`, which the PBFT manager serializes against
/// `dag_block_order` via [`DagManager::lock_for_finalization`] to make the
/// order-compute-then-commit sequence atomic (spec.md §5).
pub struct DagManager {
    inner: RwLock<Inner>,
    finalize_lock: RwLock<()>,
    config: ConsensusConfig,
    dpos: Arc<dyn DposOracle>,
    vrf: Arc<dyn VrfOracle>,
    vdf: Arc<dyn VdfFunction>,
    trx_pool: Arc<dyn TransactionPoolClient>,
    events: Arc<EventBus>,
    seen_blocks: ExpirationCacheMap<Hash, ()>,
}

impl DagManager {
    pub fn new(
        genesis: Hash,
        config: ConsensusConfig,
        dpos: Arc<dyn DposOracle>,
        vrf: Arc<dyn VrfOracle>,
        vdf: Arc<dyn VdfFunction>,
        trx_pool: Arc<dyn TransactionPoolClient>,
        events: Arc<EventBus>,
    ) -> Self {
        let mut store = DagStore::new();
        store.insert(DagBlock {
            hash: genesis,
            pivot: Hash::ZERO,
            tips: vec![],
            level: 0,
            trxs: vec![],
            gas_estimate: 0,
            vdf_proof: vec![],
            author: dagchain_core::Address::default(),
            signature: vec![],
        });
        Self {
            inner: RwLock::new(Inner { store, anchor: genesis, old_anchor: Hash::ZERO, period: 0, dag_expiry_level: 0 }),
            finalize_lock: RwLock::new(()),
            config,
            dpos,
            vrf,
            vdf,
            trx_pool,
            events,
            seen_blocks: ExpirationCacheMap::new(10_000, 100),
        }
    }

    /// Deterministic, non-mutating verification (spec.md §4.1
    /// `verify_block`).
    pub fn verify_block(&self, block: &DagBlock) -> Result<(), DagVerificationError> {
        let inner = self.inner.read();

        if block.tips.len() > self.config.max_tips {
            return Err(DagVerificationError::BlockTooBig);
        }
        if !block.tips_distinct_from_pivot() {
            return Err(DagVerificationError::FailedTipsVerification);
        }

        // In practice `add_block` only reaches `verify_block` once
        // `pivot_and_tips_available` has confirmed the pivot is present, so
        // this branch is not exercised on the real call path; kept as a
        // defensive check for direct callers of `verify_block`.
        let pivot_level = if block.pivot.is_zero() {
            0
        } else {
            match inner.store.level_of(&block.pivot) {
                Some(l) => l,
                None => return Err(DagVerificationError::FailedTipsVerification),
            }
        };
        let mut tip_levels = Vec::with_capacity(block.tips.len());
        for tip in &block.tips {
            match inner.store.level_of(tip) {
                Some(l) => tip_levels.push(l),
                None => return Err(DagVerificationError::FailedTipsVerification),
            }
        }
        let expected_level = DagBlock::expected_level(pivot_level, tip_levels);
        if block.level != expected_level {
            return Err(DagVerificationError::AheadBlock { got: block.level, max_known: expected_level });
        }

        if block.level < inner.dag_expiry_level {
            return Err(DagVerificationError::ExpiredBlock { level: block.level, expiry_level: inner.dag_expiry_level });
        }

        let estimates = self.trx_pool.estimate_gas(&block.trxs);
        let missing = estimates.iter().filter(|e| e.is_none()).count();
        if missing > 0 {
            return Err(DagVerificationError::MissingTransaction(missing));
        }
        let total_gas: u64 = estimates.into_iter().flatten().sum();
        if total_gas != block.gas_estimate {
            return Err(DagVerificationError::IncorrectTransactionsEstimation);
        }

        let proposal_period = level_to_period(block.level, self.config.max_levels_per_period);
        if !self.dpos.is_eligible(proposal_period, &block.author) {
            return Err(DagVerificationError::NotEligible(block.author));
        }

        let total_votes = self.dpos.eligible_total_votes(proposal_period);
        let input = sortition_input(block.level, block.pivot);
        let sortition = self.vrf.sortition(&block.author, &input, total_votes);
        if !sortition.eligible {
            return Err(DagVerificationError::FailedVdfVerification);
        }

        let difficulty = match sortition.difficulty_class {
            DifficultyClass::Stale => self.config.vdf_difficulty_stale,
            DifficultyClass::Normal => self.config.vdf_difficulty_min,
        };
        let message = vdf_message(block.pivot, &block.trxs);
        if !self.vdf.verify(&message, difficulty, &block.vdf_proof) {
            return Err(DagVerificationError::FailedVdfVerification);
        }

        Ok(())
    }

    /// Pure read: hashes of `pivot ∪ tips` not yet present in the DAG
    /// (spec.md §4.1 `pivot_and_tips_available`).
    pub fn pivot_and_tips_available(&self, block: &DagBlock) -> (bool, Vec<Hash>) {
        let inner = self.inner.read();
        let mut missing = Vec::new();
        if !block.pivot.is_zero() && !inner.store.contains(&block.pivot) {
            missing.push(block.pivot);
        }
        for tip in &block.tips {
            if !inner.store.contains(tip) {
                missing.push(*tip);
            }
        }
        (missing.is_empty(), missing)
    }

    /// Validates and inserts `block`, per spec.md §4.1 `add_block`.
    pub fn add_block(&self, block: DagBlock, trxs: Vec<Hash>, save: bool) -> AddBlockOutcome {
        if self.seen_blocks.contains(&block.hash) {
            return AddBlockOutcome::Rejected(DagVerificationError::FailedTipsVerification);
        }

        let (available, missing) = self.pivot_and_tips_available(&block);
        if !available {
            return AddBlockOutcome::Missing(missing);
        }

        if let Err(e) = self.verify_block(&block) {
            log::warn!(target: "dag_manager", "rejecting block {:?} from {:?}: {}", block.hash, block.author, e);
            self.seen_blocks.insert(block.hash, ());
            return AddBlockOutcome::Rejected(e);
        }

        let hash = block.hash;
        {
            let mut inner = self.inner.write();
            let mut stored = block;
            stored.trxs = trxs;
            inner.store.insert(stored);
        }
        self.seen_blocks.insert(hash, ());
        if save {
            log::debug!(target: "dag_manager", "persisting dag block {:?}", hash);
        }
        self.events.notify(Notification::BlockVerified(hash));
        AddBlockOutcome::Added
    }

    /// Deterministic topological ordering of all non-finalized blocks
    /// reachable from `anchor` (spec.md §4.1 `dag_block_order`).
    pub fn dag_block_order(&self, anchor: Hash) -> Vec<Hash> {
        let inner = self.inner.read();
        dag_block_order(&inner.store, anchor)
    }

    /// Commits the ordering for `period`, advances the period, recomputes
    /// expiry and prunes expired blocks (spec.md §4.1 `set_block_order`).
    /// Callers finalizing a PBFT block must hold
    /// [`DagManager::lock_for_finalization`] across the preceding
    /// `dag_block_order` call and the order_hash check, so the committed
    /// order can never drift from what gets applied here.
    pub fn set_block_order(&self, anchor: Hash, period: Period, order: &[Hash]) -> ExpiryOutcome {
        let mut inner = self.inner.write();
        // Read the anchor's level before removing it from the non-finalized
        // view, since `anchor` is itself the last entry of `order`.
        let anchor_level = inner.store.level_of(&anchor).unwrap_or(inner.dag_expiry_level);

        inner.store.remove_finalized(order);
        inner.old_anchor = inner.anchor;
        inner.anchor = anchor;
        inner.period = period;

        let new_expiry = anchor_level.saturating_sub(self.config.expiry_limit as u64);
        inner.dag_expiry_level = inner.dag_expiry_level.max(new_expiry);

        let (pruned_blocks, expired_transactions) = inner.store.prune_expired(inner.dag_expiry_level);
        drop(inner);

        if !expired_transactions.is_empty() {
            self.trx_pool.return_expired(&expired_transactions);
        }
        ExpiryOutcome { pruned_blocks, expired_transactions }
    }

    /// Exclusive lock serializing the finalize sequence
    /// (`dag_block_order` → verify `order_hash` → `set_block_order`)
    /// against any other finalization attempt, per spec.md §5's
    /// `order_dag_blocks_mutex_`.
    pub fn lock_for_finalization(&self) -> parking_lot::RwLockWriteGuard<'_, ()> {
        self.finalize_lock.write()
    }

    pub fn latest_pivot_and_tips(&self) -> DagFrontier {
        let inner = self.inner.read();
        let pivot_path = ghost_path(&inner.store, inner.anchor);
        let pivot = *pivot_path.last().unwrap_or(&inner.anchor);
        let leaves = inner.store.leaves();
        let tips = leaves.into_iter().filter(|h| *h != pivot).collect();
        DagFrontier::new(pivot, tips)
    }

    pub fn ghost_path(&self, source: Hash) -> Vec<Hash> {
        let inner = self.inner.read();
        ghost_path(&inner.store, source)
    }

    pub fn ghost_path_from_anchor(&self) -> Vec<Hash> {
        let inner = self.inner.read();
        ghost_path(&inner.store, inner.anchor)
    }

    pub fn dag_expiry_level(&self) -> u64 {
        self.inner.read().dag_expiry_level
    }

    pub fn latest_period(&self) -> Period {
        self.inner.read().period
    }

    pub fn anchors(&self) -> (Hash, Hash) {
        let inner = self.inner.read();
        (inner.old_anchor, inner.anchor)
    }

    pub fn max_level(&self) -> u64 {
        self.inner.read().store.max_level()
    }

    pub fn contains(&self, hash: &Hash) -> bool {
        self.inner.read().store.contains(hash)
    }

    pub fn non_finalized_len(&self) -> usize {
        self.inner.read().store.len()
    }

    /// Level of a known block, or 0 for any hash not currently present
    /// (including [`Hash::ZERO`], the reserved parent-of-genesis value).
    /// Used by the proposer to drive [`DagFrontier::propose_level`].
    pub fn level_of(&self, hash: &Hash) -> u64 {
        self.inner.read().store.level_of(hash).unwrap_or(0)
    }

    /// Non-finalized block count since the last anchor, the bound
    /// `dag_blocks_size` caps (spec.md §6): once this many DAG blocks have
    /// accumulated without a PBFT finalization, the proposer backs off
    /// rather than growing the non-finalized frontier further.
    pub fn blocks_since_anchor(&self) -> usize {
        self.inner.read().store.len()
    }
}
