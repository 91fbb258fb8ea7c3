mod vdf;

use crate::dag::{level_to_period, sortition_input, vdf_message, AddBlockOutcome, DagManager};
use dagchain_core::interfaces::{BlockSigner, DposOracle, TransactionPoolClient};
use dagchain_core::sortition::{DifficultyClass, VdfFunction, VrfOracle};
use dagchain_core::{Address, ConsensusConfig, DagBlock, Hash};
use dagchain_utils::{cancellable, Canceller};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;

/// Per-node proposal bookkeeping, mirroring the original's
/// `NodeDagProposerData`: stale-backoff jitter and the level at which this
/// node last successfully proposed.
pub struct NodeDagProposerData {
    pub max_num_tries: u16,
    pub trx_shard: u16,
    pub num_tries: u16,
    pub last_propose_level: u64,
}

impl NodeDagProposerData {
    pub fn new(address: &Address, shard_count: u16, max_num_tries: u16) -> Self {
        Self { max_num_tries, trx_shard: address.shard_of(shard_count), num_tries: 0, last_propose_level: 0 }
    }
}

/// Produces DAG blocks: selects a frontier, checks VRF-gated eligibility,
/// packs transactions, runs a cancellable VDF, and submits the result to
/// the DAG manager (spec.md §4.2). One instance per node identity.
pub struct DagBlockProposer {
    config: ConsensusConfig,
    address: Address,
    dag: Arc<DagManager>,
    dpos: Arc<dyn DposOracle>,
    vrf: Arc<dyn VrfOracle>,
    vdf: Arc<dyn VdfFunction>,
    trx_pool: Arc<dyn TransactionPoolClient>,
    signer: Arc<dyn BlockSigner>,
    state: Mutex<NodeDagProposerData>,
    in_flight: Mutex<Option<Canceller>>,
}

impl DagBlockProposer {
    pub fn new(
        config: ConsensusConfig,
        address: Address,
        dag: Arc<DagManager>,
        dpos: Arc<dyn DposOracle>,
        vrf: Arc<dyn VrfOracle>,
        vdf: Arc<dyn VdfFunction>,
        trx_pool: Arc<dyn TransactionPoolClient>,
        signer: Arc<dyn BlockSigner>,
    ) -> Self {
        let shard = config.shard;
        let max_num_tries = config.lambda_bound;
        Self {
            state: Mutex::new(NodeDagProposerData::new(&address, shard, max_num_tries)),
            config,
            address,
            dag,
            dpos,
            vrf,
            vdf,
            trx_pool,
            signer,
            in_flight: Mutex::new(None),
        }
    }

    /// Cancels any VDF attempt currently in flight, e.g. because the
    /// frontier advanced underneath it (spec.md §4.2 step 10,
    /// "Preemption").
    pub fn preempt(&self) {
        if let Some(canceller) = self.in_flight.lock().take() {
            canceller.cancel();
        }
    }

    /// One proposal attempt (spec.md §4.2 steps 1-10). Returns the
    /// produced block if one was proposed and accepted, or `None` if the
    /// attempt backed off (not eligible, nothing to propose, or
    /// preempted).
    pub async fn try_propose(&self) -> Option<DagBlock> {
        let frontier = self.dag.latest_pivot_and_tips();
        let level = frontier.propose_level(|h| self.dag.level_of(&h));

        {
            let state = self.state.lock();
            if level <= state.last_propose_level {
                return None;
            }
        }

        if self.dag.blocks_since_anchor() >= self.config.dag_blocks_size as usize {
            tokio::time::sleep(Duration::from_millis(self.config.min_proposal_delay_ms)).await;
            return None;
        }

        let period = level_to_period(level, self.config.max_levels_per_period);
        if !self.dpos.is_eligible(period, &self.address) {
            let jitter = self.address.backoff_jitter(self.state.lock().max_num_tries);
            tokio::time::sleep(Duration::from_millis(jitter as u64)).await;
            return None;
        }

        let total_votes = self.dpos.eligible_total_votes(period);
        let input = sortition_input(level, frontier.pivot);
        let sortition = self.vrf.sortition(&self.address, &input, total_votes);
        if !sortition.eligible {
            self.state.lock().num_tries += 1;
            return None;
        }

        let (trx_hashes, gas_estimates) = self.trx_pool.pack(period, self.config.dag_gas_limit);
        let gas_estimate: u64 = gas_estimates.iter().sum();

        let mut tips: Vec<Hash> = frontier.tips;
        tips.truncate(self.config.max_tips);

        let difficulty = match sortition.difficulty_class {
            DifficultyClass::Stale => self.config.vdf_difficulty_stale,
            DifficultyClass::Normal => self.config.vdf_difficulty_min,
        };

        let message = vdf_message(frontier.pivot, &trx_hashes);
        let (canceller, token) = cancellable();
        *self.in_flight.lock() = Some(canceller);

        let proof = vdf::run_cancellable(self.vdf.clone(), message, difficulty, token).await;
        self.in_flight.lock().take();

        let vdf_proof = proof?;

        let unsigned = DagBlock {
            hash: Hash::ZERO,
            pivot: frontier.pivot,
            tips,
            level,
            trxs: trx_hashes.clone(),
            gas_estimate,
            vdf_proof,
            author: self.address,
            signature: vec![],
        };
        let (hash, signature) = self.signer.sign_dag_block(&unsigned);
        let block = DagBlock { hash, signature, ..unsigned };

        match self.dag.add_block(block.clone(), trx_hashes, true) {
            AddBlockOutcome::Added => {
                let mut state = self.state.lock();
                state.last_propose_level = level;
                state.num_tries = 0;
                Some(block)
            }
            AddBlockOutcome::Missing(_) | AddBlockOutcome::Rejected(_) => None,
        }
    }
}
