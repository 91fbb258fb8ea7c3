use super::round::RoundState;
use crate::dag::{order_hash, DagManager};
use crate::vote::VoteManager;
use dagchain_core::errors::ConsensusFatalError;
use dagchain_core::interfaces::{BlockSigner, DposOracle, FinalChainExecutor, NetworkGossip, PersistenceClient};
use dagchain_core::pbft_block::{PbftBlock, PbftStep, Period, Round};
use dagchain_core::sortition::VrfOracle;
use dagchain_core::{Address, ConsensusConfig, Hash, Vote};
use dagchain_notify::{EventBus, Notification};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Persisted snapshot of round progress, written to the `pbft_mgr_field`/
/// `pbft_mgr_status` columns (spec.md §6) so a restarted node resumes from
/// where it left off rather than replaying history from genesis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PbftRoundRecord {
    pub period: Period,
    pub round: Round,
    pub step: PbftStep,
    pub prev_block_hash: Hash,
}

/// Outcome of one [`PbftManager::drive_step`] call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Finalized(Period),
}

fn pbft_sortition_input(period: Period, round: Round, step: PbftStep) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 8 + 4);
    buf.extend_from_slice(&period.to_le_bytes());
    buf.extend_from_slice(&round.to_le_bytes());
    buf.extend_from_slice(&step.as_u32().to_le_bytes());
    buf
}

struct Candidate {
    block: PbftBlock,
    hash: Hash,
}

/// Drives one node's view of the four-step PBFT round state machine
/// (Propose -> Soft-vote -> Cert-vote -> Next-vote), per spec.md §4.3.
pub struct PbftManager {
    config: ConsensusConfig,
    address: Address,
    dag: Arc<DagManager>,
    votes: Arc<VoteManager>,
    vrf: Arc<dyn VrfOracle>,
    dpos: Arc<dyn DposOracle>,
    signer: Arc<dyn BlockSigner>,
    gossip: Arc<dyn NetworkGossip>,
    persistence: Arc<dyn PersistenceClient>,
    executor: Arc<dyn FinalChainExecutor>,
    events: Arc<EventBus>,
    round: Mutex<RoundState>,
    prev_block_hash: Mutex<Hash>,
    candidate: Mutex<Option<Candidate>>,
}

#[allow(clippy::too_many_arguments)]
impl PbftManager {
    pub fn new(
        config: ConsensusConfig,
        address: Address,
        dag: Arc<DagManager>,
        votes: Arc<VoteManager>,
        vrf: Arc<dyn VrfOracle>,
        dpos: Arc<dyn DposOracle>,
        signer: Arc<dyn BlockSigner>,
        gossip: Arc<dyn NetworkGossip>,
        persistence: Arc<dyn PersistenceClient>,
        executor: Arc<dyn FinalChainExecutor>,
        events: Arc<EventBus>,
    ) -> Self {
        let round = RoundState::start_period(1, config.lambda_ms_min);
        Self {
            config,
            address,
            dag,
            votes,
            vrf,
            dpos,
            signer,
            gossip,
            persistence,
            executor,
            events,
            round: Mutex::new(round),
            prev_block_hash: Mutex::new(Hash::ZERO),
            candidate: Mutex::new(None),
        }
    }

    pub fn round_state(&self) -> RoundState {
        self.round.lock().clone()
    }

    /// Builds this node's PBFT block candidate for the current period: the
    /// anchor is the tip of the ghost path from the last finalized anchor,
    /// or `Hash::ZERO` for an empty period if the DAG made no progress
    /// (spec.md §4.3 "Propose").
    fn build_candidate(&self, now_ms: u64) -> Option<Candidate> {
        let period = self.round.lock().period;
        if !self.dpos.is_eligible(period, &self.address) {
            return None;
        }

        let _guard = self.dag.lock_for_finalization();
        let (_, committed_anchor) = self.dag.anchors();
        let ghost = self.dag.ghost_path_from_anchor();
        let anchor_candidate = *ghost.last().unwrap_or(&committed_anchor);

        let (anchor_hash, computed_order_hash) = if anchor_candidate == committed_anchor {
            (Hash::ZERO, order_hash(&[]))
        } else {
            let order = self.dag.dag_block_order(anchor_candidate);
            (anchor_candidate, order_hash(&order))
        };

        let unsigned = PbftBlock {
            period,
            prev_block_hash: *self.prev_block_hash.lock(),
            anchor_hash,
            order_hash: computed_order_hash,
            timestamp: now_ms,
            author: self.address,
            beneficiary: self.address,
            signature: vec![],
        };
        let (hash, signature) = self.signer.sign_pbft_block(&unsigned);
        Some(Candidate { block: PbftBlock { signature, ..unsigned }, hash })
    }

    fn cast_own_vote(&self, period: Period, round: Round, step: PbftStep, block_hash: Hash) {
        let total_votes = self.dpos.eligible_total_votes(period);
        let input = pbft_sortition_input(period, round, step);
        let sortition = self.vrf.sortition(&self.address, &input, total_votes);
        if !sortition.eligible {
            return;
        }
        let vote = Vote { voter: self.address, period, round, step, block_hash, vrf_proof: sortition.proof, signature: vec![] };
        self.gossip.broadcast_vote(self.address, period, round);
        let _ = self.votes.add_vote(vote, &input);
    }

    /// Drives exactly one step of the round state machine. Call
    /// repeatedly, gated by `lambda_ms` timing, until it reports
    /// [`StepOutcome::Finalized`].
    pub fn drive_step(&self, now_ms: u64) -> Result<StepOutcome, ConsensusFatalError> {
        let round = self.round_state();
        match round.step {
            PbftStep::Propose => {
                if let Some(candidate) = self.build_candidate(now_ms) {
                    self.gossip.broadcast_pbft_block(candidate.hash);
                    *self.candidate.lock() = Some(candidate);
                }
                self.round.lock().advance_step();
                Ok(StepOutcome::Continue)
            }
            PbftStep::Soft => {
                if let Some(hash) = self.candidate.lock().as_ref().map(|c| c.hash) {
                    self.cast_own_vote(round.period, round.round, PbftStep::Soft, hash);
                }
                self.round.lock().advance_step();
                Ok(StepOutcome::Continue)
            }
            PbftStep::Cert => {
                if let Some(winner) = self.votes.two_t_plus_one_voted_block(round.period, round.round, PbftStep::Soft) {
                    if self.candidate.lock().as_ref().map(|c| c.hash) == Some(winner) {
                        self.cast_own_vote(round.period, round.round, PbftStep::Cert, winner);
                    }
                }
                self.round.lock().advance_step();
                Ok(StepOutcome::Continue)
            }
            PbftStep::Next(n) => {
                if let Some(winner) = self.votes.two_t_plus_one_voted_block(round.period, round.round, PbftStep::Cert) {
                    return self.finalize(round.period, winner);
                }

                let carry_forward = self.votes.two_t_plus_one_next_votes(round.period, round.round).into_iter().find(|h| !h.is_zero());
                let vote_target = carry_forward
                    .or_else(|| self.candidate.lock().as_ref().map(|c| c.hash))
                    .unwrap_or(Hash::ZERO);
                self.cast_own_vote(round.period, round.round, PbftStep::Next(n), vote_target);

                self.votes.advance_period(round.period);
                self.round.lock().advance_round(&self.config);
                Ok(StepOutcome::Continue)
            }
        }
    }

    /// Commits `period`'s finalized block, advancing the DAG manager's
    /// ordering and this node's own round/chain state (spec.md §4.3
    /// "Finalization"). Held under the DAG manager's finalization lock so
    /// the order this node computes can never drift from the order it
    /// commits.
    fn finalize(&self, period: Period, block_hash: Hash) -> Result<StepOutcome, ConsensusFatalError> {
        let _guard = self.dag.lock_for_finalization();

        let candidate = self.candidate.lock().take();
        let Some(candidate) = candidate.filter(|c| c.hash == block_hash) else {
            // We don't locally hold the block that reached quorum (e.g. it
            // was proposed by another node and only its vote traffic
            // reached us). Out-of-band sync is this node's collaborators'
            // responsibility (request_missing); nothing to finalize yet.
            return Ok(StepOutcome::Continue);
        };

        let order = if candidate.block.is_empty_period() {
            Vec::new()
        } else {
            self.dag.dag_block_order(candidate.block.anchor_hash)
        };
        let computed = order_hash(&order);
        if computed != candidate.block.order_hash {
            return Err(ConsensusFatalError::OrderHashMismatch {
                anchor: candidate.block.anchor_hash,
                period,
                committed: candidate.block.order_hash,
                computed,
            });
        }

        let outcome = self.dag.set_block_order(candidate.block.anchor_hash, period, &order);
        log::info!(
            target: "pbft_manager",
            "finalized period {} anchor {:?}, {} blocks ordered, {} pruned",
            period,
            candidate.block.anchor_hash,
            order.len(),
            outcome.pruned_blocks.len()
        );

        let mut batch = self.persistence.begin_batch();
        let record = PbftRoundRecord { period: period + 1, round: 1, step: PbftStep::Propose, prev_block_hash: block_hash };
        if let Ok(bytes) = bincode::serialize(&record) {
            batch.put("pbft_mgr_field", b"round".to_vec(), bytes);
        }
        if self.persistence.commit(batch).is_err() {
            return Err(ConsensusFatalError::PersistenceFailure(format!("failed to persist round record for period {}", period)));
        }

        *self.prev_block_hash.lock() = block_hash;
        *self.round.lock() = RoundState::start_period(period + 1, self.config.lambda_ms_min);
        self.votes.advance_period(period + 1);

        self.executor.finalize(candidate.block, order, Box::new(|| {}));
        self.events.notify(Notification::BlockFinalized { period, anchor: block_hash });

        Ok(StepOutcome::Finalized(period))
    }

    /// Out-of-band fast path: a `PbftBlock` for the current period arrived
    /// already certified (e.g. via sync) and should be finalized without
    /// running this node's own round steps (spec.md §4.3 "Out-of-band
    /// sync").
    pub fn finalize_external(&self, block: PbftBlock, block_hash: Hash) -> Result<Period, ConsensusFatalError> {
        let _guard = self.dag.lock_for_finalization();
        let period = block.period;

        let order = if block.is_empty_period() { Vec::new() } else { self.dag.dag_block_order(block.anchor_hash) };
        let computed = order_hash(&order);
        if computed != block.order_hash {
            return Err(ConsensusFatalError::OrderHashMismatch {
                anchor: block.anchor_hash,
                period,
                committed: block.order_hash,
                computed,
            });
        }

        self.dag.set_block_order(block.anchor_hash, period, &order);

        let mut batch = self.persistence.begin_batch();
        let record = PbftRoundRecord { period: period + 1, round: 1, step: PbftStep::Propose, prev_block_hash: block_hash };
        if let Ok(bytes) = bincode::serialize(&record) {
            batch.put("pbft_mgr_field", b"round".to_vec(), bytes);
        }
        if self.persistence.commit(batch).is_err() {
            return Err(ConsensusFatalError::PersistenceFailure(format!("failed to persist synced round record for period {}", period)));
        }

        *self.prev_block_hash.lock() = block_hash;
        *self.round.lock() = RoundState::start_period(period + 1, self.config.lambda_ms_min);
        self.votes.advance_period(period + 1);
        self.events.notify(Notification::BlockFinalized { period, anchor: block_hash });
        Ok(period)
    }
}
