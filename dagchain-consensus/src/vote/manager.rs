use dagchain_core::interfaces::DposOracle;
use dagchain_core::pbft_block::{Period, Round};
use dagchain_core::sortition::VrfOracle;
use dagchain_core::{Address, ConsensusConfig, Hash, PbftStep, VerifiedVote, Vote};
use indexmap::IndexMap;
use parking_lot::RwLock;
use std::sync::Arc;
use thiserror::Error;

type BucketKey = (Period, Round, PbftStep, Hash);

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyVoteError {
    #[error("voter {0:?} is not DPOS-eligible for this period")]
    NotEligible(Address),
    #[error("VRF sortition proof failed verification")]
    FailedSortition,
    #[error("vote for period {period} is older than the garbage collection horizon")]
    Stale { period: Period },
    #[error("future vote queue is full ({max_future_votes} votes already buffered)")]
    FutureQueueFull { max_future_votes: usize },
    #[error("voter {0:?} already cast a vote for this (period, round, step, block)")]
    DuplicateVote(Address),
}

#[derive(Default)]
struct VoteBucket {
    votes: IndexMap<Address, VerifiedVote>,
    weight_sum: u64,
}

struct State {
    buckets: IndexMap<BucketKey, VoteBucket>,
    current_period: Period,
}

/// Collects, verifies and tallies PBFT votes, keyed by `(period, round,
/// step, block_hash)` (spec.md §4.4). Bucket iteration order is
/// insertion order (`indexmap`) so a rebroadcast replay of the same votes
/// always reaches quorum through the same sequence of additions, which
/// keeps vote-processing logs reproducible across nodes.
pub struct VoteManager {
    state: RwLock<State>,
    config: ConsensusConfig,
    dpos: Arc<dyn DposOracle>,
    vrf: Arc<dyn VrfOracle>,
}

impl VoteManager {
    pub fn new(config: ConsensusConfig, dpos: Arc<dyn DposOracle>, vrf: Arc<dyn VrfOracle>) -> Self {
        Self {
            state: RwLock::new(State { buckets: IndexMap::new(), current_period: 0 }),
            config,
            dpos,
            vrf,
        }
    }

    /// Verifies and inserts `vote`, deduplicating by `(bucket, voter)`.
    /// `sortition_input` is the caller-built `(period, round, step)` message
    /// the vote's `vrf_proof` was drawn over (spec.md §4.4 "Verification").
    pub fn add_vote(&self, vote: Vote, sortition_input: &[u8]) -> Result<(), VerifyVoteError> {
        {
            let state = self.state.read();
            if vote.period + self.config.vote_retention < state.current_period {
                return Err(VerifyVoteError::Stale { period: vote.period });
            }
            if vote.period > state.current_period + 1 {
                let future_votes: usize = state
                    .buckets
                    .iter()
                    .filter(|(key, _)| key.0 > state.current_period + 1)
                    .map(|(_, bucket)| bucket.votes.len())
                    .sum();
                if future_votes >= self.config.max_future_votes {
                    return Err(VerifyVoteError::FutureQueueFull { max_future_votes: self.config.max_future_votes });
                }
            }
        }

        if !self.dpos.is_eligible(vote.period, &vote.voter) {
            return Err(VerifyVoteError::NotEligible(vote.voter));
        }
        let total_votes = self.dpos.eligible_total_votes(vote.period);
        let sortition = self
            .vrf
            .verify_sortition(&vote.voter, sortition_input, &vote.vrf_proof, total_votes)
            .ok_or(VerifyVoteError::FailedSortition)?;
        if !sortition.eligible {
            return Err(VerifyVoteError::NotEligible(vote.voter));
        }

        let key = (vote.period, vote.round, vote.step, vote.block_hash);
        let voter = vote.voter;
        let weight = sortition.weight;
        let verified = VerifiedVote { vote, weight };

        let mut state = self.state.write();
        let bucket = state.buckets.entry(key).or_default();
        if bucket.votes.contains_key(&voter) {
            return Err(VerifyVoteError::DuplicateVote(voter));
        }
        bucket.weight_sum += weight;
        bucket.votes.insert(voter, verified);
        Ok(())
    }

    /// Sum of verified vote weight for one `(period, round, step,
    /// block_hash)` bucket.
    pub fn weight_for(&self, period: Period, round: Round, step: PbftStep, block_hash: Hash) -> u64 {
        let state = self.state.read();
        state.buckets.get(&(period, round, step, block_hash)).map(|b| b.weight_sum).unwrap_or(0)
    }

    /// The block hash, if any, that reached `2t+1` weighted votes for
    /// `(period, round, step)` (spec.md §4.3 soft/cert-vote thresholds).
    /// At most one block hash can meet threshold in a given bucket set,
    /// since quorum requires more than two-thirds of total eligible weight.
    pub fn two_t_plus_one_voted_block(&self, period: Period, round: Round, step: PbftStep) -> Option<Hash> {
        let total_votes = self.dpos.eligible_total_votes(period);
        let threshold = ConsensusConfig::two_t_plus_one(total_votes);
        let state = self.state.read();
        state
            .buckets
            .iter()
            .find(|(key, bucket)| key.0 == period && key.1 == round && key.2 == step && bucket.weight_sum >= threshold)
            .map(|(key, _)| key.3)
    }

    /// Every next-vote block hash (including `Hash::ZERO` for "no block")
    /// that reached `2t+1` for `(period, round)`, used to detect a
    /// round's Next-vote consensus value (spec.md §4.3 "Next-vote").
    pub fn two_t_plus_one_next_votes(&self, period: Period, round: Round) -> Vec<Hash> {
        let total_votes = self.dpos.eligible_total_votes(period);
        let threshold = ConsensusConfig::two_t_plus_one(total_votes);
        let state = self.state.read();
        state
            .buckets
            .iter()
            .filter(|(key, bucket)| {
                key.0 == period && key.1 == round && matches!(key.2, PbftStep::Next(_)) && bucket.weight_sum >= threshold
            })
            .map(|(key, _)| key.3)
            .collect()
    }

    /// Advances the garbage-collection horizon and drops buckets for
    /// periods older than `period - vote_retention` (spec.md §4.4 "Garbage
    /// collection").
    pub fn advance_period(&self, period: Period) {
        let mut state = self.state.write();
        state.current_period = period;
        let retention = self.config.vote_retention;
        state.buckets.retain(|key, _| key.0 + retention >= period);
    }

    pub fn current_period(&self) -> Period {
        self.state.read().current_period
    }
}
