use serde::{Deserialize, Serialize};

/// The consensus core's config surface, enumerated in spec.md §6. Plain data,
/// constructed once by an external loader (CLI/config parsing is out of
/// scope, spec.md §1) and passed by value to each component at construction —
/// no process-wide singleton, per the "Global state" design note in spec.md §9.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ConsensusConfig {
    /// Base PBFT step duration.
    pub lambda_ms_min: u32,
    /// Factor lambda grows by on each round advance, bounded by `lambda_bound`.
    pub lambda_backoff_factor: u32,
    /// Multiplier cap on lambda growth, `vdf.lambda_bound` in spec.md §6.
    pub lambda_bound: u16,

    pub committee_size: u32,
    /// Max dag blocks per anchor (`dag_blocks_size`).
    pub dag_blocks_size: u32,
    pub ghost_path_move_back: u32,

    /// Gas limit per PBFT block.
    pub gas_limit: u64,
    /// Gas limit per DAG block.
    pub dag_gas_limit: u64,
    /// Max tips a single DAG block may carry.
    pub max_tips: usize,

    /// Proposer shard count.
    pub shard: u16,

    /// Levels below the anchor at which a non-finalized block is pruned.
    pub expiry_limit: u32,
    /// Level→period stride cap.
    pub max_levels_per_period: u32,

    pub eligibility_balance_threshold: u64,
    pub vote_eligibility_balance_step: u64,
    pub delegation_delay: u64,

    pub vrf_threshold_upper: u16,
    pub vdf_difficulty_min: u8,
    pub vdf_difficulty_max: u8,
    pub vdf_difficulty_stale: u8,

    /// Minimum delay between proposal attempts when the pool is empty or the
    /// node is ineligible (spec.md §4.2 step 1/4).
    pub min_proposal_delay_ms: u64,

    /// Votes for periods older than `finalized_period - vote_retention` are
    /// discarded by the Vote Manager (spec.md §4.4 "Garbage collection").
    pub vote_retention: u64,
    /// Bound on queued future-period votes (spec.md §4.4, §7).
    pub max_future_votes: usize,
}

impl ConsensusConfig {
    /// `2t+1 = floor(2 * total_eligible_votes / 3) + 1`, per spec.md §4.3.
    pub fn two_t_plus_one(total_eligible_votes: u64) -> u64 {
        (2 * total_eligible_votes) / 3 + 1
    }
}
