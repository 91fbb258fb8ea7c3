use dagchain_core::pbft_block::{PbftStep, Period, Round};
use dagchain_core::ConsensusConfig;

/// Position within the PBFT state machine: which period/round/step a node
/// is currently driving (spec.md §4.3).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoundState {
    pub period: Period,
    pub round: Round,
    pub step: PbftStep,
    pub lambda_ms: u32,
}

impl RoundState {
    pub fn start_period(period: Period, lambda_ms_min: u32) -> Self {
        Self { period, round: 1, step: PbftStep::Propose, lambda_ms: lambda_ms_min }
    }

    /// Propose -> Soft -> Cert -> Next(4) -> Next(5) -> ...
    pub fn advance_step(&mut self) {
        self.step = match self.step {
            PbftStep::Propose => PbftStep::Soft,
            PbftStep::Soft => PbftStep::Cert,
            PbftStep::Cert => PbftStep::Next(4),
            PbftStep::Next(n) => PbftStep::Next(n + 1),
        };
    }

    /// The round failed to finalize: start a fresh round at `Propose`,
    /// with lambda backed off geometrically and capped at
    /// `lambda_ms_min * lambda_bound` (spec.md §4.3 "Timing").
    pub fn advance_round(&mut self, config: &ConsensusConfig) {
        self.round += 1;
        self.step = PbftStep::Propose;
        let cap = config.lambda_ms_min.saturating_mul(config.lambda_bound as u32).max(config.lambda_ms_min);
        self.lambda_ms = self.lambda_ms.saturating_mul(config.lambda_backoff_factor.max(1)).min(cap);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> ConsensusConfig {
        ConsensusConfig {
            lambda_ms_min: 1500,
            lambda_backoff_factor: 2,
            lambda_bound: 8,
            committee_size: 5,
            dag_blocks_size: 100,
            ghost_path_move_back: 5,
            gas_limit: 1_000_000,
            dag_gas_limit: 500_000,
            max_tips: 8,
            shard: 0,
            expiry_limit: 50,
            max_levels_per_period: 10,
            eligibility_balance_threshold: 1,
            vote_eligibility_balance_step: 1,
            delegation_delay: 0,
            vrf_threshold_upper: u16::MAX,
            vdf_difficulty_min: 1,
            vdf_difficulty_max: 5,
            vdf_difficulty_stale: 3,
            min_proposal_delay_ms: 0,
            vote_retention: 5,
            max_future_votes: 10,
        }
    }

    #[test]
    fn steps_cycle_propose_soft_cert_then_next() {
        let mut round = RoundState::start_period(1, 1500);
        assert_eq!(round.step, PbftStep::Propose);
        round.advance_step();
        assert_eq!(round.step, PbftStep::Soft);
        round.advance_step();
        assert_eq!(round.step, PbftStep::Cert);
        round.advance_step();
        assert_eq!(round.step, PbftStep::Next(4));
        round.advance_step();
        assert_eq!(round.step, PbftStep::Next(5));
    }

    #[test]
    fn advance_round_resets_step_and_bounds_lambda() {
        let cfg = config();
        let mut round = RoundState::start_period(1, cfg.lambda_ms_min);
        for _ in 0..20 {
            round.advance_round(&cfg);
        }
        assert_eq!(round.step, PbftStep::Propose);
        assert!(round.lambda_ms <= cfg.lambda_ms_min * cfg.lambda_bound as u32);
    }
}
