use dagchain_core::pbft_block::Period;

/// Level→period stride map referenced throughout spec.md §4 ("derive
/// proposal_period via the level→period map"). Levels are grouped into
/// periods of `max_levels_per_period` each; level 0 (genesis) belongs to
/// period 0.
pub fn level_to_period(level: u64, max_levels_per_period: u32) -> Period {
    if level == 0 {
        return 0;
    }
    let stride = max_levels_per_period.max(1) as u64;
    (level - 1) / stride + 1
}
