use crate::Hash;

/// The leaves a proposer will build its next block on: `pivot` is the
/// ghost-path tip, `tips` are the remaining leaves not reachable from
/// `pivot`. See spec.md §3.
#[derive(Clone, Debug, PartialEq, Eq, Default)]
pub struct DagFrontier {
    pub pivot: Hash,
    pub tips: Vec<Hash>,
}

impl DagFrontier {
    pub fn new(pivot: Hash, tips: Vec<Hash>) -> Self {
        Self { pivot, tips }
    }

    /// `1 + max(level(pivot), max level(tips))`, using a level lookup
    /// provided by the caller (the DAG manager, which owns the graph).
    pub fn propose_level(&self, level_of: impl Fn(Hash) -> u64) -> u64 {
        let pivot_level = level_of(self.pivot);
        let max_tip = self.tips.iter().map(|t| level_of(*t)).max().unwrap_or(0);
        1 + pivot_level.max(max_tip)
    }
}
