use crate::{Address, Hash};
use serde::{Deserialize, Serialize};

/// An immutable DAG block, per spec.md §3.
///
/// `hash` is derived from the remaining fields by the signer; this crate does
/// not recompute content hashes (hashing/signing primitives are out of scope,
/// see spec.md §1) but callers are expected to have verified `hash` matches
/// its content before constructing a `DagBlock` that is treated as trusted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagBlock {
    pub hash: Hash,
    pub pivot: Hash,
    pub tips: Vec<Hash>,
    pub level: u64,
    pub trxs: Vec<Hash>,
    pub gas_estimate: u64,
    pub vdf_proof: Vec<u8>,
    pub author: Address,
    pub signature: Vec<u8>,
}

impl DagBlock {
    /// `level = 1 + max(level(pivot), max level(tips))`, computed by the
    /// caller from the parents' known levels and compared against
    /// `self.level` during verification.
    pub fn expected_level(pivot_level: u64, tip_levels: impl IntoIterator<Item = u64>) -> u64 {
        let max_tip = tip_levels.into_iter().max().unwrap_or(0);
        1 + pivot_level.max(max_tip)
    }

    /// All distinct tips, excluding `pivot` itself (spec.md §3 invariant:
    /// "all tips distinct from pivot").
    pub fn tips_distinct_from_pivot(&self) -> bool {
        !self.tips.contains(&self.pivot)
    }

    pub fn is_genesis(&self) -> bool {
        self.pivot.is_zero() && self.level == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(pivot: Hash, tips: Vec<Hash>, level: u64) -> DagBlock {
        DagBlock {
            hash: Hash::from_u64(999),
            pivot,
            tips,
            level,
            trxs: vec![],
            gas_estimate: 0,
            vdf_proof: vec![],
            author: Address::default(),
            signature: vec![],
        }
    }

    #[test]
    fn expected_level_takes_max_of_pivot_and_tips() {
        assert_eq!(DagBlock::expected_level(3, [1, 5, 2]), 6);
        assert_eq!(DagBlock::expected_level(5, []), 6);
    }

    #[test]
    fn tips_distinct_from_pivot_invariant() {
        let p = Hash::from_u64(1);
        let t = Hash::from_u64(2);
        assert!(block(p, vec![t], 2).tips_distinct_from_pivot());
        assert!(!block(p, vec![p, t], 2).tips_distinct_from_pivot());
    }
}
