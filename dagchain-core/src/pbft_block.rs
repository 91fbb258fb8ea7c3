use crate::{Address, Hash};
use serde::{Deserialize, Serialize};

/// Index of a finalized PBFT block on the linear PBFT chain. Period 0 is
/// genesis (spec.md §3).
pub type Period = u64;

/// Attempt index within a period; resets on finalization.
pub type Round = u64;

/// PBFT round step. `Next` covers every `step >= 4` (the original protocol
/// allows unbounded next-vote rounds within a period attempt); this crate
/// only needs to distinguish the first four, so `Next(n)` carries the exact
/// step number for logging/persistence fidelity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PbftStep {
    Propose,
    Soft,
    Cert,
    Next(u32),
}

impl PbftStep {
    pub fn as_u32(&self) -> u32 {
        match self {
            PbftStep::Propose => 1,
            PbftStep::Soft => 2,
            PbftStep::Cert => 3,
            PbftStep::Next(n) => (*n).max(4),
        }
    }
}

/// `{period, prev_block_hash, anchor_hash, order_hash, timestamp, author,
/// beneficiary, signature}`, per spec.md §3. `anchor_hash == Hash::ZERO`
/// denotes an "empty period" (no DAG anchor was finalized).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PbftBlock {
    pub period: Period,
    pub prev_block_hash: Hash,
    pub anchor_hash: Hash,
    pub order_hash: Hash,
    pub timestamp: u64,
    pub author: Address,
    pub beneficiary: Address,
    pub signature: Vec<u8>,
}

impl PbftBlock {
    pub fn is_empty_period(&self) -> bool {
        self.anchor_hash.is_zero()
    }
}
