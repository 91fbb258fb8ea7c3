use crate::pbft_block::{Period, PbftStep, Round};
use crate::{Address, Hash};
use serde::{Deserialize, Serialize};

/// `{voter, period, round, step, block_hash, vrf_proof, signature}`, per
/// spec.md §3. `weight` is not stored on the wire type (it is derived from
/// `vrf_proof` during verification, see [`crate::sortition::VrfOracle`]) but
/// is attached to a [`VerifiedVote`] once computed, so downstream tallying
/// never needs to recompute it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub voter: Address,
    pub period: Period,
    pub round: Round,
    pub step: PbftStep,
    pub block_hash: Hash,
    pub vrf_proof: Vec<u8>,
    pub signature: Vec<u8>,
}

/// A [`Vote`] whose signature and VRF sortition have been validated, with the
/// resulting weight attached. Only the Vote Manager constructs these, and
/// only through verification (spec.md §4.4).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VerifiedVote {
    pub vote: Vote,
    pub weight: u64,
}

impl VerifiedVote {
    pub fn bucket_key(&self) -> (Period, Round, PbftStep, Hash) {
        (self.vote.period, self.vote.round, self.vote.step, self.vote.block_hash)
    }
}
