//! VRF/VDF trait boundary.
//!
//! Cryptographic primitive design is explicitly out of scope (spec.md §1,
//! Non-goals): this module defines the *interfaces* the DAG manager and
//! proposer drive, plus a deterministic in-memory implementation used by
//! tests and as a reference default. A production node would inject a real
//! VRF/VDF implementation (the same way `kaspa-pow`'s difficulty oracle is a
//! plugged-in crate rather than inlined consensus logic).

use crate::{Address, Hash};
use serde::{Deserialize, Serialize};

/// VDF difficulty class a VRF sortition draw falls into, per spec.md §4.2
/// step 5 and the GLOSSARY's "Stale block" entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum DifficultyClass {
    Normal,
    Stale,
}

/// Result of a VRF sortition draw: whether the address is eligible, which
/// VDF difficulty class applies, the number of "eligible votes" the proof
/// hashes to (a vote's weight, spec.md §3), and the raw proof bytes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortitionResult {
    pub eligible: bool,
    pub difficulty_class: DifficultyClass,
    pub weight: u64,
    pub proof: Vec<u8>,
}

/// Eligibility and weight oracle: DPOS stake lookups and VRF sortition.
/// Implemented by an external collaborator; the consensus core only calls
/// through this trait (spec.md §9 design note on cyclic references / no
/// singletons).
pub trait VrfOracle: Send + Sync {
    /// Draw VRF sortition for `address` over `input` (built by the caller
    /// from `(level, period_block_hash)` per spec.md §4.2 step 5, or from
    /// `(period, round, step)` for PBFT votes).
    fn sortition(&self, address: &Address, input: &[u8], total_eligible_votes: u64) -> SortitionResult;

    /// Verify a previously produced sortition proof without redoing the
    /// secret-key computation (used by `verify_block` and vote
    /// verification).
    fn verify_sortition(
        &self,
        address: &Address,
        input: &[u8],
        proof: &[u8],
        total_eligible_votes: u64,
    ) -> Option<SortitionResult>;
}

/// A verifiable delay function proof over a VRF-derived input, difficulty
/// set by sortition class (GLOSSARY). `compute` is expected to take
/// wall-clock time proportional to `difficulty`; callers drive it from a
/// cancellable worker (see `dagchain_consensus::proposer::vdf`).
pub trait VdfFunction: Send + Sync {
    fn compute(&self, input: &[u8], difficulty: u8) -> Vec<u8>;
    fn verify(&self, input: &[u8], difficulty: u8, proof: &[u8]) -> bool;
}

/// Deterministic, non-cryptographic VRF/VDF pair for tests and as a runnable
/// default. Eligibility is derived from a simple hash of `(address, input)`
/// compared against `vrf_threshold_upper`-style odds; this stands in for the
/// real sortition math the same way a unit test fakes a clock.
#[derive(Clone, Debug, Default)]
pub struct DeterministicSortition {
    pub threshold_upper: u16,
    pub stale_threshold: u16,
}

fn fold_hash(address: &Address, input: &[u8]) -> u64 {
    let mut acc: u64 = 0xcbf29ce484222325;
    for b in address.as_bytes().iter().chain(input.iter()) {
        acc ^= *b as u64;
        acc = acc.wrapping_mul(0x100000001b3);
    }
    acc
}

impl VrfOracle for DeterministicSortition {
    fn sortition(&self, address: &Address, input: &[u8], total_eligible_votes: u64) -> SortitionResult {
        let digest = fold_hash(address, input);
        let draw = (digest % (u16::MAX as u64 + 1)) as u16;
        let eligible = draw <= self.threshold_upper;
        let difficulty_class = if draw <= self.stale_threshold { DifficultyClass::Stale } else { DifficultyClass::Normal };
        let weight = if eligible && total_eligible_votes > 0 {
            1 + (digest % 3)
        } else {
            0
        };
        SortitionResult { eligible, difficulty_class, weight, proof: digest.to_le_bytes().to_vec() }
    }

    fn verify_sortition(
        &self,
        address: &Address,
        input: &[u8],
        proof: &[u8],
        total_eligible_votes: u64,
    ) -> Option<SortitionResult> {
        let expected = self.sortition(address, input, total_eligible_votes);
        if expected.proof == proof {
            Some(expected)
        } else {
            None
        }
    }
}

/// Deterministic VDF stand-in: "compute" hashes `input` `difficulty` times,
/// which is sequential work proportional to difficulty exactly as the real
/// primitive requires, without needing a real VDF construction in this crate.
#[derive(Clone, Debug, Default)]
pub struct DeterministicVdf;

impl VdfFunction for DeterministicVdf {
    fn compute(&self, input: &[u8], difficulty: u8) -> Vec<u8> {
        let mut state = Hash::from_bytes({
            let mut b = [0u8; 32];
            let n = input.len().min(32);
            b[..n].copy_from_slice(&input[..n]);
            b
        });
        for _ in 0..=difficulty {
            let digest = fold_hash(&Address::default(), state.as_bytes());
            state = Hash::from_u64(digest);
        }
        state.as_bytes().to_vec()
    }

    fn verify(&self, input: &[u8], difficulty: u8, proof: &[u8]) -> bool {
        self.compute(input, difficulty) == proof
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vdf_is_deterministic_and_verifiable() {
        let vdf = DeterministicVdf;
        let proof = vdf.compute(b"input", 3);
        assert!(vdf.verify(b"input", 3, &proof));
        assert!(!vdf.verify(b"input", 4, &proof));
    }

    #[test]
    fn sortition_proof_round_trips_through_verify() {
        let s = DeterministicSortition { threshold_upper: u16::MAX, stale_threshold: 100 };
        let addr = Address::from_bytes([1u8; 20]);
        let result = s.sortition(&addr, b"in", 10);
        let verified = s.verify_sortition(&addr, b"in", &result.proof, 10).unwrap();
        assert_eq!(verified.weight, result.weight);
    }
}
