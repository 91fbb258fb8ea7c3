use serde::{Deserialize, Serialize};
use std::fmt;

/// Byte size of a [`Hash`].
pub const HASH_SIZE: usize = 32;

/// A 32-byte content identifier.
///
/// `Hash::ZERO` (`H0` in spec terms) is reserved as "parent-of-genesis" and
/// is also used as the PBFT null-block hash for next-votes.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const ZERO: Hash = Hash([0u8; HASH_SIZE]);

    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn is_zero(&self) -> bool {
        *self == Self::ZERO
    }

    /// Deterministic test/demo hash derived from a small integer, analogous to
    /// `blockhash::new_unique` in the teacher crate but reproducible rather than
    /// counter-based, which is what the ordering round-trip tests need.
    pub fn from_u64(word: u64) -> Self {
        let mut bytes = [0u8; HASH_SIZE];
        bytes[..8].copy_from_slice(&word.to_le_bytes());
        Self(bytes)
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0[..4] {
            write!(f, "{:02x}", b)?;
        }
        write!(f, "..")
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_is_reserved() {
        assert!(Hash::ZERO.is_zero());
        assert_ne!(Hash::from_u64(1), Hash::ZERO);
    }

    #[test]
    fn serde_round_trip_preserves_hash() {
        let h = Hash::from_u64(42);
        let encoded = bincode::serialize(&h).unwrap();
        let decoded: Hash = bincode::deserialize(&encoded).unwrap();
        assert_eq!(h, decoded);
    }
}
