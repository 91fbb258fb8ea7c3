use crate::Hash;
use thiserror::Error;

/// Outcome of the DAG manager's block verification (spec.md §4.1
/// `verify_block`). Deterministic and non-mutating: producing one of these
/// never changes DAG state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DagVerificationError {
    #[error("block references {0} unknown transaction(s)")]
    MissingTransaction(usize),

    #[error("block level {got} is ahead of the proposer's known frontier (expected <= {max_known})")]
    AheadBlock { got: u64, max_known: u64 },

    #[error("VDF proof failed verification against the sortition threshold for this level")]
    FailedVdfVerification,

    #[error("block timestamp is in the future")]
    FutureBlock,

    #[error("author {0:?} is not DPOS-eligible to propose at this period")]
    NotEligible(crate::Address),

    #[error("block level {level} is below the current dag expiry level {expiry_level}")]
    ExpiredBlock { level: u64, expiry_level: u64 },

    #[error("committed gas_estimate does not match the sum of per-transaction estimations")]
    IncorrectTransactionsEstimation,

    #[error("block size/tip count exceeds configured limits")]
    BlockTooBig,

    #[error("one or more parent edges failed verification (unknown pivot, tip duplicate of pivot, or tip level >= block level)")]
    FailedTipsVerification,
}

/// Fatal errors per spec.md §7's "Consensus mismatch" and "Persistence
/// failure" rows: never corrupt local state, abort the in-flight operation
/// and surface this to the caller instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConsensusFatalError {
    #[error("order_hash mismatch for anchor {anchor:?} at period {period}: committed {committed:?}, computed {computed:?}")]
    OrderHashMismatch { anchor: Hash, period: u64, committed: Hash, computed: Hash },

    #[error("persistence batch commit failed: {0}")]
    PersistenceFailure(String),
}
