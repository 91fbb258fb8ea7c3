//! Leaderless DAG-BFT consensus core: the DAG proposer, DAG manager, vote
//! manager and PBFT manager (spec.md §2). Every external system this core
//! touches — wire protocol, on-disk storage, EVM execution, wallet/keys,
//! JSON-RPC — is injected as a trait object from `dagchain_core::interfaces`;
//! this crate owns no process-wide state.

pub mod dag;
pub mod pbft;
pub mod proposer;
pub mod vote;

pub use dag::{AddBlockOutcome, DagManager, ExpiryOutcome};
pub use pbft::{PbftManager, PbftRoundRecord, RoundState, StepOutcome};
pub use proposer::{DagBlockProposer, NodeDagProposerData};
pub use vote::{VerifyVoteError, VoteManager};
