//! Core types, configuration, error taxonomy and external-collaborator
//! interfaces for the DAG-BFT consensus core.
//!
//! This crate has no logic of its own beyond small, pure helpers on the data
//! types (level arithmetic, shard derivation, 2t+1 threshold math); the
//! state machines live in `dagchain-consensus`.

pub mod address;
pub mod config;
pub mod dag_block;
pub mod errors;
pub mod frontier;
pub mod hash;
pub mod interfaces;
pub mod pbft_block;
pub mod sortition;
pub mod vote;

pub use address::Address;
pub use config::ConsensusConfig;
pub use dag_block::DagBlock;
pub use errors::{ConsensusFatalError, DagVerificationError};
pub use frontier::DagFrontier;
pub use hash::Hash;
pub use pbft_block::{PbftBlock, PbftStep, Period, Round};
pub use vote::{VerifiedVote, Vote};
