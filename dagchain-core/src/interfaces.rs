//! External collaborator interfaces, spec.md §6.
//!
//! Everything in this module is a trait boundary onto a system that is out
//! of scope for this crate (JSON-RPC, wire protocol, EVM execution, on-disk
//! storage, wallet/keys — spec.md §1). The consensus core is constructed
//! with `Arc<dyn Trait>` implementations of these and never reaches past
//! them, per the "no process-wide singletons" design note (spec.md §9).

use crate::dag_block::DagBlock;
use crate::pbft_block::{Period, PbftBlock};
use crate::{Address, Hash};

/// `transaction_pool.pack(period, gas_limit)`, spec.md §6.
pub trait TransactionPoolClient: Send + Sync {
    /// Pack transactions for a DAG block proposal, returning transaction
    /// hashes plus per-transaction gas estimations (spec.md §4.2 step 9).
    /// Implementations are expected to filter by shard upstream of this call
    /// is not required — the proposer does the shard filtering itself on the
    /// returned hashes (spec.md §4.2 step 9).
    fn pack(&self, period: Period, gas_limit: u64) -> (Vec<Hash>, Vec<u64>);

    /// Called by the DAG manager after `set_block_order` prunes expired
    /// blocks (spec.md §4.1 "Expiry"): hands the pool the transaction hashes
    /// of blocks that fell out of the DAG so it can decide re-admission.
    fn return_expired(&self, trx_hashes: &[Hash]);

    /// Re-derives gas estimations for a block's already-packed transaction
    /// hashes, used by `verify_block` to check that transaction hashes match
    /// included transactions and that the declared `gas_estimate` is correct
    /// (spec.md §4.1 `verify_block`). One entry per hash in `trx_hashes`,
    /// `None` where the pool has no record of that hash.
    fn estimate_gas(&self, trx_hashes: &[Hash]) -> Vec<Option<u64>>;
}

/// `dpos_is_eligible`/`dpos_eligible_total_votes`, spec.md §6.
pub trait DposOracle: Send + Sync {
    fn is_eligible(&self, period: Period, address: &Address) -> bool;
    fn eligible_total_votes(&self, period: Period) -> u64;
}

/// `begin_batch/put/remove/commit`, spec.md §6. `commit` is assumed atomic:
/// a crash before it returns discards every write staged in the batch.
/// Columns used by the consensus core: `dag_blocks`, `dag_block_period`,
/// `period_data`, `verified_votes`, `pbft_mgr_field`, `pbft_mgr_status`.
pub trait PersistenceBatch: Send {
    fn put(&mut self, column: &'static str, key: Vec<u8>, value: Vec<u8>);
    fn remove(&mut self, column: &'static str, key: Vec<u8>);
}

/// Boxed-batch form of the persistence interface, kept object-safe (no
/// associated type) so it can be injected as `Arc<dyn PersistenceClient>`
/// the same way the other collaborators in this module are.
pub trait PersistenceClient: Send + Sync {
    fn begin_batch(&self) -> Box<dyn PersistenceBatch>;
    fn commit(&self, batch: Box<dyn PersistenceBatch>) -> Result<(), String>;
}

/// `broadcast_dag_block/broadcast_vote/broadcast_pbft_block/request_missing`,
/// spec.md §6.
pub trait NetworkGossip: Send + Sync {
    fn broadcast_dag_block(&self, hash: Hash);
    fn broadcast_vote(&self, voter: Address, period: Period, round: u64);
    fn broadcast_pbft_block(&self, hash: Hash);
    fn request_missing(&self, hashes: &[Hash]);
}

/// `finalize(pbft_block, dag_order, transactions)` with a durability
/// callback, spec.md §6. The callback models "invoked once state is
/// durable"; final-chain execution is fire-and-forget from the consensus
/// core's perspective (spec.md §5 "Cancellation").
pub trait FinalChainExecutor: Send + Sync {
    fn finalize(&self, pbft_block: PbftBlock, dag_order: Vec<Hash>, on_durable: Box<dyn FnOnce() + Send>);
}

/// Content-hashing and signing boundary for both block kinds, spec.md §1
/// ("wallet/keys... out of scope"): the proposer and PBFT manager build every
/// other field of a block, then hand the unsigned candidate across this
/// trait to get back the content hash and signature an external key-holder
/// produces.
pub trait BlockSigner: Send + Sync {
    fn sign_dag_block(&self, unsigned: &DagBlock) -> (Hash, Vec<u8>);
    fn sign_pbft_block(&self, unsigned: &PbftBlock) -> (Hash, Vec<u8>);
}
