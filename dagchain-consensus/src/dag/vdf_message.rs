use dagchain_core::Hash;

/// VDF input message for a DAG block: the block's *parent* (pivot) hash
/// followed by its ordered transaction hashes — never the new block's own
/// hash, which doesn't exist yet at propose time and would make the message
/// self-referential. Matches the original's `DagManager::getVdfMessage`
/// (grounded on `dag/dag_manager.hpp`'s two overloads of the same name, and
/// on `tests/full_node_test.cpp`'s `getVdfMessage(dag_genesis, {trx})` call,
/// where `dag_genesis` is the new block's parent, not its own hash).
pub fn vdf_message(pivot: Hash, trxs: &[Hash]) -> Vec<u8> {
    let mut buf = Vec::with_capacity(32 + trxs.len() * 32);
    buf.extend_from_slice(pivot.as_bytes());
    for trx in trxs {
        buf.extend_from_slice(trx.as_bytes());
    }
    buf
}

/// VRF sortition draw input for a DAG block proposal: `(level,
/// period_block_hash)` per spec.md §4.2 step 5, here using the proposal
/// frontier's pivot hash as the period-block reference. Shared between the
/// proposer (draws sortition) and the DAG manager (recomputes it during
/// `verify_block`) so both sides always agree on what was drawn.
pub fn sortition_input(level: u64, pivot: Hash) -> Vec<u8> {
    let mut buf = Vec::with_capacity(8 + 32);
    buf.extend_from_slice(&level.to_le_bytes());
    buf.extend_from_slice(pivot.as_bytes());
    buf
}
