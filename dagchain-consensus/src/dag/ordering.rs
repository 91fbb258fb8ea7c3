use super::store::DagStore;
use dagchain_core::Hash;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Deterministic topological ordering of every non-finalized block reachable
/// from `anchor`, per spec.md §4.1 "Ordering algorithm". Pure function of
/// `store` and `anchor` — calling it twice with the same DAG state yields
/// byte-identical output (spec.md §8 invariant 2).
///
/// Per spec.md §9's Open Question resolution: if `anchor` is not present in
/// `store` (already finalized/ordered by an earlier period), this returns
/// the empty sequence without touching any state.
pub fn dag_block_order(store: &DagStore, anchor: Hash) -> Vec<Hash> {
    if !store.contains(&anchor) {
        return Vec::new();
    }

    let pivot_chain = anchor_pivot_chain(store, anchor);
    let reachable = reachable_from(store, anchor);

    let mut by_level: BTreeMap<u64, Vec<Hash>> = BTreeMap::new();
    for hash in reachable {
        let level = store.level_of(&hash).expect("reachable set only contains present blocks");
        by_level.entry(level).or_default().push(hash);
    }

    let mut order = Vec::with_capacity(by_level.values().map(Vec::len).sum());
    for (_, mut hashes) in by_level {
        // Anchor-pivot-chain blocks first, then lexicographically by hash —
        // this tie-break is the consensus rule every node must reproduce
        // identically.
        hashes.sort_by_key(|h| (if pivot_chain.contains(h) { 0u8 } else { 1u8 }, *h));
        order.extend(hashes);
    }
    order
}

/// Hashes of `anchor` and its pivot ancestors that are still present in
/// `store` (the part of the pivot chain this node has in memory).
fn anchor_pivot_chain(store: &DagStore, anchor: Hash) -> HashSet<Hash> {
    let mut chain = HashSet::new();
    let mut current = anchor;
    loop {
        chain.insert(current);
        let Some(block) = store.get(&current) else { break };
        if block.pivot.is_zero() || !store.contains(&block.pivot) {
            break;
        }
        current = block.pivot;
    }
    chain
}

/// `anchor` plus every present ancestor reachable via pivot or tip edges
/// (spec.md §4.1 step 1).
fn reachable_from(store: &DagStore, anchor: Hash) -> HashSet<Hash> {
    let mut visited = HashSet::new();
    let mut stack = vec![anchor];
    while let Some(hash) = stack.pop() {
        if !visited.insert(hash) {
            continue;
        }
        let Some(block) = store.get(&hash) else { continue };
        if !block.pivot.is_zero() && store.contains(&block.pivot) {
            stack.push(block.pivot);
        }
        for tip in &block.tips {
            if store.contains(tip) {
                stack.push(*tip);
            }
        }
    }
    visited
}

/// Deterministic commitment to an ordered block sequence, used by the PBFT
/// manager to check a proposed `order_hash` against the order this node
/// independently computes (spec.md §4.3 "Finalization"). Not a
/// cryptographic primitive — just a fold a full digest scheme would
/// otherwise need, collapsed into the minimum this crate actually consumes.
pub fn order_hash(order: &[Hash]) -> Hash {
    let mut acc: u64 = 0xcbf29ce484222325;
    for hash in order {
        for b in hash.as_bytes() {
            acc ^= *b as u64;
            acc = acc.wrapping_mul(0x100000001b3);
        }
    }
    Hash::from_u64(acc)
}

/// From `source`, repeatedly descend to the pivot child with the largest
/// total-DAG subtree, breaking ties by lexicographically smallest hash.
/// Returns the sequence of pivots starting at `source` and ending at the
/// ghost leaf (spec.md §4.1 `ghost_path`).
pub fn ghost_path(store: &DagStore, source: Hash) -> Vec<Hash> {
    let mut result = Vec::new();
    let mut memo: HashMap<Hash, u64> = HashMap::new();
    let mut current = source;
    loop {
        if !store.contains(&current) {
            break;
        }
        result.push(current);
        let children = store.pivot_children_of(&current);
        if children.is_empty() {
            break;
        }
        let mut best: Option<(u64, Hash)> = None;
        for &child in children {
            let weight = store.subtree_weight(child, &mut memo);
            best = Some(match best {
                None => (weight, child),
                Some((best_weight, best_hash)) => {
                    if weight > best_weight || (weight == best_weight && child < best_hash) {
                        (weight, child)
                    } else {
                        (best_weight, best_hash)
                    }
                }
            });
        }
        current = best.expect("non-empty children").1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagchain_core::{Address, DagBlock};

    fn blk(hash: u64, pivot: u64, tips: &[u64], level: u64) -> DagBlock {
        DagBlock {
            hash: Hash::from_u64(hash),
            pivot: Hash::from_u64(pivot),
            tips: tips.iter().map(|t| Hash::from_u64(*t)).collect(),
            level,
            trxs: vec![],
            gas_estimate: 0,
            vdf_proof: vec![],
            author: Address::default(),
            signature: vec![],
        }
    }

    /// Boundary scenario 1 (spec.md §8): A(pivot=genesis), B(pivot=genesis),
    /// C(pivot=A, tips=[B]); order with anchor=C must be [A, B, C].
    #[test]
    fn trivial_dag_ordering() {
        let mut store = DagStore::new();
        store.insert(blk(1, 0, &[], 1)); // A
        store.insert(blk(2, 0, &[], 1)); // B
        store.insert(blk(3, 1, &[2], 2)); // C

        let order = dag_block_order(&store, Hash::from_u64(3));
        assert_eq!(order, vec![Hash::from_u64(1), Hash::from_u64(2), Hash::from_u64(3)]);
    }

    #[test]
    fn order_is_deterministic_across_repeated_calls() {
        let mut store = DagStore::new();
        store.insert(blk(1, 0, &[], 1));
        store.insert(blk(2, 0, &[], 1));
        store.insert(blk(3, 1, &[2], 2));

        let first = dag_block_order(&store, Hash::from_u64(3));
        let second = dag_block_order(&store, Hash::from_u64(3));
        assert_eq!(first, second);
    }

    #[test]
    fn order_on_unknown_anchor_returns_empty() {
        let store = DagStore::new();
        assert!(dag_block_order(&store, Hash::from_u64(42)).is_empty());
    }

    #[test]
    fn ghost_path_of_single_chain_equals_the_chain() {
        let mut store = DagStore::new();
        store.insert(blk(1, 0, &[], 1));
        store.insert(blk(2, 1, &[], 2));
        store.insert(blk(3, 2, &[], 3));

        let path = ghost_path(&store, Hash::from_u64(1));
        assert_eq!(path, vec![Hash::from_u64(1), Hash::from_u64(2), Hash::from_u64(3)]);
    }

    #[test]
    fn order_hash_is_deterministic_and_order_sensitive() {
        let a = Hash::from_u64(1);
        let b = Hash::from_u64(2);
        assert_eq!(order_hash(&[a, b]), order_hash(&[a, b]));
        assert_ne!(order_hash(&[a, b]), order_hash(&[b, a]));
    }

    #[test]
    fn ghost_path_picks_heavier_subtree_then_breaks_ties_by_hash() {
        let mut store = DagStore::new();
        store.insert(blk(1, 0, &[], 1));
        // Two pivot children of 1: branch via 2 has one descendant (total
        // weight 2), branch via 3 is a leaf (weight 1) -> ghost path takes 2.
        store.insert(blk(2, 1, &[], 2));
        store.insert(blk(3, 1, &[], 2));
        store.insert(blk(4, 2, &[], 3));

        let path = ghost_path(&store, Hash::from_u64(1));
        assert_eq!(path, vec![Hash::from_u64(1), Hash::from_u64(2), Hash::from_u64(4)]);
    }
}
