use dagchain_consensus::{AddBlockOutcome, DagBlockProposer, DagManager, PbftManager, StepOutcome, VoteManager};
use dagchain_core::interfaces::{BlockSigner, DposOracle, FinalChainExecutor, NetworkGossip, PersistenceBatch, PersistenceClient, TransactionPoolClient};
use dagchain_core::sortition::{DeterministicSortition, DeterministicVdf, DifficultyClass, SortitionResult, VdfFunction, VrfOracle};
use dagchain_core::{Address, ConsensusConfig, ConsensusFatalError, DagBlock, Hash, PbftBlock, PbftStep, Period};
use dagchain_notify::{EventBus, Notification};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

fn test_config() -> ConsensusConfig {
    ConsensusConfig {
        lambda_ms_min: 100,
        lambda_backoff_factor: 2,
        lambda_bound: 8,
        committee_size: 5,
        dag_blocks_size: 100,
        ghost_path_move_back: 5,
        gas_limit: 1_000_000,
        dag_gas_limit: 500_000,
        max_tips: 8,
        shard: 0,
        expiry_limit: 50,
        max_levels_per_period: 10,
        eligibility_balance_threshold: 1,
        vote_eligibility_balance_step: 1,
        delegation_delay: 0,
        vrf_threshold_upper: u16::MAX,
        vdf_difficulty_min: 1,
        vdf_difficulty_max: 5,
        vdf_difficulty_stale: 3,
        min_proposal_delay_ms: 0,
        vote_retention: 5,
        max_future_votes: 10,
    }
}

fn blk(hash: Hash, pivot: Hash, tips: &[Hash], level: u64, author: Address) -> DagBlock {
    DagBlock { hash, pivot, tips: tips.to_vec(), level, trxs: vec![], gas_estimate: 0, vdf_proof: vec![], author, signature: vec![] }
}

struct AllEligibleDpos {
    total: u64,
}

impl DposOracle for AllEligibleDpos {
    fn is_eligible(&self, _period: Period, _address: &Address) -> bool {
        true
    }
    fn eligible_total_votes(&self, _period: Period) -> u64 {
        self.total
    }
}

/// Deterministic eligible-with-weight-1 oracle, so tests can reason about
/// quorum thresholds without needing real VRF draws.
struct AlwaysEligibleVrf;

impl VrfOracle for AlwaysEligibleVrf {
    fn sortition(&self, _address: &Address, _input: &[u8], _total_eligible_votes: u64) -> SortitionResult {
        SortitionResult { eligible: true, difficulty_class: DifficultyClass::Normal, weight: 1, proof: vec![] }
    }
    fn verify_sortition(&self, _address: &Address, _input: &[u8], _proof: &[u8], _total_eligible_votes: u64) -> Option<SortitionResult> {
        Some(SortitionResult { eligible: true, difficulty_class: DifficultyClass::Normal, weight: 1, proof: vec![] })
    }
}

/// A VDF stand-in that accepts any proof, for tests exercising DAG/PBFT
/// machinery that doesn't care about real VDF semantics.
struct AlwaysValidVdf;

impl VdfFunction for AlwaysValidVdf {
    fn compute(&self, _input: &[u8], _difficulty: u8) -> Vec<u8> {
        vec![]
    }
    fn verify(&self, _input: &[u8], _difficulty: u8, _proof: &[u8]) -> bool {
        true
    }
}

struct NullTrxPool;

impl TransactionPoolClient for NullTrxPool {
    fn pack(&self, _period: Period, _gas_limit: u64) -> (Vec<Hash>, Vec<u64>) {
        (vec![], vec![])
    }
    fn return_expired(&self, _trx_hashes: &[Hash]) {}
    fn estimate_gas(&self, trx_hashes: &[Hash]) -> Vec<Option<u64>> {
        trx_hashes.iter().map(|_| Some(0)).collect()
    }
}

#[derive(Default)]
struct RecordingTrxPool {
    returned: Mutex<Vec<Hash>>,
}

impl TransactionPoolClient for RecordingTrxPool {
    fn pack(&self, _period: Period, _gas_limit: u64) -> (Vec<Hash>, Vec<u64>) {
        (vec![], vec![])
    }
    fn return_expired(&self, trx_hashes: &[Hash]) {
        self.returned.lock().extend_from_slice(trx_hashes);
    }
    fn estimate_gas(&self, trx_hashes: &[Hash]) -> Vec<Option<u64>> {
        trx_hashes.iter().map(|_| Some(0)).collect()
    }
}

struct NullGossip;

impl NetworkGossip for NullGossip {
    fn broadcast_dag_block(&self, _hash: Hash) {}
    fn broadcast_vote(&self, _voter: Address, _period: Period, _round: u64) {}
    fn broadcast_pbft_block(&self, _hash: Hash) {}
    fn request_missing(&self, _hashes: &[Hash]) {}
}

struct InMemoryBatch;

impl PersistenceBatch for InMemoryBatch {
    fn put(&mut self, _column: &'static str, _key: Vec<u8>, _value: Vec<u8>) {}
    fn remove(&mut self, _column: &'static str, _key: Vec<u8>) {}
}

struct InMemoryPersistence;

impl PersistenceClient for InMemoryPersistence {
    fn begin_batch(&self) -> Box<dyn PersistenceBatch> {
        Box::new(InMemoryBatch)
    }
    fn commit(&self, _batch: Box<dyn PersistenceBatch>) -> Result<(), String> {
        Ok(())
    }
}

struct NullExecutor;

impl FinalChainExecutor for NullExecutor {
    fn finalize(&self, _pbft_block: PbftBlock, _dag_order: Vec<Hash>, on_durable: Box<dyn FnOnce() + Send>) {
        on_durable();
    }
}

#[derive(Default)]
struct CountingSigner {
    counter: AtomicU64,
}

impl BlockSigner for CountingSigner {
    fn sign_dag_block(&self, _unsigned: &DagBlock) -> (Hash, Vec<u8>) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        (Hash::from_u64(1_000_000 + n), vec![])
    }
    fn sign_pbft_block(&self, _unsigned: &PbftBlock) -> (Hash, Vec<u8>) {
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        (Hash::from_u64(2_000_000 + n), vec![])
    }
}

/// A VDF stand-in whose `compute` blocks for a fixed wall-clock delay, so
/// the preemption test has a window in which to observe cancellation
/// before the computation would have finished naturally.
struct SlowVdf {
    delay_ms: u64,
}

impl VdfFunction for SlowVdf {
    fn compute(&self, _input: &[u8], _difficulty: u8) -> Vec<u8> {
        std::thread::sleep(std::time::Duration::from_millis(self.delay_ms));
        vec![9, 9, 9]
    }
    fn verify(&self, _input: &[u8], _difficulty: u8, proof: &[u8]) -> bool {
        proof == [9, 9, 9]
    }
}

/// Boundary scenario: a trivial fork (two siblings under the same pivot,
/// merged by a child referencing both) orders deterministically through the
/// full `add_block` -> `dag_block_order` path, not just the pure function.
#[test]
fn dag_manager_orders_a_simple_branch_through_add_block() {
    let config = test_config();
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 3 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(AlwaysEligibleVrf);
    let vdf: Arc<dyn VdfFunction> = Arc::new(AlwaysValidVdf);
    let trx_pool: Arc<dyn TransactionPoolClient> = Arc::new(NullTrxPool);
    let events = Arc::new(EventBus::new());
    let dag = DagManager::new(genesis, config, dpos, vrf, vdf, trx_pool, events);

    let author = Address::from_bytes([9u8; 20]);
    let a = Hash::from_u64(2);
    let b = Hash::from_u64(3);
    let c = Hash::from_u64(4);

    assert_eq!(dag.add_block(blk(a, genesis, &[], 1, author), vec![], false), AddBlockOutcome::Added);
    assert_eq!(dag.add_block(blk(b, genesis, &[], 1, author), vec![], false), AddBlockOutcome::Added);
    assert_eq!(dag.add_block(blk(c, a, &[b], 2, author), vec![], false), AddBlockOutcome::Added);

    let order = dag.dag_block_order(c);
    assert_eq!(order, vec![genesis, a, b, c]);
}

/// Boundary scenario: preempting an in-flight VDF attempt must return
/// control well before the VDF would have completed on its own.
#[tokio::test]
async fn proposer_preempts_an_in_flight_vdf_attempt() {
    let config = test_config();
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 3 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(AlwaysEligibleVrf);
    let trx_pool: Arc<dyn TransactionPoolClient> = Arc::new(NullTrxPool);
    let events = Arc::new(EventBus::new());
    let dag_vdf: Arc<dyn VdfFunction> = Arc::new(AlwaysValidVdf);
    let dag = Arc::new(DagManager::new(genesis, config.clone(), dpos.clone(), vrf.clone(), dag_vdf, trx_pool.clone(), events));

    let vdf: Arc<dyn VdfFunction> = Arc::new(SlowVdf { delay_ms: 500 });
    let signer: Arc<dyn BlockSigner> = Arc::new(CountingSigner::default());
    let proposer = Arc::new(DagBlockProposer::new(config, Address::from_bytes([1u8; 20]), dag, dpos, vrf, vdf, trx_pool, signer));

    let proposer_clone = proposer.clone();
    let handle = tokio::spawn(async move { proposer_clone.try_propose().await });

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    proposer.preempt();

    let result = tokio::time::timeout(std::time::Duration::from_millis(400), handle)
        .await
        .expect("proposal should return promptly once preempted")
        .unwrap();
    assert!(result.is_none());
}

/// Boundary scenario: a node must not cast a cert-vote unless a soft-vote
/// quorum was actually reached for that block.
#[test]
fn cert_vote_is_withheld_without_a_soft_quorum() {
    let config = test_config();
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 10 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(AlwaysEligibleVrf);
    let vdf: Arc<dyn VdfFunction> = Arc::new(AlwaysValidVdf);
    let trx_pool: Arc<dyn TransactionPoolClient> = Arc::new(NullTrxPool);
    let events = Arc::new(EventBus::new());
    let dag = Arc::new(DagManager::new(genesis, config.clone(), dpos.clone(), vrf.clone(), vdf, trx_pool, events.clone()));
    let votes = Arc::new(VoteManager::new(config.clone(), dpos.clone(), vrf.clone()));
    let persistence: Arc<dyn PersistenceClient> = Arc::new(InMemoryPersistence);
    let gossip: Arc<dyn NetworkGossip> = Arc::new(NullGossip);
    let executor: Arc<dyn FinalChainExecutor> = Arc::new(NullExecutor);
    let signer: Arc<dyn BlockSigner> = Arc::new(CountingSigner::default());
    let address = Address::from_bytes([7u8; 20]);

    let pbft = PbftManager::new(config, address, dag, votes.clone(), vrf, dpos, signer, gossip, persistence, executor, events);

    // CountingSigner's first call produces this candidate hash (counter starts at 0).
    let candidate_hash = Hash::from_u64(2_000_000);

    pbft.drive_step(0).unwrap(); // Propose
    pbft.drive_step(0).unwrap(); // Soft: casts weight-1 vote, far short of 2t+1 = 7 for total 10
    pbft.drive_step(0).unwrap(); // Cert: must withhold since there is no soft quorum

    assert_eq!(votes.weight_for(1, 1, PbftStep::Cert, candidate_hash), 0);
    assert_eq!(pbft.round_state().step, PbftStep::Next(4));
}

/// Boundary scenario: finalizing an anchor prunes non-finalized blocks that
/// fall below the recomputed expiry level and hands their transactions
/// back to the pool.
#[test]
fn set_block_order_prunes_expired_blocks_and_returns_transactions() {
    let mut config = test_config();
    config.expiry_limit = 1;
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 3 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(AlwaysEligibleVrf);
    let vdf: Arc<dyn VdfFunction> = Arc::new(AlwaysValidVdf);
    let trx_pool = Arc::new(RecordingTrxPool::default());
    let events = Arc::new(EventBus::new());
    let trx_pool_handle: Arc<dyn TransactionPoolClient> = trx_pool.clone();
    let dag = DagManager::new(genesis, config, dpos, vrf, vdf, trx_pool_handle, events);

    let author = Address::from_bytes([1u8; 20]);
    let a = Hash::from_u64(2);
    let b = Hash::from_u64(3);
    let c = Hash::from_u64(4);
    let d = Hash::from_u64(9); // disconnected low branch, expires once c finalizes
    let stale_trx = Hash::from_u64(500);

    dag.add_block(blk(a, genesis, &[], 1, author), vec![], false);
    dag.add_block(blk(b, a, &[], 2, author), vec![], false);
    dag.add_block(blk(c, b, &[], 3, author), vec![], false);
    let mut d_block = blk(d, genesis, &[], 1, author);
    d_block.trxs = vec![stale_trx];
    dag.add_block(d_block, vec![stale_trx], false);

    let order = dag.dag_block_order(c);
    let outcome = dag.set_block_order(c, 1, &order);

    assert_eq!(outcome.pruned_blocks, vec![d]);
    assert_eq!(outcome.expired_transactions, vec![stale_trx]);
    assert_eq!(trx_pool.returned.lock().clone(), vec![stale_trx]);
}

/// Boundary scenario: with a single-member committee, a period with no new
/// DAG progress still finalizes as an empty period rather than stalling.
#[test]
fn empty_period_finalizes_without_dag_progress() {
    let config = test_config();
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 1 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(AlwaysEligibleVrf);
    let vdf: Arc<dyn VdfFunction> = Arc::new(AlwaysValidVdf);
    let trx_pool: Arc<dyn TransactionPoolClient> = Arc::new(NullTrxPool);
    let events = Arc::new(EventBus::new());
    let rx = events.subscribe();
    let dag = Arc::new(DagManager::new(genesis, config.clone(), dpos.clone(), vrf.clone(), vdf, trx_pool, events.clone()));
    let votes = Arc::new(VoteManager::new(config.clone(), dpos.clone(), vrf.clone()));
    let persistence: Arc<dyn PersistenceClient> = Arc::new(InMemoryPersistence);
    let gossip: Arc<dyn NetworkGossip> = Arc::new(NullGossip);
    let executor: Arc<dyn FinalChainExecutor> = Arc::new(NullExecutor);
    let signer: Arc<dyn BlockSigner> = Arc::new(CountingSigner::default());
    let address = Address::from_bytes([7u8; 20]);

    let pbft = PbftManager::new(config, address, dag, votes, vrf, dpos, signer, gossip, persistence, executor, events);

    pbft.drive_step(0).unwrap(); // Propose
    pbft.drive_step(0).unwrap(); // Soft: weight-1 vote already meets 2t+1 = 1 for total 1
    pbft.drive_step(0).unwrap(); // Cert: soft quorum present, cert quorum reached too
    let outcome = pbft.drive_step(0).unwrap(); // Next(4): cert quorum found, finalizes

    assert_eq!(outcome, StepOutcome::Finalized(1));
    let notification = rx.try_recv().expect("finalization notification");
    assert_eq!(notification, Notification::BlockFinalized { period: 1, anchor: Hash::ZERO });
}

/// Boundary scenario: a synced-in block whose `order_hash` doesn't match
/// what this node independently computes must be rejected without
/// mutating any DAG or round state (finalization safety under a fork).
#[test]
fn finalize_external_rejects_a_forged_order_hash_without_mutating_state() {
    let config = test_config();
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 3 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(AlwaysEligibleVrf);
    let vdf: Arc<dyn VdfFunction> = Arc::new(AlwaysValidVdf);
    let trx_pool: Arc<dyn TransactionPoolClient> = Arc::new(NullTrxPool);
    let events = Arc::new(EventBus::new());
    let dag = Arc::new(DagManager::new(genesis, config.clone(), dpos.clone(), vrf.clone(), vdf, trx_pool, events.clone()));
    let votes = Arc::new(VoteManager::new(config.clone(), dpos.clone(), vrf.clone()));
    let persistence: Arc<dyn PersistenceClient> = Arc::new(InMemoryPersistence);
    let gossip: Arc<dyn NetworkGossip> = Arc::new(NullGossip);
    let executor: Arc<dyn FinalChainExecutor> = Arc::new(NullExecutor);
    let signer: Arc<dyn BlockSigner> = Arc::new(CountingSigner::default());
    let address = Address::from_bytes([7u8; 20]);

    let pbft = PbftManager::new(config, address, dag.clone(), votes, vrf, dpos, signer, gossip, persistence, executor, events);

    let forged = PbftBlock {
        period: 1,
        prev_block_hash: Hash::ZERO,
        anchor_hash: Hash::ZERO,
        order_hash: Hash::from_u64(999_999), // a correct empty period hashes to order_hash(&[])
        timestamp: 0,
        author: address,
        beneficiary: address,
        signature: vec![],
    };

    let before = dag.non_finalized_len();
    let result = pbft.finalize_external(forged, Hash::from_u64(42));
    assert!(matches!(result, Err(ConsensusFatalError::OrderHashMismatch { .. })));
    assert_eq!(dag.non_finalized_len(), before);
    assert_eq!(dag.latest_period(), 0);
}

/// Boundary scenario: a block produced by the real VRF/VDF implementations
/// (not the `AlwaysEligibleVrf`/`AlwaysValidVdf` fakes used elsewhere in
/// this suite) must pass `DagManager::verify_block` end to end, the same
/// way a peer receiving it over the network would verify it.
#[tokio::test]
async fn proposed_block_passes_real_vrf_vdf_verification() {
    let config = test_config();
    let genesis = Hash::from_u64(1);
    let dpos: Arc<dyn DposOracle> = Arc::new(AllEligibleDpos { total: 3 });
    let vrf: Arc<dyn VrfOracle> = Arc::new(DeterministicSortition { threshold_upper: u16::MAX, stale_threshold: 100 });
    let vdf: Arc<dyn VdfFunction> = Arc::new(DeterministicVdf);
    let trx_pool: Arc<dyn TransactionPoolClient> = Arc::new(NullTrxPool);
    let events = Arc::new(EventBus::new());
    let dag = Arc::new(DagManager::new(genesis, config.clone(), dpos.clone(), vrf.clone(), vdf.clone(), trx_pool.clone(), events));

    let signer: Arc<dyn BlockSigner> = Arc::new(CountingSigner::default());
    let address = Address::from_bytes([3u8; 20]);
    let proposer = DagBlockProposer::new(config, address, dag.clone(), dpos, vrf, vdf, trx_pool, signer);

    let block = proposer.try_propose().await.expect("eligible author should produce a block");
    assert_eq!(dag.verify_block(&block), Ok(()));
}
