//! Event notifications the consensus core emits, per spec.md §2's
//! `block_verified`/`block_finalized` arrows and §9's design note ("DAG
//! manager exposes an event channel the proposer subscribes to").
//!
//! This intentionally stays far lighter than a full RPC subscription system
//! (JSON-RPC/GraphQL are out of scope, spec.md §1): it is an in-process
//! fan-out so the proposer and any test harness can observe state
//! transitions without reaching into the DAG/PBFT managers' locks.

use crossbeam_channel::{unbounded, Receiver, Sender};
use dagchain_core::pbft_block::Period;
use dagchain_core::Hash;
use parking_lot::Mutex;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notification {
    /// Emitted by `DagManager::add_block` once a block is verified and
    /// inserted (spec.md §4.1 `add_block`).
    BlockVerified(Hash),
    /// Emitted by the PBFT manager once a period is finalized (spec.md §4.3
    /// "Finalization" step 4).
    BlockFinalized { period: Period, anchor: Hash },
}

/// Multi-subscriber fan-out: every call to [`EventBus::subscribe`] gets its
/// own unbounded receiver, and `notify` clones the event to every live
/// subscriber. Dead subscribers (closed receivers) are pruned lazily on the
/// next `notify` call.
#[derive(Default)]
pub struct EventBus {
    subscribers: Mutex<Vec<Sender<Notification>>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self { subscribers: Mutex::new(Vec::new()) }
    }

    pub fn subscribe(&self) -> Receiver<Notification> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    pub fn notify(&self, notification: Notification) {
        let mut subs = self.subscribers.lock();
        subs.retain(|tx| tx.send(notification.clone()).is_ok());
    }
}
