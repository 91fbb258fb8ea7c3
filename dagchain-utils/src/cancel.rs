//! A future-with-cancellation primitive for the VDF worker, built on
//! `triggered` (the teacher's own dependency for shutdown signaling) rather
//! than a hand-rolled atomic polling loop dressed up as a primitive (spec.md
//! §9 "Async VDF" design note).

/// Signals cancellation to every [`CancelToken`] cloned from the same
/// [`cancellable`] pair.
#[derive(Clone)]
pub struct Canceller {
    trigger: triggered::Trigger,
}

impl Canceller {
    pub fn cancel(&self) {
        self.trigger.trigger();
    }
}

/// Observed by the VDF worker: polled between iterations, must be bounded in
/// how long it takes for cancellation to become observable (spec.md §4.2
/// "Cancellation contract": within 100ms of signal).
#[derive(Clone)]
pub struct CancelToken {
    listener: triggered::Listener,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        self.listener.is_triggered()
    }

    /// Resolves once cancellation is signaled; used to wait for an
    /// in-flight VDF worker to observe cancellation before restarting.
    pub async fn cancelled(&self) {
        self.listener.clone().await;
    }
}

/// Build a fresh cancellation pair for one VDF attempt.
pub fn cancellable() -> (Canceller, CancelToken) {
    let (trigger, listener) = triggered::trigger();
    (Canceller { trigger }, CancelToken { listener })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cancel_is_observable_by_clones() {
        let (canceller, token) = cancellable();
        let token2 = token.clone();
        assert!(!token.is_cancelled());
        canceller.cancel();
        token2.cancelled().await;
        assert!(token.is_cancelled());
    }
}
