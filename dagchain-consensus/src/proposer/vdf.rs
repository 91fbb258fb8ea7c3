use dagchain_core::sortition::VdfFunction;
use dagchain_utils::CancelToken;
use std::sync::Arc;
use std::time::Duration;

/// Poll interval between cancellation checks (spec.md §4.2 "Cancellation
/// contract": a frontier change must be observed within 100ms).
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Drives `vdf.compute` to completion on a blocking thread, racing it
/// against `token`. Returns `None` as soon as cancellation is observed
/// instead of waiting for `compute` to finish — the VDF itself isn't
/// preemptible, but the caller stops waiting on it and the result is
/// discarded.
pub async fn run_cancellable(vdf: Arc<dyn VdfFunction>, input: Vec<u8>, difficulty: u8, token: CancelToken) -> Option<Vec<u8>> {
    if token.is_cancelled() {
        return None;
    }
    let handle = tokio::task::spawn_blocking(move || vdf.compute(&input, difficulty));
    tokio::pin!(handle);
    loop {
        tokio::select! {
            result = &mut handle => {
                return result.ok();
            }
            _ = tokio::time::sleep(POLL_INTERVAL) => {
                if token.is_cancelled() {
                    handle.abort();
                    return None;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dagchain_core::sortition::DeterministicVdf;
    use dagchain_utils::cancellable;

    #[tokio::test]
    async fn completes_with_proof_when_not_cancelled() {
        let (_canceller, token) = cancellable();
        let result = run_cancellable(Arc::new(DeterministicVdf), b"input".to_vec(), 2, token).await;
        assert!(result.is_some());
    }

    #[tokio::test]
    async fn returns_none_when_already_cancelled() {
        let (canceller, token) = cancellable();
        canceller.cancel();
        let result = run_cancellable(Arc::new(DeterministicVdf), b"input".to_vec(), 2, token).await;
        assert!(result.is_none());
    }
}
