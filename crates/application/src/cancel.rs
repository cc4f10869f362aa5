//! Per-request cancellation bookkeeping.
//!
//! Each open request has at most one in-flight run. Starting a new run
//! cancels the previous one, and a per-request gate serializes result
//! recording so the superseded run always lands in the store before the
//! new run does. Cancelling with nothing in flight is a no-op.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tokio_util::sync::CancellationToken;

use quiver_domain::{RequestId, RunId};

struct Slot {
    run_id: RunId,
    token: CancellationToken,
    gate: Arc<AsyncMutex<()>>,
}

/// Handle for one run's lifetime in the registry.
pub struct RunHandle {
    /// The run this handle belongs to.
    pub run_id: RunId,
    /// Token the run observes at every stage boundary.
    pub token: CancellationToken,
    gate: Arc<AsyncMutex<()>>,
}

impl RunHandle {
    /// Waits for the superseded run (if any) to record its result.
    ///
    /// The returned guard must be held until this run has recorded its
    /// own result, so the next run waits in turn.
    pub async fn acquire(&self) -> OwnedMutexGuard<()> {
        Arc::clone(&self.gate).lock_owned().await
    }
}

/// Tracks the in-flight run per request.
#[derive(Default)]
pub struct CancellationRegistry {
    slots: Mutex<HashMap<RequestId, Slot>>,
}

impl CancellationRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new run, cancelling any run already in flight for
    /// the same request.
    #[must_use]
    pub fn begin(&self, request_id: RequestId, run_id: RunId) -> RunHandle {
        let mut slots = self.lock();
        let token = CancellationToken::new();

        let gate = match slots.remove(&request_id) {
            Some(previous) => {
                previous.token.cancel();
                previous.gate
            }
            None => Arc::new(AsyncMutex::new(())),
        };

        slots.insert(
            request_id,
            Slot {
                run_id,
                token: token.clone(),
                gate: Arc::clone(&gate),
            },
        );

        RunHandle {
            run_id,
            token,
            gate,
        }
    }

    /// Cancels the in-flight run for a request, if any.
    pub fn cancel(&self, request_id: RequestId) {
        if let Some(slot) = self.lock().get(&request_id) {
            slot.token.cancel();
        }
    }

    /// Removes the slot once a run has recorded its result.
    ///
    /// A newer run may already own the slot; in that case this is a
    /// no-op so the newer run's token stays live.
    pub fn release(&self, request_id: RequestId, run_id: RunId) {
        let mut slots = self.lock();
        if slots.get(&request_id).is_some_and(|s| s.run_id == run_id) {
            slots.remove(&request_id);
        }
    }

    /// Returns the identifier of the in-flight run, if any.
    #[must_use]
    pub fn active_run(&self, request_id: RequestId) -> Option<RunId> {
        self.lock().get(&request_id).map(|s| s.run_id)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<RequestId, Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn begin_cancels_the_previous_run() {
        let registry = CancellationRegistry::new();
        let request_id = RequestId::new();

        let first = registry.begin(request_id, RunId::new());
        assert!(!first.token.is_cancelled());

        let second = registry.begin(request_id, RunId::new());
        assert!(first.token.is_cancelled());
        assert!(!second.token.is_cancelled());
        assert_eq!(registry.active_run(request_id), Some(second.run_id));
    }

    #[test]
    fn cancel_without_a_run_is_a_noop() {
        let registry = CancellationRegistry::new();
        registry.cancel(RequestId::new());
    }

    #[test]
    fn release_ignores_superseded_runs() {
        let registry = CancellationRegistry::new();
        let request_id = RequestId::new();

        let first = registry.begin(request_id, RunId::new());
        let second = registry.begin(request_id, RunId::new());

        registry.release(request_id, first.run_id);
        assert_eq!(registry.active_run(request_id), Some(second.run_id));

        registry.release(request_id, second.run_id);
        assert_eq!(registry.active_run(request_id), None);
    }

    #[tokio::test]
    async fn gate_serializes_consecutive_runs() {
        let registry = CancellationRegistry::new();
        let request_id = RequestId::new();

        let first = registry.begin(request_id, RunId::new());
        let guard = first.acquire().await;

        let second = registry.begin(request_id, RunId::new());
        // The second run cannot acquire until the first records.
        assert!(
            tokio::time::timeout(std::time::Duration::from_millis(10), second.acquire())
                .await
                .is_err()
        );

        drop(guard);
        let _guard = second.acquire().await;
    }
}
