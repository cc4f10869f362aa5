//! The observable response store.
//!
//! One entry per request, holding the latest result and a bounded run
//! history. Recording appends to the history and swaps the latest
//! pointer under a single write lock, so observers never see one
//! without the other. Change events go out on a broadcast channel
//! after the lock is released.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use tokio::sync::broadcast;

use quiver_domain::{ExecutionResult, RequestId, RunId, RunState};

/// Default per-request history bound.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// A store change, published to subscribers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreEvent {
    /// A run's result was recorded and is now the latest.
    Recorded {
        /// The request the run belongs to.
        request_id: RequestId,
        /// The recorded run.
        run_id: RunId,
        /// The run's terminal state.
        state: RunState,
    },
    /// A request's entry was cleared.
    Cleared {
        /// The cleared request.
        request_id: RequestId,
    },
}

struct Entry {
    /// Run ids, oldest first.
    order: VecDeque<RunId>,
    runs: HashMap<RunId, Arc<ExecutionResult>>,
    latest: RunId,
}

/// Stores every run's result, keyed by request.
pub struct ResponseStore {
    capacity: usize,
    entries: RwLock<HashMap<RequestId, Entry>>,
    events: broadcast::Sender<StoreEvent>,
}

impl Default for ResponseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseStore {
    /// Creates a store with the default history bound.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    /// Creates a store keeping at most `capacity` runs per request.
    ///
    /// A zero capacity is treated as one; the latest run is always
    /// retained.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            capacity: capacity.max(1),
            entries: RwLock::new(HashMap::new()),
            events,
        }
    }

    /// Records a terminal result, making it the request's latest.
    ///
    /// The oldest history entries are evicted beyond the capacity.
    /// Returns the shared handle now owned by the store.
    pub fn record(&self, result: ExecutionResult) -> Arc<ExecutionResult> {
        let request_id = result.request_id;
        let run_id = result.run_id;
        let state = result.state;
        let shared = Arc::new(result);

        {
            let mut entries = self.write();
            let entry = entries.entry(request_id).or_insert_with(|| Entry {
                order: VecDeque::new(),
                runs: HashMap::new(),
                latest: run_id,
            });
            entry.order.push_back(run_id);
            entry.runs.insert(run_id, Arc::clone(&shared));
            entry.latest = run_id;

            while entry.order.len() > self.capacity {
                if let Some(evicted) = entry.order.pop_front() {
                    entry.runs.remove(&evicted);
                }
            }
        }

        let _ = self.events.send(StoreEvent::Recorded {
            request_id,
            run_id,
            state,
        });
        shared
    }

    /// Returns the latest result for a request.
    #[must_use]
    pub fn latest(&self, request_id: RequestId) -> Option<Arc<ExecutionResult>> {
        let entries = self.read();
        let entry = entries.get(&request_id)?;
        entry.runs.get(&entry.latest).cloned()
    }

    /// Returns one run's result.
    #[must_use]
    pub fn run(&self, request_id: RequestId, run_id: RunId) -> Option<Arc<ExecutionResult>> {
        self.read().get(&request_id)?.runs.get(&run_id).cloned()
    }

    /// Returns a request's history, newest first.
    #[must_use]
    pub fn history(&self, request_id: RequestId) -> Vec<Arc<ExecutionResult>> {
        let entries = self.read();
        let Some(entry) = entries.get(&request_id) else {
            return Vec::new();
        };
        entry
            .order
            .iter()
            .rev()
            .filter_map(|id| entry.runs.get(id).cloned())
            .collect()
    }

    /// Drops a request's latest result and history.
    pub fn clear(&self, request_id: RequestId) {
        let removed = self.write().remove(&request_id).is_some();
        if removed {
            let _ = self.events.send(StoreEvent::Cleared { request_id });
        }
    }

    /// Subscribes to store changes.
    ///
    /// Slow subscribers may observe `Lagged`; the store itself never
    /// blocks on them.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<StoreEvent> {
        self.events.subscribe()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<RequestId, Entry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<RequestId, Entry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }
}
