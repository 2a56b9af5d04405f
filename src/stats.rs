//! Baton lifecycle instrumentation
//!
//! Counts every lifecycle transition and, optionally, reports each one to a
//! [`LifecycleObserver`] together with the thread it happened on. Leak checks
//! compare `created` against `disposed`.

use crate::baton::{BatonId, BatonState};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

/// Receives every Baton state transition
pub trait LifecycleObserver: Send + Sync {
    fn on_transition(&self, baton: BatonId, state: BatonState, thread: ThreadId);
}

/// Shared counters for all Batons of one event loop
#[derive(Default)]
pub struct Instrumentation {
    transitions: [AtomicU64; BatonState::COUNT],
    faults: AtomicU64,
    observer: Option<Arc<dyn LifecycleObserver>>,
}

impl Instrumentation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_observer(observer: Arc<dyn LifecycleObserver>) -> Self {
        Self {
            observer: Some(observer),
            ..Self::default()
        }
    }

    /// Record that `baton` entered `state` on the current thread
    pub fn record(&self, baton: BatonId, state: BatonState) {
        self.transitions[state.index()].fetch_add(1, Ordering::AcqRel);
        if let Some(observer) = &self.observer {
            observer.on_transition(baton, state, thread::current().id());
        }
    }

    pub fn record_fault(&self) {
        self.faults.fetch_add(1, Ordering::AcqRel);
    }

    fn count(&self, state: BatonState) -> u64 {
        self.transitions[state.index()].load(Ordering::Acquire)
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            created: self.count(BatonState::Created),
            queued: self.count(BatonState::Queued),
            running: self.count(BatonState::Running),
            completed: self.count(BatonState::Completed),
            dispatched: self.count(BatonState::Dispatched),
            disposed: self.count(BatonState::Disposed),
            faults: self.faults.load(Ordering::Acquire),
        }
    }
}

impl std::fmt::Debug for Instrumentation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instrumentation")
            .field("snapshot", &self.snapshot())
            .field("observer", &self.observer.is_some())
            .finish()
    }
}

/// Point-in-time copy of the lifecycle counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub created: u64,
    pub queued: u64,
    pub running: u64,
    pub completed: u64,
    pub dispatched: u64,
    pub disposed: u64,
    pub faults: u64,
}

impl StatsSnapshot {
    /// Batons created but not yet disposed
    pub fn outstanding(&self) -> u64 {
        self.created.saturating_sub(self.disposed)
    }
}

/// One observed transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub baton: BatonId,
    pub state: BatonState,
    pub thread: ThreadId,
}

/// Observer that keeps every transition for later verification.
#[derive(Debug, Default)]
pub struct TransitionLog {
    entries: Mutex<Vec<Transition>>,
}

impl TransitionLog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn transitions(&self) -> Vec<Transition> {
        self.entries.lock().clone()
    }

    pub fn for_baton(&self, baton: BatonId) -> Vec<Transition> {
        self.entries
            .lock()
            .iter()
            .filter(|t| t.baton == baton)
            .copied()
            .collect()
    }

    /// Check every recorded Baton walked the full lifecycle in order, with
    /// `Running`/`Completed` on a thread other than `callback_thread` and
    /// `Dispatched` on `callback_thread`.
    pub fn verify(&self, callback_thread: ThreadId) -> Result<usize, String> {
        let mut by_baton: HashMap<BatonId, Vec<Transition>> = HashMap::new();
        for t in self.entries.lock().iter() {
            by_baton.entry(t.baton).or_default().push(*t);
        }

        for (baton, seen) in &by_baton {
            let states: Vec<BatonState> = seen.iter().map(|t| t.state).collect();
            if states != BatonState::ALL {
                return Err(format!("baton {} went through {:?}", baton, states));
            }
            for t in seen {
                let on_callback_thread = t.thread == callback_thread;
                let misplaced = match t.state {
                    BatonState::Running | BatonState::Completed => on_callback_thread,
                    BatonState::Dispatched => !on_callback_thread,
                    _ => false,
                };
                if misplaced {
                    return Err(format!("baton {} entered {:?} on the wrong thread", baton, t.state));
                }
            }
        }
        Ok(by_baton.len())
    }
}

impl LifecycleObserver for TransitionLog {
    fn on_transition(&self, baton: BatonId, state: BatonState, thread: ThreadId) {
        self.entries.lock().push(Transition {
            baton,
            state,
            thread,
        });
    }
}
