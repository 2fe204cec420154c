//! Serialized result sink shared by all workers.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex};

use tracing::{debug, trace};

use crate::crypto::{Address, Keypair};

/// A match emitted by the search, in discovery order.
#[derive(Debug, Clone)]
pub struct SearchResult {
    /// Position in emission order, starting at 0
    pub index: u64,
    /// The matching address
    pub address: Address,
    /// The keypair the address was derived from
    pub keypair: Keypair,
    /// The ID of the worker that found this result
    pub worker_id: usize,
}

/// Why a search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum StopReason {
    /// Stopped through a [`StopHandle`], Ctrl-C or a panicking worker
    Cancelled = 1,
    /// The configured number of matches was emitted
    TargetReached = 2,
    /// The configured duration elapsed
    Deadline = 3,
    /// Every worker used up its attempt ceiling
    AttemptsExhausted = 4,
}

impl StopReason {
    fn from_u8(value: u8) -> Option<Self> {
        match value {
            1 => Some(StopReason::Cancelled),
            2 => Some(StopReason::TargetReached),
            3 => Some(StopReason::Deadline),
            4 => Some(StopReason::AttemptsExhausted),
            _ => None,
        }
    }
}

impl std::fmt::Display for StopReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StopReason::Cancelled => write!(f, "cancelled"),
            StopReason::TargetReached => write!(f, "target reached"),
            StopReason::Deadline => write!(f, "time limit reached"),
            StopReason::AttemptsExhausted => write!(f, "attempts exhausted"),
        }
    }
}

/// The global stop signal. It is raised at most once; the first reason wins.
#[derive(Debug, Default)]
pub struct StopSignal {
    reason: AtomicU8,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Raises the signal. Returns false if it was already raised.
    pub fn raise(&self, reason: StopReason) -> bool {
        self.reason
            .compare_exchange(0, reason as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    #[inline]
    pub fn is_raised(&self) -> bool {
        self.reason.load(Ordering::Acquire) != 0
    }

    pub fn reason(&self) -> Option<StopReason> {
        StopReason::from_u8(self.reason.load(Ordering::Acquire))
    }
}

/// Cancels a running search from outside, e.g. from a Ctrl-C handler.
#[derive(Debug, Clone)]
pub struct StopHandle(Arc<StopSignal>);

impl StopHandle {
    pub(crate) fn new(signal: Arc<StopSignal>) -> Self {
        Self(signal)
    }

    /// Signals all workers to stop.
    pub fn stop(&self) {
        self.0.raise(StopReason::Cancelled);
    }

    /// Returns true if the search has been signaled to stop, for any reason.
    pub fn is_stopped(&self) -> bool {
        self.0.is_raised()
    }
}

/// Counters shared by all workers of one search.
#[derive(Debug, Default)]
pub struct WorkerStats {
    /// Total attempts, including failed generations
    pub keys_generated: AtomicU64,
    /// Attempts where the key source failed
    pub generation_failures: AtomicU64,
    /// Matches emitted to the consumer
    pub matches_found: AtomicU64,
    /// Matches dropped because the search was already stopping
    pub discarded: AtomicU64,
}

impl WorkerStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_keys(&self) -> u64 {
        self.keys_generated.load(Ordering::Relaxed)
    }

    pub fn total_matches(&self) -> u64 {
        self.matches_found.load(Ordering::Relaxed)
    }

    pub fn total_failures(&self) -> u64 {
        self.generation_failures.load(Ordering::Relaxed)
    }

    pub fn total_discarded(&self) -> u64 {
        self.discarded.load(Ordering::Relaxed)
    }
}

/// Outcome of handing a match to the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Submission {
    /// Emitted with this discovery index
    Emitted(u64),
    /// Dropped because the search is stopping
    Discarded,
}

struct SinkState<F> {
    emitted: u64,
    on_result: F,
}

/// Assigns discovery indices and hands results to the consumer.
///
/// Index assignment, the consumer call and the target check happen under one
/// lock, so the consumer can do unsynchronized I/O. Once the target is met or
/// the stop signal is up, further submissions are discarded, which keeps the
/// emitted indices exactly `0..target`.
pub struct ResultSink<F> {
    state: Mutex<SinkState<F>>,
    target: Option<u64>,
    signal: Arc<StopSignal>,
    stats: Arc<WorkerStats>,
}

impl<F> ResultSink<F>
where
    F: FnMut(SearchResult),
{
    pub fn new(
        on_result: F,
        target: Option<u64>,
        signal: Arc<StopSignal>,
        stats: Arc<WorkerStats>,
    ) -> Self {
        Self {
            state: Mutex::new(SinkState {
                emitted: 0,
                on_result,
            }),
            target,
            signal,
            stats,
        }
    }

    /// Emits a match unless the search is already stopping.
    pub fn submit(&self, worker_id: usize, address: Address, keypair: Keypair) -> Submission {
        let mut state = match self.state.lock() {
            Ok(state) => state,
            Err(_) => {
                // A consumer call panicked on another worker.
                self.signal.raise(StopReason::Cancelled);
                return self.discard();
            }
        };

        if self.signal.is_raised() || self.target.is_some_and(|t| state.emitted >= t) {
            return self.discard();
        }

        let index = state.emitted;
        trace!(worker = worker_id, index, %address, "emitting match");
        (state.on_result)(SearchResult {
            index,
            address,
            keypair,
            worker_id,
        });
        state.emitted += 1;
        self.stats.matches_found.fetch_add(1, Ordering::Relaxed);

        if self.target == Some(state.emitted) && self.signal.raise(StopReason::TargetReached) {
            debug!(matches = state.emitted, "match target reached");
        }

        Submission::Emitted(index)
    }

    /// Returns the number of results emitted so far.
    pub fn emitted(&self) -> u64 {
        match self.state.lock() {
            Ok(state) => state.emitted,
            Err(poisoned) => poisoned.into_inner().emitted,
        }
    }

    fn discard(&self) -> Submission {
        self.stats.discarded.fetch_add(1, Ordering::Relaxed);
        Submission::Discarded
    }
}
