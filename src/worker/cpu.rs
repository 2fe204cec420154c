//! CPU-based worker for vanity address generation.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread;
use std::time::Instant;

use tracing::debug;

use crate::crypto::KeySource;
use crate::matcher::Pattern;

use super::sink::{ResultSink, SearchResult, StopReason, StopSignal, WorkerStats};

/// Attempts a worker makes between updates of the shared counter.
const STATS_BATCH: u64 = 256;

/// How a single worker's loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerExit {
    /// The global stop signal was observed
    Signalled,
    /// This worker reached its own attempt ceiling
    Exhausted,
}

/// Raises the stop signal if the worker unwinds, so the others do not run on.
struct PanicGuard<'a>(&'a StopSignal);

impl Drop for PanicGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.0.raise(StopReason::Cancelled);
        }
    }
}

/// A CPU worker that generates and tests keypairs.
pub struct CpuWorker<F> {
    /// Worker ID
    id: usize,
    /// The pattern to match against
    pattern: Pattern,
    /// Where fresh keypairs come from
    source: Arc<dyn KeySource>,
    /// Shared result sink
    sink: Arc<ResultSink<F>>,
    /// Shared stop signal
    signal: Arc<StopSignal>,
    /// Shared statistics
    stats: Arc<WorkerStats>,
    /// Point in time after which the whole search stops
    deadline: Option<Instant>,
    /// Attempt ceiling for this worker
    max_attempts: Option<u64>,
}

impl<F> CpuWorker<F>
where
    F: FnMut(SearchResult),
{
    /// Creates a new CPU worker.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: usize,
        pattern: Pattern,
        source: Arc<dyn KeySource>,
        sink: Arc<ResultSink<F>>,
        signal: Arc<StopSignal>,
        stats: Arc<WorkerStats>,
        deadline: Option<Instant>,
        max_attempts: Option<u64>,
    ) -> Self {
        Self {
            id,
            pattern,
            source,
            sink,
            signal,
            stats,
            deadline,
            max_attempts,
        }
    }

    /// Runs the worker loop.
    ///
    /// Generates keypairs and tests them against the pattern until:
    /// - The stop signal is raised (cancellation or match target)
    /// - The deadline passes, which raises the signal for everyone
    /// - This worker's attempt ceiling is reached
    ///
    /// A failed key generation still counts as an attempt and is retried.
    pub fn run(&self) -> WorkerExit {
        let _guard = PanicGuard(&self.signal);
        debug!(worker = self.id, "worker started");

        let mut attempts = 0u64;
        let mut unflushed = 0u64;

        let exit = loop {
            if let Some(exit) = self.should_stop(attempts) {
                break exit;
            }

            attempts += 1;
            unflushed += 1;
            if unflushed == STATS_BATCH {
                self.stats.keys_generated.fetch_add(unflushed, Ordering::Relaxed);
                unflushed = 0;
            }

            let keypair = match self.source.generate() {
                Ok(keypair) => keypair,
                Err(e) => {
                    self.stats.generation_failures.fetch_add(1, Ordering::Relaxed);
                    debug!(worker = self.id, error = %e, "key generation failed, retrying");
                    continue;
                }
            };

            let address = keypair.address();
            if !self.pattern.matches(&address).is_match() {
                continue;
            }

            // Skip the sink lock when the search is already over.
            if self.signal.is_raised() {
                self.stats.discarded.fetch_add(1, Ordering::Relaxed);
                continue;
            }

            self.sink.submit(self.id, address, keypair);
        };

        self.stats.keys_generated.fetch_add(unflushed, Ordering::Relaxed);
        debug!(worker = self.id, attempts, ?exit, "worker stopped");
        exit
    }

    /// Evaluates the stop conditions in precedence order.
    ///
    /// A reached match target shows up as a raised signal: the sink raises it
    /// in the same critical section that emits the last result.
    fn should_stop(&self, attempts: u64) -> Option<WorkerExit> {
        if self.signal.is_raised() {
            return Some(WorkerExit::Signalled);
        }

        if let Some(deadline) = self.deadline {
            if Instant::now() >= deadline {
                self.signal.raise(StopReason::Deadline);
                return Some(WorkerExit::Signalled);
            }
        }

        match self.max_attempts {
            Some(max) if attempts >= max => Some(WorkerExit::Exhausted),
            _ => None,
        }
    }

    /// Returns the worker ID.
    pub fn id(&self) -> usize {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicU64;
    use std::time::Duration;

    use crate::crypto::{CryptoError, Keypair, OsKeySource};

    /// Fails every other call.
    struct FlakySource {
        calls: AtomicU64,
    }

    impl KeySource for FlakySource {
        fn generate(&self) -> Result<Keypair, CryptoError> {
            if self.calls.fetch_add(1, Ordering::Relaxed) % 2 == 0 {
                Err(CryptoError::RandomSource("unavailable".into()))
            } else {
                Keypair::generate()
            }
        }
    }

    fn make_worker<F: FnMut(SearchResult)>(
        on_result: F,
        pattern: Pattern,
        source: Arc<dyn KeySource>,
        deadline: Option<Instant>,
        max_attempts: Option<u64>,
    ) -> (CpuWorker<F>, Arc<StopSignal>, Arc<WorkerStats>) {
        let signal = Arc::new(StopSignal::new());
        let stats = Arc::new(WorkerStats::new());
        let sink = Arc::new(ResultSink::new(on_result, None, signal.clone(), stats.clone()));
        let worker = CpuWorker::new(
            0,
            pattern,
            source,
            sink,
            signal.clone(),
            stats.clone(),
            deadline,
            max_attempts,
        );
        (worker, signal, stats)
    }

    #[test]
    fn test_stops_at_attempt_ceiling() {
        let mut found = 0;
        let (worker, signal, stats) =
            make_worker(|_| found += 1, Pattern::any(), Arc::new(OsKeySource), None, Some(300));

        assert_eq!(worker.run(), WorkerExit::Exhausted);
        assert!(!signal.is_raised());
        assert_eq!(stats.total_keys(), 300);
        assert_eq!(stats.total_matches(), 300);
        drop(worker);
        assert_eq!(found, 300);
    }

    #[test]
    fn test_generation_failures_are_retried() {
        let source = Arc::new(FlakySource {
            calls: AtomicU64::new(0),
        });
        let (worker, _, stats) = make_worker(|_| {}, Pattern::any(), source, None, Some(10));

        assert_eq!(worker.run(), WorkerExit::Exhausted);
        assert_eq!(stats.total_keys(), 10);
        assert_eq!(stats.total_failures(), 5);
        assert_eq!(stats.total_matches(), 5);
    }

    #[test]
    fn test_deadline_raises_signal() {
        let pattern = Pattern::new("zzzzzzzzzz").unwrap();
        let deadline = Instant::now() + Duration::from_millis(50);
        let (worker, signal, _) =
            make_worker(|_| {}, pattern, Arc::new(OsKeySource), Some(deadline), None);

        assert_eq!(worker.run(), WorkerExit::Signalled);
        assert_eq!(signal.reason(), Some(StopReason::Deadline));
        assert!(Instant::now() >= deadline);
    }

    #[test]
    fn test_raised_signal_stops_before_any_attempt() {
        let (worker, signal, stats) =
            make_worker(|_| {}, Pattern::any(), Arc::new(OsKeySource), None, None);
        signal.raise(StopReason::Cancelled);

        assert_eq!(worker.run(), WorkerExit::Signalled);
        assert_eq!(stats.total_keys(), 0);
    }
}
