//! Worker pool management.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{unbounded, Receiver, RecvTimeoutError};

use crate::config::SearchConfig;
use crate::matcher::Pattern;

use super::search::{SearchSummary, VanitySearch};
use super::sink::{SearchResult, StopHandle, WorkerStats};
use super::SearchError;

/// Outcome of waiting on a [`WorkerPool`].
#[derive(Debug)]
pub enum Poll {
    /// The next result in discovery order
    Result(SearchResult),
    /// Nothing arrived within the timeout
    Timeout,
    /// The search is over and every result has been received
    Finished,
}

/// Runs a [`VanitySearch`] in the background and streams its results.
pub struct WorkerPool {
    /// Number of workers
    num_workers: usize,
    /// The pattern to search for
    pattern: Pattern,
    /// Coordinator thread (Option to allow taking during join)
    handle: Option<JoinHandle<Result<SearchSummary, SearchError>>>,
    /// Channel receiver for results
    result_rx: Receiver<SearchResult>,
    /// Cancels the search
    stop: StopHandle,
    /// Shared statistics
    stats: Arc<WorkerStats>,
    /// Start time
    start_time: Instant,
}

impl WorkerPool {
    /// Validates `config` and starts searching with OS randomness.
    pub fn spawn(config: SearchConfig) -> Result<Self, SearchError> {
        Self::from_search(VanitySearch::new(config)?)
    }

    /// Starts an already configured search in the background.
    pub fn from_search(search: VanitySearch) -> Result<Self, SearchError> {
        // Unbounded so the sender never blocks while holding the sink lock.
        let (result_tx, result_rx) = unbounded();

        let num_workers = search.config().workers;
        let pattern = search.pattern().clone();
        let stop = search.stop_handle();
        let stats = search.stats();

        let handle = thread::Builder::new()
            .name("onion-search".into())
            .spawn(move || {
                search.run(move |result| {
                    // The receiver may be gone if the pool was dropped.
                    let _ = result_tx.send(result);
                })
            })
            .map_err(SearchError::Spawn)?;

        Ok(Self {
            num_workers,
            pattern,
            handle: Some(handle),
            result_rx,
            stop,
            stats,
            start_time: Instant::now(),
        })
    }

    /// Waits up to `timeout` for the next result.
    pub fn poll(&self, timeout: Duration) -> Poll {
        match self.result_rx.recv_timeout(timeout) {
            Ok(result) => Poll::Result(result),
            Err(RecvTimeoutError::Timeout) => Poll::Timeout,
            // The sender lives in the sink, which is dropped once all workers stop.
            Err(RecvTimeoutError::Disconnected) => Poll::Finished,
        }
    }

    /// Returns an iterator over results (blocking), ending when the search does.
    pub fn results(&self) -> impl Iterator<Item = SearchResult> + '_ {
        self.result_rx.iter()
    }

    /// Signals all workers to stop.
    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Returns a clone of the stop handle for external use (e.g., signal handlers).
    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Returns true if the pool has been signaled to stop.
    pub fn is_stopped(&self) -> bool {
        self.stop.is_stopped()
    }

    /// Waits for the search to end on its own and returns its summary.
    ///
    /// Call [`stop`](Self::stop) first to end an unbounded search. Results not
    /// yet received are dropped with the pool.
    pub fn join(mut self) -> Result<SearchSummary, SearchError> {
        let handle = self.handle.take().ok_or(SearchError::SearchThreadPanicked)?;
        handle.join().map_err(|_| SearchError::SearchThreadPanicked)?
    }

    /// Returns the number of workers.
    pub fn num_workers(&self) -> usize {
        self.num_workers
    }

    /// Returns the pattern being searched for.
    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns the total keys generated across all workers.
    pub fn total_keys(&self) -> u64 {
        self.stats.total_keys()
    }

    /// Returns the total matches found.
    pub fn total_matches(&self) -> u64 {
        self.stats.total_matches()
    }

    /// Returns the elapsed time since the pool was created.
    pub fn elapsed(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Returns the current generation rate (keys per second).
    pub fn keys_per_second(&self) -> f64 {
        let elapsed = self.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.total_keys() as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Wait for workers to finish if they haven't been joined
        if let Some(handle) = self.handle.take() {
            self.stop();
            let _ = handle.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::{AtomicU64, Ordering};

    use crate::config::StopPolicy;
    use crate::crypto::{CryptoError, KeySource, Keypair};
    use crate::worker::StopReason;

    /// Panics on its eleventh call.
    struct PanickingSource {
        calls: AtomicU64,
    }

    impl KeySource for PanickingSource {
        fn generate(&self) -> Result<Keypair, CryptoError> {
            if self.calls.fetch_add(1, Ordering::Relaxed) == 10 {
                panic!("key source failed");
            }
            Keypair::generate()
        }
    }

    #[test]
    fn test_streams_all_results() {
        let config = SearchConfig::new("", 4, StopPolicy::unbounded().with_target_matches(50));
        let pool = WorkerPool::spawn(config).unwrap();
        assert_eq!(pool.num_workers(), 4);

        let indices: Vec<u64> = pool.results().map(|r| r.index).collect();
        assert_eq!(indices, (0..50).collect::<Vec<_>>());

        let summary = pool.join().unwrap();
        assert_eq!(summary.matches, 50);
        assert_eq!(summary.stop_reason, StopReason::TargetReached);
    }

    #[test]
    fn test_stop_ends_unbounded_search() {
        let config = SearchConfig::new("zzzzzzzzzz", 2, StopPolicy::unbounded());
        let pool = WorkerPool::spawn(config).unwrap();
        assert!(matches!(pool.poll(Duration::from_millis(50)), Poll::Timeout));

        pool.stop();
        assert!(pool.is_stopped());

        let summary = pool.join().unwrap();
        assert_eq!(summary.stop_reason, StopReason::Cancelled);
        assert_eq!(summary.matches, 0);
    }

    #[test]
    fn test_live_counters() {
        let config = SearchConfig::new("", 2, StopPolicy::unbounded().with_max_attempts(100));
        let pool = WorkerPool::spawn(config).unwrap();
        let mut received = 0;
        loop {
            match pool.poll(Duration::from_secs(5)) {
                Poll::Result(_) => received += 1,
                Poll::Timeout => panic!("search stalled"),
                Poll::Finished => break,
            }
        }

        assert_eq!(received, 200);
        assert_eq!(pool.total_matches(), 200);
        assert_eq!(pool.total_keys(), 200);
    }

    #[test]
    fn test_join_surfaces_worker_panic() {
        let source = PanickingSource {
            calls: AtomicU64::new(0),
        };
        let config = SearchConfig::new("", 4, StopPolicy::unbounded());
        let search = VanitySearch::with_key_source(config, source).unwrap();
        let pool = WorkerPool::from_search(search).unwrap();

        // The stream ends once the surviving workers see the stop signal.
        assert!(pool.results().all(|r| r.worker_id < 4));
        assert!(pool.is_stopped());

        assert!(matches!(pool.join(), Err(SearchError::WorkerPanicked(_))));
    }

    #[test]
    fn test_invalid_config() {
        let config = SearchConfig::new("fun!", 1, StopPolicy::unbounded());
        assert!(matches!(WorkerPool::spawn(config), Err(SearchError::Config(_))));
    }
}
