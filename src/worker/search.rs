//! Blocking vanity search over a fixed set of worker threads.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::config::{ConfigError, SearchConfig};
use crate::crypto::{KeySource, OsKeySource};
use crate::matcher::Pattern;

use super::cpu::CpuWorker;
use super::sink::{ResultSink, SearchResult, StopHandle, StopReason, StopSignal, WorkerStats};
use super::SearchError;

/// Aggregate statistics for a finished search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSummary {
    /// Wall-clock time from start until every worker stopped
    pub elapsed: Duration,
    /// Results emitted to the consumer
    pub matches: u64,
    /// Keys tried, including failed generations
    pub attempts: u64,
    /// Attempts where the key source failed
    pub generation_failures: u64,
    /// Matches found after the search began stopping, never emitted
    pub discarded: u64,
    /// What ended the search
    pub stop_reason: StopReason,
}

impl SearchSummary {
    /// Returns the average generation rate (keys per second).
    pub fn keys_per_second(&self) -> f64 {
        let elapsed = self.elapsed.as_secs_f64();
        if elapsed > 0.0 {
            self.attempts as f64 / elapsed
        } else {
            0.0
        }
    }
}

/// A configured vanity search, run once.
pub struct VanitySearch {
    config: SearchConfig,
    pattern: Pattern,
    source: Arc<dyn KeySource>,
    signal: Arc<StopSignal>,
    stats: Arc<WorkerStats>,
}

impl VanitySearch {
    /// Creates a search that draws keys from the OS random source.
    pub fn new(config: SearchConfig) -> Result<Self, ConfigError> {
        Self::with_key_source(config, OsKeySource)
    }

    /// Creates a search with a custom key source.
    ///
    /// The configuration is validated here, before any worker exists.
    pub fn with_key_source<S>(config: SearchConfig, source: S) -> Result<Self, ConfigError>
    where
        S: KeySource + 'static,
    {
        let pattern = config.validate()?;
        Ok(Self {
            config,
            pattern,
            source: Arc::new(source),
            signal: Arc::new(StopSignal::new()),
            stats: Arc::new(WorkerStats::new()),
        })
    }

    pub fn config(&self) -> &SearchConfig {
        &self.config
    }

    pub fn pattern(&self) -> &Pattern {
        &self.pattern
    }

    /// Returns a handle that cancels this search.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.signal.clone())
    }

    /// Returns the live counters of this search.
    pub fn stats(&self) -> Arc<WorkerStats> {
        self.stats.clone()
    }

    /// Runs the search to completion.
    ///
    /// `on_result` is called once per emitted match, under the sink lock, in
    /// discovery-index order. Returns when every worker has stopped. A
    /// cancelled search still returns normally; everything already emitted
    /// stays emitted.
    pub fn run<F>(self, on_result: F) -> Result<SearchSummary, SearchError>
    where
        F: FnMut(SearchResult) + Send,
    {
        let num_workers = self.config.workers;
        let stop = self.config.stop;
        let start = Instant::now();
        let deadline = stop.duration.map(|d| start + d);

        info!(
            prefix = self.pattern.prefix(),
            workers = num_workers,
            policy = %stop,
            difficulty = self.pattern.estimated_difficulty(),
            "starting search"
        );

        let sink = Arc::new(ResultSink::new(
            on_result,
            stop.target_matches,
            self.signal.clone(),
            self.stats.clone(),
        ));

        let outcome = thread::scope(|scope| {
            let mut handles = Vec::with_capacity(num_workers);

            for id in 0..num_workers {
                let worker = CpuWorker::new(
                    id,
                    self.pattern.clone(),
                    self.source.clone(),
                    sink.clone(),
                    self.signal.clone(),
                    self.stats.clone(),
                    deadline,
                    stop.effective_max_attempts(),
                );

                let spawned = thread::Builder::new()
                    .name(format!("onion-worker-{}", id))
                    .spawn_scoped(scope, move || worker.run());

                match spawned {
                    Ok(handle) => handles.push(handle),
                    Err(e) => {
                        // Workers already running see the signal and wind down
                        // before the scope returns.
                        self.signal.raise(StopReason::Cancelled);
                        return Err(SearchError::Spawn(e));
                    }
                }
            }

            let mut panicked = None;
            for (id, handle) in handles.into_iter().enumerate() {
                if handle.join().is_err() {
                    warn!(worker = id, "worker panicked");
                    panicked.get_or_insert(id);
                }
            }

            match panicked {
                Some(id) => Err(SearchError::WorkerPanicked(id)),
                None => Ok(()),
            }
        });

        let summary = SearchSummary {
            elapsed: start.elapsed(),
            matches: self.stats.total_matches(),
            attempts: self.stats.total_keys(),
            generation_failures: self.stats.total_failures(),
            discarded: self.stats.total_discarded(),
            stop_reason: self.signal.reason().unwrap_or(StopReason::AttemptsExhausted),
        };

        outcome?;

        info!(
            matches = summary.matches,
            attempts = summary.attempts,
            discarded = summary.discarded,
            elapsed_ms = summary.elapsed.as_millis() as u64,
            reason = %summary.stop_reason,
            "search finished"
        );

        Ok(summary)
    }
}
