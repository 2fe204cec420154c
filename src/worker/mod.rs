//! Parallel vanity search engine.
//!
//! This module provides:
//! - Multi-threaded CPU workers with cooperative cancellation
//! - A serialized result sink that assigns discovery indices
//! - A blocking search ([`VanitySearch`]) and a streaming pool ([`WorkerPool`])

mod cpu;
mod pool;
mod search;
mod sink;

pub use cpu::{CpuWorker, WorkerExit};
pub use pool::{Poll, WorkerPool};
pub use search::{SearchSummary, VanitySearch};
pub use sink::{
    ResultSink, SearchResult, StopHandle, StopReason, StopSignal, Submission, WorkerStats,
};

use crate::config::ConfigError;

/// Errors that end a search abnormally.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("worker {0} panicked")]
    WorkerPanicked(usize),

    #[error("search thread panicked")]
    SearchThreadPanicked,
}
