//! Runtime configuration for the onion vanity generator.
//!
//! [`SearchConfig`] is what the search engine consumes. [`Config`] is the
//! command-line surface that builds one.

use std::time::Duration;

use clap::Parser;

use crate::matcher::{Pattern, PatternError};

/// Per-worker attempt ceiling used when no other stop condition is given.
pub const DEFAULT_MAX_ATTEMPTS: u64 = 65_536;

/// When a search stops. Unset fields impose no limit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StopPolicy {
    /// Attempts each worker makes before it stops on its own
    pub max_attempts_per_worker: Option<u64>,
    /// Wall-clock limit for the whole search
    pub duration: Option<Duration>,
    /// Total matches after which all workers stop
    pub target_matches: Option<u64>,
}

impl StopPolicy {
    /// A policy with no limits; the search runs until cancelled.
    pub fn unbounded() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, max: u64) -> Self {
        self.max_attempts_per_worker = Some(max);
        self
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn with_target_matches(mut self, count: u64) -> Self {
        self.target_matches = Some(count);
        self
    }

    /// Per-worker ceiling actually enforced.
    ///
    /// A match-count target overrides the ceiling: workers keep going until the
    /// global target is met.
    pub fn effective_max_attempts(&self) -> Option<u64> {
        match self.target_matches {
            Some(_) => None,
            None => self.max_attempts_per_worker,
        }
    }

    /// Returns true if nothing but cancellation will end the search.
    pub fn is_unbounded(&self) -> bool {
        self.effective_max_attempts().is_none()
            && self.duration.is_none()
            && self.target_matches.is_none()
    }
}

impl std::fmt::Display for StopPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_unbounded() {
            return write!(f, "until cancelled");
        }

        let mut parts = Vec::new();
        if let Some(count) = self.target_matches {
            parts.push(format!("{} match(es)", count));
        }
        if let Some(duration) = self.duration {
            parts.push(format!("{:.1}s", duration.as_secs_f64()));
        }
        if let Some(max) = self.effective_max_attempts() {
            parts.push(format!("{} attempts/worker", max));
        }
        write!(f, "{}", parts.join(", "))
    }
}

/// Configuration for one search, fixed for its lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchConfig {
    /// Address prefix, matched case-insensitively. Empty accepts everything.
    pub prefix: String,
    /// Number of worker threads
    pub workers: usize,
    /// Stop conditions
    pub stop: StopPolicy,
}

impl SearchConfig {
    pub fn new(prefix: impl Into<String>, workers: usize, stop: StopPolicy) -> Self {
        Self {
            prefix: prefix.into(),
            workers,
            stop,
        }
    }

    /// Validates the configuration and compiles the prefix.
    ///
    /// Every error here is raised before any worker starts.
    pub fn validate(&self) -> Result<Pattern, ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }

        if self.stop.target_matches == Some(0) {
            return Err(ConfigError::ZeroCount);
        }

        if self.stop.duration == Some(Duration::ZERO) {
            return Err(ConfigError::ZeroDuration);
        }

        // A ceiling is ignored once a match count is set.
        if self.stop.effective_max_attempts() == Some(0) {
            return Err(ConfigError::ZeroMaxAttempts);
        }

        Ok(Pattern::new(&self.prefix)?)
    }
}

/// Tor v3 vanity onion address generator
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Config {
    /// Prefix to search for (base32 characters: a-z, 2-7; case-insensitive)
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Don't search for a prefix; print every address generated
    #[arg(long, conflicts_with = "prefix")]
    pub no_prefix: bool,

    /// Maximum attempts per worker (ignored when --count is set)
    #[arg(short, long)]
    pub max: Option<u64>,

    /// Number of worker threads (default: number of CPU cores)
    #[arg(short = 'w', long, visible_alias = "grs")]
    pub workers: Option<usize>,

    /// Stop after finding N addresses; overrides --max
    #[arg(short = 'n', long)]
    pub count: Option<u64>,

    /// Stop after this many seconds
    #[arg(short = 'd', long)]
    pub duration: Option<u64>,

    /// Progress report interval in seconds
    #[arg(short = 'r', long, default_value = "5")]
    pub report_interval: u64,

    /// Print the base64 expanded secret key instead of the raw 64-byte private key
    #[arg(long, default_value = "false")]
    pub expanded: bool,

    /// Log level: error, warn, info, debug or trace (RUST_LOG takes precedence)
    #[arg(long, default_value = "info")]
    pub log_level: tracing::Level,
}

impl Config {
    /// Returns the number of workers, defaulting to CPU count
    pub fn worker_count(&self) -> usize {
        self.workers.unwrap_or_else(num_cpus::get)
    }

    /// Returns the prefix to search for, empty in enumeration mode
    pub fn prefix(&self) -> &str {
        self.prefix.as_deref().unwrap_or("")
    }

    /// Returns the stop policy described by the flags.
    ///
    /// With no --count, --duration or --max, each worker stops after
    /// [`DEFAULT_MAX_ATTEMPTS`].
    pub fn stop_policy(&self) -> StopPolicy {
        let mut stop = StopPolicy::unbounded();
        if let Some(count) = self.count {
            stop = stop.with_target_matches(count);
        }
        if let Some(secs) = self.duration {
            stop = stop.with_duration(Duration::from_secs(secs));
        }
        match self.max {
            Some(max) => stop = stop.with_max_attempts(max),
            None if self.count.is_none() && self.duration.is_none() => {
                stop = stop.with_max_attempts(DEFAULT_MAX_ATTEMPTS)
            }
            None => {}
        }
        stop
    }

    /// Builds the engine configuration.
    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::new(self.prefix(), self.worker_count(), self.stop_policy())
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let missing = self.prefix.as_deref().map_or(true, str::is_empty);
        if missing && !self.no_prefix {
            return Err(ConfigError::MissingPrefix);
        }

        if self.report_interval == 0 {
            return Err(ConfigError::ZeroReportInterval);
        }

        self.search_config().validate().map(|_| ())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("must provide --prefix; if no prefix is desired, use --no-prefix")]
    MissingPrefix,

    #[error("worker count must be at least 1")]
    ZeroWorkers,

    #[error("match count must be at least 1")]
    ZeroCount,

    #[error("duration must be greater than zero")]
    ZeroDuration,

    #[error("maximum attempts per worker must be at least 1")]
    ZeroMaxAttempts,

    #[error("report interval must be at least 1 second")]
    ZeroReportInterval,

    #[error("invalid prefix: {0}")]
    InvalidPrefix(#[from] PatternError),
}
