//! # onion_vanity
//!
//! Tor v3 onion address codec and vanity address generator.
//!
//! ## Architecture
//!
//! - `crypto`: Ed25519 key generation and the onion address codec
//! - `matcher`: Case-insensitive prefix matching
//! - `worker`: Parallel search, stop conditions and result ordering
//! - `config`: Search and command-line configuration

pub mod config;
pub mod crypto;
pub mod matcher;
pub mod worker;

pub use config::{Config, ConfigError, SearchConfig, StopPolicy};
pub use crypto::{Address, AddressError, CryptoError, KeySource, Keypair, OsKeySource};
pub use matcher::{MatchResult, Pattern, PatternError};
pub use worker::{
    Poll, SearchError, SearchResult, SearchSummary, StopHandle, StopReason, VanitySearch,
    WorkerPool,
};
