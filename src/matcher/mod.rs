//! Prefix matching for onion addresses.
//!
//! Matching is case-insensitive. An empty prefix accepts every address, which
//! turns a search into plain enumeration.

mod pattern;

pub use pattern::{MatchResult, Pattern, PatternError};
