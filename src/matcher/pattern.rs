//! Pattern matching implementation.

use crate::crypto::address::ADDRESS_LEN;
use crate::crypto::Address;

/// Result of a pattern match operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchResult {
    /// Full match found
    Match,
    /// No match
    NoMatch,
}

impl MatchResult {
    #[inline]
    pub fn is_match(self) -> bool {
        matches!(self, MatchResult::Match)
    }
}

/// Why a prefix can never match an address.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PatternError {
    #[error("prefix is {len} characters, addresses are only {max}")]
    TooLong { len: usize, max: usize },

    #[error("prefix contains {0:?}, which is not in the base32 alphabet (a-z, 2-7)")]
    InvalidCharacter(char),
}

/// A case-insensitive address prefix.
///
/// Addresses are always lowercase, so the prefix is lowercased once up front.
/// An empty prefix matches every address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    prefix: String,
}

impl Pattern {
    /// Creates a prefix pattern, rejecting prefixes no address can start with.
    pub fn new(prefix: impl AsRef<str>) -> Result<Self, PatternError> {
        let prefix = prefix.as_ref().to_lowercase();

        if let Some(c) = prefix.chars().find(|&c| !is_alphabet_char(c)) {
            return Err(PatternError::InvalidCharacter(c));
        }

        if prefix.len() > ADDRESS_LEN {
            return Err(PatternError::TooLong {
                len: prefix.len(),
                max: ADDRESS_LEN,
            });
        }

        Ok(Self { prefix })
    }

    /// A pattern that accepts every address.
    pub fn any() -> Self {
        Self {
            prefix: String::new(),
        }
    }

    /// Returns the normalized prefix.
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Returns true if every address matches.
    pub fn is_empty(&self) -> bool {
        self.prefix.is_empty()
    }

    /// Matches an address against this pattern.
    #[inline]
    pub fn matches(&self, address: &Address) -> MatchResult {
        if address.as_str().starts_with(&self.prefix) {
            MatchResult::Match
        } else {
            MatchResult::NoMatch
        }
    }

    /// Returns the estimated number of attempts to find one match.
    ///
    /// Each base32 character has 32 possible values, so this is 32^n.
    pub fn estimated_difficulty(&self) -> u64 {
        32u64.saturating_pow(self.prefix.len() as u32)
    }

    /// Returns a human-readable difficulty estimate.
    pub fn difficulty_description(&self) -> String {
        let diff = self.estimated_difficulty();
        match diff {
            0..=1_000 => "Very Easy (< 1 second)".into(),
            1_001..=100_000 => "Easy (seconds)".into(),
            100_001..=10_000_000 => "Medium (minutes)".into(),
            10_000_001..=1_000_000_000 => "Hard (hours)".into(),
            _ => "Very Hard (days or more)".into(),
        }
    }
}

impl Default for Pattern {
    fn default() -> Self {
        Self::any()
    }
}

/// Returns true if `c` can appear in a lowercase onion address.
#[inline]
fn is_alphabet_char(c: char) -> bool {
    matches!(c, 'a'..='z' | '2'..='7')
}
