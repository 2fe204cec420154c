//! Cryptographic operations for onion service keys and addresses.
//!
//! This module provides:
//! - Ed25519 keypair generation from the OS random source
//! - The v3 onion address codec (SHA3-256 checksum, base32)

pub mod address;
mod keypair;

pub use address::{Address, AddressError};
pub use keypair::{KeySource, Keypair, OsKeySource};

/// Errors from key generation and key parsing.
#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    #[error("secure random source failed: {0}")]
    RandomSource(String),

    #[error("invalid private key")]
    InvalidPrivateKey,
}
