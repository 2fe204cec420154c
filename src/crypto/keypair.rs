//! Ed25519 keypair generation.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use ed25519_dalek::{SigningKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use rand::RngCore;
use sha2::{Digest, Sha512};

use super::{Address, CryptoError};

/// An Ed25519 keypair for an onion service.
#[derive(Debug, Clone)]
pub struct Keypair {
    signing_key: SigningKey,
}

impl Keypair {
    /// Generates a new random keypair from the OS random source.
    pub fn generate() -> Result<Self, CryptoError> {
        let mut seed = [0u8; SECRET_KEY_LENGTH];
        OsRng
            .try_fill_bytes(&mut seed)
            .map_err(|e| CryptoError::RandomSource(e.to_string()))?;
        Ok(Self::from_seed(&seed))
    }

    /// Creates a keypair from a 32-byte seed.
    pub fn from_seed(seed: &[u8; SECRET_KEY_LENGTH]) -> Self {
        Self {
            signing_key: SigningKey::from_bytes(seed),
        }
    }

    /// Restores a keypair from its 64-byte `seed || public` form.
    ///
    /// Fails if the public half does not belong to the seed.
    pub fn from_private_key_bytes(bytes: &[u8; 64]) -> Result<Self, CryptoError> {
        let signing_key =
            SigningKey::from_keypair_bytes(bytes).map_err(|_| CryptoError::InvalidPrivateKey)?;
        Ok(Self { signing_key })
    }

    /// Returns the 32-byte public key.
    #[inline]
    pub fn public_key_bytes(&self) -> [u8; 32] {
        self.signing_key.verifying_key().to_bytes()
    }

    /// Returns the 64-byte private key (`seed || public`).
    pub fn private_key_bytes(&self) -> [u8; 64] {
        self.signing_key.to_keypair_bytes()
    }

    /// Returns the private key as a hex string.
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.private_key_bytes())
    }

    /// Returns the expanded secret key Tor stores for a service.
    ///
    /// The first half is the clamped scalar, the second half the nonce prefix.
    pub fn expanded_secret_key(&self) -> [u8; 64] {
        let hash = Sha512::digest(self.signing_key.to_bytes());
        let mut expanded = [0u8; 64];
        expanded.copy_from_slice(&hash);
        expanded[0] &= 248;
        expanded[31] &= 127;
        expanded[31] |= 64;
        expanded
    }

    /// Returns the expanded secret key as padded standard base64.
    pub fn expanded_secret_key_base64(&self) -> String {
        STANDARD.encode(self.expanded_secret_key())
    }

    /// Derives the onion address of this keypair.
    #[inline]
    pub fn address(&self) -> Address {
        Address::from_public_key(&self.public_key_bytes())
    }
}

/// A source of fresh keypairs shared by all workers.
pub trait KeySource: Send + Sync {
    /// Produces a new keypair. Failures are treated as transient by callers.
    fn generate(&self) -> Result<Keypair, CryptoError>;
}

/// Generates keypairs from the operating system's secure random source.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsKeySource;

impl KeySource for OsKeySource {
    #[inline]
    fn generate(&self) -> Result<Keypair, CryptoError> {
        Keypair::generate()
    }
}
