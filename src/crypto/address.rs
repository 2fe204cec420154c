//! Tor v3 onion service address codec.
//!
//! An address is `base32(public_key || checksum || version)` in lowercase, where
//! `checksum = SHA3-256(".onion checksum" || public_key || version)[..2]`.

use std::fmt;

use data_encoding::{DecodeError, DecodeKind, BASE32_NOPAD};
use sha3::{Digest, Sha3_256};

/// Onion service format version.
pub const VERSION: u8 = 0x03;

/// Domain separation salt hashed in front of the checksum input.
pub const CHECKSUM_SALT: &[u8] = b".onion checksum";

/// Length of an Ed25519 public key.
pub const PUBLIC_KEY_LEN: usize = 32;

/// Length of the embedded checksum.
pub const CHECKSUM_LEN: usize = 2;

/// Length of the raw address payload: key, checksum, version.
pub const DECODED_LEN: usize = PUBLIC_KEY_LEN + CHECKSUM_LEN + 1;

/// Length of an encoded address, without the `.onion` suffix.
pub const ADDRESS_LEN: usize = 56;

/// Top-level domain for onion services.
pub const ONION_TLD: &str = ".onion";

/// Reasons an address string fails to decode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AddressError {
    #[error("invalid base32 character {character:?} at position {position}")]
    InvalidCharacter { position: usize, character: char },

    #[error("address is {0} characters long, expected {}", ADDRESS_LEN)]
    InvalidLength(usize),

    #[error("unsupported address version {0:#04x}, expected {:#04x}", VERSION)]
    VersionMismatch(u8),

    #[error("checksum mismatch: expected {}, found {}", hex::encode(.expected), hex::encode(.found))]
    ChecksumMismatch {
        expected: [u8; CHECKSUM_LEN],
        found: [u8; CHECKSUM_LEN],
    },

    #[error("address does not belong to the given public key")]
    PublicKeyMismatch,
}

/// A v3 onion address derived from an Ed25519 public key.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Address(String);

impl Address {
    /// Derives the address for a public key.
    pub fn from_public_key(public_key: &[u8; PUBLIC_KEY_LEN]) -> Self {
        let mut combined = [0u8; DECODED_LEN];
        combined[..PUBLIC_KEY_LEN].copy_from_slice(public_key);
        combined[PUBLIC_KEY_LEN..PUBLIC_KEY_LEN + CHECKSUM_LEN]
            .copy_from_slice(&checksum(public_key));
        combined[DECODED_LEN - 1] = VERSION;

        Self(BASE32_NOPAD.encode(&combined).to_ascii_lowercase())
    }

    /// Returns the 56-character address without the `.onion` suffix.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the address with the `.onion` suffix.
    pub fn to_hostname(&self) -> String {
        format!("{}{}", self.0, ONION_TLD)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.0)
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Address {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Computes the two checksum bytes for a public key.
pub fn checksum(public_key: &[u8; PUBLIC_KEY_LEN]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha3_256::new();
    hasher.update(CHECKSUM_SALT);
    hasher.update(public_key);
    hasher.update([VERSION]);
    let hash = hasher.finalize();

    [hash[0], hash[1]]
}

/// Decodes an address and returns its public key.
///
/// Accepts either letter case and an optional `.onion` suffix. Fails unless the
/// length, version byte and checksum all check out.
pub fn decode(address: &str) -> Result<[u8; PUBLIC_KEY_LEN], AddressError> {
    let encoded = strip_tld(address);

    let chars = encoded.chars().count();
    if chars != ADDRESS_LEN {
        return Err(AddressError::InvalidLength(chars));
    }

    // Decode errors carry byte offsets, which match character positions only
    // for ASCII input.
    let non_ascii = encoded.chars().enumerate().find(|(_, c)| !c.is_ascii());
    if let Some((position, character)) = non_ascii {
        return Err(AddressError::InvalidCharacter { position, character });
    }

    let bytes = BASE32_NOPAD
        .decode(encoded.to_ascii_uppercase().as_bytes())
        .map_err(|e| decode_error(encoded, e))?;
    if bytes.len() != DECODED_LEN {
        return Err(AddressError::InvalidLength(chars));
    }

    let version = bytes[DECODED_LEN - 1];
    if version != VERSION {
        return Err(AddressError::VersionMismatch(version));
    }

    let mut public_key = [0u8; PUBLIC_KEY_LEN];
    public_key.copy_from_slice(&bytes[..PUBLIC_KEY_LEN]);

    let expected = checksum(&public_key);
    let found = [bytes[PUBLIC_KEY_LEN], bytes[PUBLIC_KEY_LEN + 1]];
    if expected != found {
        return Err(AddressError::ChecksumMismatch { expected, found });
    }

    Ok(public_key)
}

/// Checks that `address` is well formed and encodes `public_key`.
pub fn check(address: &str, public_key: &[u8; PUBLIC_KEY_LEN]) -> Result<(), AddressError> {
    let decoded = decode(address)?;
    if &decoded != public_key {
        return Err(AddressError::PublicKeyMismatch);
    }
    Ok(())
}

/// Returns true if `address` is a valid address for `public_key`.
pub fn validate(address: &str, public_key: &[u8; PUBLIC_KEY_LEN]) -> bool {
    check(address, public_key).is_ok()
}

fn decode_error(encoded: &str, error: DecodeError) -> AddressError {
    match (error.kind, encoded.as_bytes().get(error.position)) {
        (DecodeKind::Symbol, Some(&byte)) => AddressError::InvalidCharacter {
            position: error.position,
            character: char::from(byte),
        },
        _ => AddressError::InvalidLength(encoded.len()),
    }
}

fn strip_tld(address: &str) -> &str {
    let split = address.len().saturating_sub(ONION_TLD.len());
    match (address.get(..split), address.get(split..)) {
        (Some(head), Some(tail)) if tail.eq_ignore_ascii_case(ONION_TLD) => head,
        _ => address,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use proptest::prelude::*;

    const DDG: &str = "duckduckgogg42xjoc72x3sjasowoarfbgcmvfimaftt6twagswzczad";

    fn encode_raw(combined: &[u8]) -> String {
        BASE32_NOPAD.encode(combined).to_ascii_lowercase()
    }

    fn flip_char(address: &str, position: usize) -> String {
        address
            .chars()
            .enumerate()
            .map(|(i, c)| {
                if i != position {
                    c
                } else if c == 'a' {
                    'b'
                } else {
                    'a'
                }
            })
            .collect()
    }

    #[test]
    fn test_known_address_round_trip() {
        let public_key = decode(DDG).unwrap();
        assert_eq!(Address::from_public_key(&public_key).as_str(), DDG);
        assert!(validate(DDG, &public_key));
    }

    #[test]
    fn test_decode_accepts_hostname_and_uppercase() {
        let public_key = decode(DDG).unwrap();
        assert_eq!(decode(&format!("{DDG}.onion")).unwrap(), public_key);
        assert_eq!(decode(&DDG.to_uppercase()).unwrap(), public_key);
        assert_eq!(decode(&format!("{}.ONION", DDG)).unwrap(), public_key);
    }

    #[test]
    fn test_all_zero_key() {
        let address = Address::from_public_key(&[0u8; 32]);
        assert_eq!(address.as_str().len(), ADDRESS_LEN);
        assert!(address.as_str().starts_with("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"));
        assert!(address.as_str().ends_with('d'));
        assert_eq!(address.to_hostname(), format!("{}.onion", address));
    }

    #[test]
    fn test_rejects_bad_character() {
        let bad = format!("{}1", &DDG[..55]);
        assert!(matches!(
            decode(&bad),
            Err(AddressError::InvalidCharacter { position: 55, character: '1' })
        ));
    }

    #[test]
    fn test_rejects_wrong_length() {
        assert_eq!(decode(&DDG[..48]), Err(AddressError::InvalidLength(48)));
        assert_eq!(decode(""), Err(AddressError::InvalidLength(0)));
        assert_eq!(decode(".onion"), Err(AddressError::InvalidLength(0)));

        // A 57th character would be truncated away by a lenient decoder.
        let err = decode(&format!("{DDG}a")).unwrap_err();
        assert_eq!(err, AddressError::InvalidLength(57));
        assert_eq!(err.to_string(), "address is 57 characters long, expected 56");
    }

    #[test]
    fn test_rejects_non_ascii() {
        let bad = format!("{}é{}", &DDG[..10], &DDG[11..]);
        assert_eq!(
            decode(&bad),
            Err(AddressError::InvalidCharacter { position: 10, character: 'é' })
        );

        let padded = format!("{}=", &DDG[..55]);
        assert_eq!(
            decode(&padded),
            Err(AddressError::InvalidCharacter { position: 55, character: '=' })
        );
    }

    #[test]
    fn test_rejects_wrong_version() {
        let public_key = [7u8; 32];
        let mut combined = [0u8; DECODED_LEN];
        combined[..32].copy_from_slice(&public_key);
        combined[32..34].copy_from_slice(&checksum(&public_key));
        combined[34] = 0x02;
        let encoded = encode_raw(&combined);

        assert_eq!(decode(&encoded), Err(AddressError::VersionMismatch(0x02)));
        assert!(!validate(&encoded, &public_key));
    }

    #[test]
    fn test_rejects_corrupted_checksum() {
        let public_key = [42u8; 32];
        let mut combined = [0u8; DECODED_LEN];
        combined[..32].copy_from_slice(&public_key);
        let good = checksum(&public_key);
        combined[32] = good[0] ^ 0x01;
        combined[33] = good[1];
        combined[34] = VERSION;
        let encoded = encode_raw(&combined);

        assert!(matches!(decode(&encoded), Err(AddressError::ChecksumMismatch { .. })));
        assert!(!validate(&encoded, &public_key));
    }

    #[test]
    fn test_rejects_other_public_key() {
        let address = Address::from_public_key(&[1u8; 32]);
        assert_eq!(
            check(address.as_str(), &[2u8; 32]),
            Err(AddressError::PublicKeyMismatch)
        );
    }

    #[test]
    fn test_corrupting_key_characters_breaks_checksum() {
        // Each of the first 51 characters lies entirely inside the public key.
        for position in 0..51 {
            let corrupted = flip_char(DDG, position);
            assert!(
                matches!(decode(&corrupted), Err(AddressError::ChecksumMismatch { .. })),
                "position {position} accepted"
            );
        }
    }

    proptest! {
        #[test]
        fn prop_encode_is_deterministic(key in any::<[u8; 32]>()) {
            prop_assert_eq!(Address::from_public_key(&key), Address::from_public_key(&key));
        }

        #[test]
        fn prop_round_trip(key in any::<[u8; 32]>()) {
            let address = Address::from_public_key(&key);
            prop_assert!(validate(address.as_str(), &key));
            prop_assert_eq!(decode(address.as_str()).unwrap(), key);
        }

        #[test]
        fn prop_format(key in any::<[u8; 32]>()) {
            let address = Address::from_public_key(&key);
            prop_assert_eq!(address.as_str().len(), ADDRESS_LEN);
            prop_assert!(address.as_str().chars().all(|c| matches!(c, 'a'..='z' | '2'..='7')));

            let raw = BASE32_NOPAD.decode(address.as_str().to_ascii_uppercase().as_bytes()).unwrap();
            prop_assert_eq!(&raw[..32], &key[..]);
            prop_assert_eq!(raw[34], VERSION);
        }

        #[test]
        fn prop_single_bit_flip_changes_address(
            key in any::<[u8; 32]>(),
            bit in 0usize..256,
        ) {
            let mut flipped = key;
            flipped[bit / 8] ^= 1 << (bit % 8);

            let original = Address::from_public_key(&key);
            prop_assert_ne!(&original, &Address::from_public_key(&flipped));
            prop_assert!(!validate(original.as_str(), &flipped));
        }
    }
}
