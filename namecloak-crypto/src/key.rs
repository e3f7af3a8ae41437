//! Owner key derivation and the encoded key format.
//!
//! An owner key travels as base64url(`salt || key`), 64 bytes before
//! encoding. Two derivations produce it:
//!
//! - **Master key**: salt and key are both functions of the owner id, so the
//!   owner can re-derive it at any time without a key-storage step.
//! - **Legacy context key**: the salt comes from the OS CSPRNG, so the key is
//!   not reproducible and must be persisted to stay useful.
//!
//! Both stretch a version-tagged seed with PBKDF2-HMAC-SHA256 over
//! [`KDF_ITERATIONS`] rounds.

use crate::error::{CryptoError, CryptoResult};
use crate::owner::{ContextId, OwnerId};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Size of the derivation salt in bytes.
pub const SALT_SIZE: usize = 32;

/// Size of the AES-256 key in bytes.
pub const KEY_SIZE: usize = 32;

/// Minimum decoded length of an encoded key (`salt || key`).
pub const ENCODED_KEY_MIN_LEN: usize = SALT_SIZE + KEY_SIZE;

/// PBKDF2 rounds. Changing this changes every master key.
pub const KDF_ITERATIONS: u32 = 100_000;

/// Version tag mixed into master key salt and seed.
pub const DERIVATION_VERSION: &str = "v1";

/// Which derivation produced a key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum KeyKind {
    /// Deterministic per-owner key.
    Master,
    /// Randomly salted per-context key, kept for pre-master data.
    Legacy,
}

impl fmt::Display for KeyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyKind::Master => f.write_str("master"),
            KeyKind::Legacy => f.write_str("legacy"),
        }
    }
}

/// Decoded owner key: the salt it was derived with and the AES-256 key.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct OwnerKey {
    salt: [u8; SALT_SIZE],
    key: [u8; KEY_SIZE],
}

impl OwnerKey {
    pub fn from_parts(salt: [u8; SALT_SIZE], key: [u8; KEY_SIZE]) -> Self {
        Self { salt, key }
    }

    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    /// Raw AES-256 key bytes.
    pub fn key_bytes(&self) -> &[u8; KEY_SIZE] {
        &self.key
    }

    /// Encodes as base64url(`salt || key`), the form stored by callers.
    pub fn encode(&self) -> String {
        let mut raw = Zeroizing::new([0u8; ENCODED_KEY_MIN_LEN]);
        raw[..SALT_SIZE].copy_from_slice(&self.salt);
        raw[SALT_SIZE..].copy_from_slice(&self.key);
        URL_SAFE.encode(raw.as_slice())
    }

    /// Decodes an encoded key string.
    ///
    /// Requires at least 64 decoded bytes; the salt is `[0..32]` and the key
    /// `[32..64]`. Anything after byte 64 is ignored.
    pub fn decode(encoded: &str) -> CryptoResult<Self> {
        let raw = Zeroizing::new(
            URL_SAFE
                .decode(encoded.trim())
                .map_err(|e| CryptoError::InvalidKeyFormat(format!("not base64url: {e}")))?,
        );

        if raw.len() < ENCODED_KEY_MIN_LEN {
            return Err(CryptoError::InvalidKeyFormat(format!(
                "decoded key is {} bytes, need at least {ENCODED_KEY_MIN_LEN}",
                raw.len()
            )));
        }

        let mut salt = [0u8; SALT_SIZE];
        let mut key = [0u8; KEY_SIZE];
        salt.copy_from_slice(&raw[..SALT_SIZE]);
        key.copy_from_slice(&raw[SALT_SIZE..ENCODED_KEY_MIN_LEN]);
        Ok(Self { salt, key })
    }

    /// Short non-secret identifier for logs: hex of the first 8 bytes of
    /// SHA-256 over the encoded key.
    pub fn fingerprint(&self) -> String {
        let digest = Sha256::digest(self.encode().as_bytes());
        hex::encode(&digest[..8])
    }
}

impl PartialEq for OwnerKey {
    fn eq(&self, other: &Self) -> bool {
        (self.salt.ct_eq(&other.salt) & self.key.ct_eq(&other.key)).into()
    }
}

impl Eq for OwnerKey {}

impl fmt::Debug for OwnerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerKey")
            .field("fingerprint", &self.fingerprint())
            .finish_non_exhaustive()
    }
}

fn stretch(seed: &str, salt: &[u8; SALT_SIZE]) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    pbkdf2::pbkdf2_hmac::<Sha256>(seed.as_bytes(), salt, KDF_ITERATIONS, &mut key);
    key
}

/// Derives the owner's master key.
///
/// Same owner id in, same key out, on any machine: salt is
/// SHA-256(`salt_for_user_{owner}_v1`) and the PBKDF2 seed is
/// `master_key_for_user_{owner}_v1`.
pub fn derive_master_key(owner_id: &OwnerId) -> OwnerKey {
    let salt_input = format!("salt_for_user_{owner_id}_{DERIVATION_VERSION}");
    let salt: [u8; SALT_SIZE] = Sha256::digest(salt_input.as_bytes()).into();

    let seed = Zeroizing::new(format!("master_key_for_user_{owner_id}_{DERIVATION_VERSION}"));
    let key = stretch(&seed, &salt);
    OwnerKey { salt, key }
}

/// Generates a legacy per-context key with a fresh random salt.
///
/// Two calls with the same inputs yield different keys.
pub fn derive_legacy_key(context_id: ContextId, owner_id: &OwnerId) -> OwnerKey {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let seed = Zeroizing::new(format!("context_key_{context_id}_{owner_id}"));
    let key = stretch(&seed, &salt);
    OwnerKey { salt, key }
}

/// Checks in constant time whether `encoded` is the master key of `owner_id`.
///
/// Malformed key strings are simply not a match.
pub fn is_master_key_for(encoded: &str, owner_id: &OwnerId) -> bool {
    match OwnerKey::decode(encoded) {
        Ok(candidate) => candidate == derive_master_key(owner_id),
        Err(_) => false,
    }
}
