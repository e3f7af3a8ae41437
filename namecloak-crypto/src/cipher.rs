//! AES-256-GCM sealing in the envelope byte layout.
//!
//! Layout: `[nonce: 12][tag: 16][ciphertext: N]`. No associated data.

use crate::error::{CryptoError, CryptoResult, DecryptError};
use crate::key::OwnerKey;
use aes_gcm::aead::{AeadInPlace, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce, Tag};
use rand::RngCore;
use rand::rngs::OsRng;
use zeroize::Zeroizing;

/// AES-GCM nonce size in bytes.
pub const NONCE_SIZE: usize = 12;

/// AES-GCM authentication tag size in bytes.
pub const TAG_SIZE: usize = 16;

/// Smallest well-formed envelope: nonce and tag around an empty ciphertext.
pub const ENVELOPE_MIN_LEN: usize = NONCE_SIZE + TAG_SIZE;

fn cipher_for(key: &OwnerKey) -> Aes256Gcm {
    Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.key_bytes()))
}

/// Generates a fresh 12-byte nonce from the OS CSPRNG.
pub fn generate_nonce() -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);
    nonce
}

/// Encrypts `plaintext` under a fresh nonce.
pub fn seal(key: &OwnerKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let nonce = generate_nonce();
    let mut buffer = plaintext.to_vec();

    let tag = cipher_for(key)
        .encrypt_in_place_detached(Nonce::from_slice(&nonce), b"", &mut buffer)
        .map_err(|e| CryptoError::Encryption(format!("AES-GCM seal failed: {e}")))?;

    let mut out = Vec::with_capacity(ENVELOPE_MIN_LEN + buffer.len());
    out.extend_from_slice(&nonce);
    out.extend_from_slice(&tag);
    out.extend_from_slice(&buffer);
    Ok(out)
}

/// Verifies and decrypts an envelope produced by [`seal`].
///
/// Plaintext is only released after the tag verifies.
pub fn open(key: &OwnerKey, sealed: &[u8]) -> Result<Zeroizing<Vec<u8>>, DecryptError> {
    if sealed.len() < ENVELOPE_MIN_LEN {
        return Err(DecryptError::MalformedEnvelope(format!(
            "envelope is {} bytes, need at least {ENVELOPE_MIN_LEN}",
            sealed.len()
        )));
    }

    let (nonce, rest) = sealed.split_at(NONCE_SIZE);
    let (tag, ciphertext) = rest.split_at(TAG_SIZE);

    let mut buffer = Zeroizing::new(ciphertext.to_vec());
    cipher_for(key)
        .decrypt_in_place_detached(
            Nonce::from_slice(nonce),
            b"",
            buffer.as_mut_slice(),
            Tag::from_slice(tag),
        )
        .map_err(|_| DecryptError::AuthenticationFailure)?;

    Ok(buffer)
}
