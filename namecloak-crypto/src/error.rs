//! Error types for key handling and the mapping codec.
//!
//! Encryption-side failures (`CryptoError`) are fatal to the caller's
//! operation. Decryption-side failures (`DecryptError`) are an expected
//! outcome: a caller probing candidate keys sees them routinely and moves
//! on to the next key.

use crate::owner::ContextId;
use thiserror::Error;

/// Result type for key and encryption operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors on the key-decoding and encryption paths.
#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("encryption failed: {0}")]
    Encryption(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Why an envelope could not be opened.
///
/// Every variant means "no plaintext"; callers that only care about
/// success can collapse this with `.ok()`.
#[derive(Debug, Error)]
pub enum DecryptError {
    #[error("invalid key format: {0}")]
    InvalidKeyFormat(String),

    #[error("malformed envelope: {0}")]
    MalformedEnvelope(String),

    #[error("authentication failed (wrong key or tampered envelope)")]
    AuthenticationFailure,

    #[error("envelope authenticated but payload is corrupt: {0}")]
    StructuralCorruption(String),
}

impl DecryptError {
    /// True when the tag check failed, i.e. the usual "wrong key" outcome.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(self, DecryptError::AuthenticationFailure)
    }
}

impl From<CryptoError> for DecryptError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::InvalidKeyFormat(msg) => DecryptError::InvalidKeyFormat(msg),
            other => DecryptError::StructuralCorruption(other.to_string()),
        }
    }
}

/// An envelope opened fine but belongs to a different context than expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("context mismatch: expected {expected}, envelope carries {found}")]
pub struct ContextMismatch {
    pub expected: ContextId,
    pub found: ContextId,
}

/// Failure while moving an envelope from one key to another.
#[derive(Debug, Error)]
pub enum ResealError {
    #[error(transparent)]
    Decrypt(#[from] DecryptError),

    #[error(transparent)]
    Context(#[from] ContextMismatch),

    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
