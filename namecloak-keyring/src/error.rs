//! Keyring error types.

use namecloak_crypto::{ContextId, ContextMismatch, CryptoError, DecryptError, ResealError};
use thiserror::Error;

/// Result type for keyring operations.
pub type KeyringResult<T> = Result<T, KeyringError>;

/// Errors that can occur in key lifecycle and migration operations.
#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("principal does not own context {context_id}")]
    NotOwner { context_id: ContextId },

    #[error(transparent)]
    ContextMismatch(#[from] ContextMismatch),

    #[error("crypto error: {0}")]
    Crypto(#[from] CryptoError),

    #[error("decryption failed: {0}")]
    Decrypt(#[from] DecryptError),

    #[error("cached key for owner {owner} does not match its derivation")]
    CacheMismatch { owner: String },

    #[error("re-encrypted envelope for record {0} failed verification")]
    VerificationFailed(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<ResealError> for KeyringError {
    fn from(err: ResealError) -> Self {
        match err {
            ResealError::Decrypt(e) => KeyringError::Decrypt(e),
            ResealError::Context(e) => KeyringError::ContextMismatch(e),
            ResealError::Crypto(e) => KeyringError::Crypto(e),
        }
    }
}
