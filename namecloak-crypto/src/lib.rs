//! Name-anonymization key layer for namecloak.
//!
//! Lets an owner replace participant and item names with aliases in shared
//! data while keeping the sole ability to reverse the substitution.
//!
//! # Architecture
//!
//! 1. **Master Key**: derived from the owner's identifier with
//!    PBKDF2-HMAC-SHA256 over a deterministic salt. Never needs storing -
//!    it is re-derived whenever it is needed, on any machine.
//!
//! 2. **Legacy Context Key**: same format, random salt. Only exists for
//!    data written before master keys; it must be persisted to stay usable.
//!
//! 3. **Mapping Envelope**: the name mapping plus its context id and a
//!    timestamp, sealed with AES-256-GCM and base64url-encoded.
//!
//! Everything here is a pure function over its inputs plus the OS CSPRNG
//! and the clock, and is safe to call from any number of threads.

pub mod cipher;
mod error;
pub mod key;
pub mod mapping;
mod owner;

pub use cipher::{ENVELOPE_MIN_LEN, NONCE_SIZE, TAG_SIZE};
pub use error::{ContextMismatch, CryptoError, CryptoResult, DecryptError, ResealError};
pub use key::{
    DERIVATION_VERSION, ENCODED_KEY_MIN_LEN, KDF_ITERATIONS, KEY_SIZE, KeyKind, OwnerKey, SALT_SIZE,
    derive_legacy_key, derive_master_key, is_master_key_for,
};
pub use mapping::{
    MappingPayload, NameMapping, decrypt_mapping, encrypt_mapping, reseal, seal_payload,
    verify_key_roundtrip,
};
pub use owner::{ContextId, OwnerId};
