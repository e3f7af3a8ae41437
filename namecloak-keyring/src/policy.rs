//! Key lifecycle and ownership rules.
//!
//! The codec only knows keys. These rules decide which key a context uses,
//! who may ask for it, and how a lost key column is rebuilt:
//!
//! - A context resolves to its owner's master key unless a legacy key is
//!   requested explicitly.
//! - Decryption for a context is attempted only after the caller proved the
//!   requesting principal owns it.
//! - A master key is recoverable from the owner id alone. A legacy key is
//!   not: once its stored copy is gone, so is every envelope sealed with it.

use crate::error::{KeyringError, KeyringResult};
use crate::store::OwnerKeyStore;
use namecloak_crypto::{
    ContextId, KeyKind, MappingPayload, OwnerId, OwnerKey, decrypt_mapping, derive_legacy_key,
    derive_master_key,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::{debug, info, warn};

/// A context together with the principal that owns it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextRef {
    pub context_id: ContextId,
    pub owner_id: OwnerId,
}

impl ContextRef {
    pub fn new(context_id: ContextId, owner_id: impl Into<OwnerId>) -> Self {
        Self {
            context_id,
            owner_id: owner_id.into(),
        }
    }
}

/// Fails unless `principal` owns `context`.
pub fn ensure_owner(context: &ContextRef, principal: &OwnerId) -> KeyringResult<()> {
    if &context.owner_id == principal {
        Ok(())
    } else {
        warn!(
            context_id = context.context_id,
            "principal {principal} is not the owner of the context"
        );
        Err(KeyringError::NotOwner {
            context_id: context.context_id,
        })
    }
}

/// An encoded key and the derivation that produced it.
#[derive(Clone, PartialEq, Eq)]
pub struct ResolvedKey {
    pub kind: KeyKind,
    pub key: String,
}

impl fmt::Debug for ResolvedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResolvedKey")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Picks the key a context should use.
///
/// With `prefer_master` the owner's master key is returned regardless of any
/// key already stored for the context; otherwise a fresh legacy key is
/// generated. Nothing is written: persisting the choice is up to the caller.
pub fn resolve_owner_key(context: &ContextRef, prefer_master: bool) -> ResolvedKey {
    if prefer_master {
        ResolvedKey {
            kind: KeyKind::Master,
            key: derive_master_key(&context.owner_id).encode(),
        }
    } else {
        debug!(
            context_id = context.context_id,
            "generating legacy context key on request"
        );
        ResolvedKey {
            kind: KeyKind::Legacy,
            key: derive_legacy_key(context.context_id, &context.owner_id).encode(),
        }
    }
}

/// Classifies a stored key against the owner's master key.
pub fn classify_key(key: &str, master_key: &str) -> KeyKind {
    if keys_equal(key, master_key) {
        KeyKind::Master
    } else {
        KeyKind::Legacy
    }
}

/// A candidate key that opened an envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CandidateMatch {
    /// Position of the winning key in the candidate list.
    pub index: usize,
    pub payload: MappingPayload,
}

/// Tries each candidate key in order until one opens `envelope`.
///
/// Keys that fail are skipped; `Ok(None)` means none of them worked. A key
/// that opens the envelope but finds another context's payload is a data
/// integrity fault and is returned as an error rather than skipped.
pub fn decrypt_with_candidates<I, K>(
    envelope: &str,
    expected_context: ContextId,
    candidates: I,
) -> KeyringResult<Option<CandidateMatch>>
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    for (index, key) in candidates.into_iter().enumerate() {
        match decrypt_mapping(envelope, key.as_ref()) {
            Ok(payload) => {
                payload.ensure_context(expected_context)?;
                debug!(
                    context_id = expected_context,
                    "envelope opened with candidate key #{index}"
                );
                return Ok(Some(CandidateMatch { index, payload }));
            }
            Err(e) => {
                debug!(
                    context_id = expected_context,
                    "candidate key #{index} did not open envelope: {e}"
                );
            }
        }
    }
    Ok(None)
}

/// Outcome of [`recover_owner_key`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RecoveredKey {
    /// The context's stored key was present.
    Stored(ResolvedKey),
    /// The stored key was missing; the master key was re-derived and
    /// written back.
    Rederived(ResolvedKey),
}

impl RecoveredKey {
    pub fn key(&self) -> &ResolvedKey {
        match self {
            RecoveredKey::Stored(k) | RecoveredKey::Rederived(k) => k,
        }
    }
}

/// Returns the key for a context, rebuilding a lost key column from the
/// owner's master key.
///
/// The rebuilt key only opens envelopes that were sealed under the master
/// key; envelopes sealed under a lost legacy key stay unreadable.
pub fn recover_owner_key<S>(
    store: &S,
    context: &ContextRef,
    master_key: impl FnOnce(&OwnerId) -> String,
) -> KeyringResult<RecoveredKey>
where
    S: OwnerKeyStore + ?Sized,
{
    let master = master_key(&context.owner_id);

    match store.read_owner_key(context.context_id)? {
        Some(stored) => {
            let kind = classify_key(&stored, &master);
            Ok(RecoveredKey::Stored(ResolvedKey { kind, key: stored }))
        }
        None => {
            store.write_owner_key(context.context_id, &master)?;
            info!(
                context_id = context.context_id,
                "owner key missing; restored master key for owner {}", context.owner_id
            );
            Ok(RecoveredKey::Rederived(ResolvedKey {
                kind: KeyKind::Master,
                key: master,
            }))
        }
    }
}

/// Constant-time equality of two encoded keys; malformed keys never match.
fn keys_equal(a: &str, b: &str) -> bool {
    match (OwnerKey::decode(a), OwnerKey::decode(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
