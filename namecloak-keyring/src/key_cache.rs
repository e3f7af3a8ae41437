//! Thread-safe lookup table of derived master keys.
//!
//! Deriving a master key costs 100k PBKDF2 rounds. The cache trades that
//! for memory, but a cached entry must always equal the fresh derivation:
//! values loaded from outside are checked before they are accepted.

use crate::error::{KeyringError, KeyringResult};
use namecloak_crypto::{OwnerId, derive_master_key, is_master_key_for};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::{debug, warn};

/// Shared owner -> encoded master key table. Clones share the same entries.
#[derive(Clone, Default)]
pub struct MasterKeyCache {
    keys: Arc<RwLock<HashMap<OwnerId, String>>>,
}

impl MasterKeyCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the cached master key, deriving and caching it on a miss.
    pub fn get_or_derive(&self, owner_id: &OwnerId) -> String {
        if let Some(key) = self.get(owner_id) {
            return key;
        }

        let key = derive_master_key(owner_id).encode();
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(owner_id.clone())
            .or_insert_with(|| key.clone());
        debug!("cached master key for owner {owner_id}");
        key
    }

    /// Returns the cached master key without deriving.
    pub fn get(&self, owner_id: &OwnerId) -> Option<String> {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(owner_id)
            .cloned()
    }

    /// Accepts an externally stored master key (e.g. from a lookup table)
    /// only if it equals the fresh derivation.
    pub fn insert_verified(&self, owner_id: &OwnerId, key: &str) -> KeyringResult<()> {
        if !is_master_key_for(key, owner_id) {
            warn!("rejected cached master key for owner {owner_id}: derivation mismatch");
            return Err(KeyringError::CacheMismatch {
                owner: owner_id.to_string(),
            });
        }
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(owner_id.clone(), key.to_string());
        Ok(())
    }

    /// Removes an owner's entry.
    pub fn remove(&self, owner_id: &OwnerId) -> Option<String> {
        self.keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(owner_id)
    }

    /// Returns the number of cached keys.
    pub fn len(&self) -> usize {
        self.keys.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if no keys are cached.
    pub fn is_empty(&self) -> bool {
        self.keys
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }
}
