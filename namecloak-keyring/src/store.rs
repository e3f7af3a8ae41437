//! Persistence seams consumed from the business layer.
//!
//! The keyring never sees business-record structure: a context has at most
//! one stored owner key string, and a record has at most one envelope
//! string. Both are opaque text.

use crate::error::KeyringResult;
use namecloak_crypto::ContextId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

/// Identifier of a business record carrying one envelope column.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<i64> for RecordId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

/// Storage for the key associated with each context.
pub trait OwnerKeyStore: Send + Sync {
    /// Fetches the stored key for a context, if any.
    fn read_owner_key(&self, context_id: ContextId) -> KeyringResult<Option<String>>;

    /// Persists a (re-)generated key for a context.
    fn write_owner_key(&self, context_id: ContextId, key: &str) -> KeyringResult<()>;
}

/// Storage for envelope strings inside business records.
pub trait EnvelopeStore: Send + Sync {
    /// Fetches the envelope stored on a record, if any.
    fn read_envelope(&self, record_id: &RecordId) -> KeyringResult<Option<String>>;

    /// Replaces the envelope stored on a record.
    fn write_envelope(&self, record_id: &RecordId, envelope: &str) -> KeyringResult<()>;
}

/// In-memory implementation of both stores.
///
/// Suitable for development and tests. Data is lost when the process exits.
#[derive(Default)]
pub struct InMemoryStore {
    owner_keys: RwLock<HashMap<ContextId, String>>,
    envelopes: RwLock<HashMap<RecordId, String>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops the stored key for a context, as if its column were NULLed.
    pub fn clear_owner_key(&self, context_id: ContextId) -> Option<String> {
        self.owner_keys
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&context_id)
    }

    /// Number of records holding an envelope.
    pub fn envelope_count(&self) -> usize {
        self.envelopes
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl OwnerKeyStore for InMemoryStore {
    fn read_owner_key(&self, context_id: ContextId) -> KeyringResult<Option<String>> {
        let keys = self.owner_keys.read().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.get(&context_id).cloned())
    }

    fn write_owner_key(&self, context_id: ContextId, key: &str) -> KeyringResult<()> {
        let mut keys = self.owner_keys.write().unwrap_or_else(PoisonError::into_inner);
        keys.insert(context_id, key.to_string());
        Ok(())
    }
}

impl EnvelopeStore for InMemoryStore {
    fn read_envelope(&self, record_id: &RecordId) -> KeyringResult<Option<String>> {
        let envelopes = self.envelopes.read().unwrap_or_else(PoisonError::into_inner);
        Ok(envelopes.get(record_id).cloned())
    }

    fn write_envelope(&self, record_id: &RecordId, envelope: &str) -> KeyringResult<()> {
        let mut envelopes = self.envelopes.write().unwrap_or_else(PoisonError::into_inner);
        envelopes.insert(record_id.clone(), envelope.to_string());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_key_read_write_clear() {
        let store = InMemoryStore::new();
        assert!(store.read_owner_key(1).unwrap().is_none());

        store.write_owner_key(1, "key-a").unwrap();
        store.write_owner_key(1, "key-b").unwrap();
        assert_eq!(store.read_owner_key(1).unwrap().as_deref(), Some("key-b"));

        assert_eq!(store.clear_owner_key(1).as_deref(), Some("key-b"));
        assert!(store.read_owner_key(1).unwrap().is_none());
    }

    #[test]
    fn envelopes_are_per_record() {
        let store = InMemoryStore::new();
        store.write_envelope(&RecordId::from(1_i64), "env-1").unwrap();
        store.write_envelope(&RecordId::from("2"), "env-2").unwrap();

        assert_eq!(
            store.read_envelope(&RecordId::from("1")).unwrap().as_deref(),
            Some("env-1")
        );
        assert!(store.read_envelope(&RecordId::from("3")).unwrap().is_none());
        assert_eq!(store.envelope_count(), 2);
    }
}
