//! Shared fixtures for keyring integration tests.

#![allow(dead_code)]

use namecloak_crypto::{ContextId, NameMapping, derive_legacy_key, encrypt_mapping};
use namecloak_keyring::{
    ContextRef, EnvelopeStore, InMemoryStore, KeyringError, KeyringResult, OwnerKeyStore, RecordId,
};
use std::collections::HashSet;
use std::sync::Once;

static TRACING: Once = Once::new();

/// Routes `tracing` output to the test harness. Honours `RUST_LOG`.
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

pub fn names(pairs: &[(&str, &str)]) -> NameMapping {
    pairs
        .iter()
        .map(|(o, a)| (o.to_string(), a.to_string()))
        .collect()
}

/// A store holding `count` records of `context`, each sealed under a single
/// legacy key that is also stored as the context's owner key.
pub fn legacy_context(
    context: &ContextRef,
    count: usize,
) -> (InMemoryStore, String, Vec<RecordId>) {
    let store = InMemoryStore::new();
    let legacy = derive_legacy_key(context.context_id, &context.owner_id).encode();
    store.write_owner_key(context.context_id, &legacy).unwrap();

    let records = (0..count)
        .map(|i| {
            let id = RecordId::new(format!("{}-{i}", context.context_id));
            let mapping = NameMapping::from([(format!("Member {i}"), format!("Pirate {i}"))]);
            let envelope = encrypt_mapping(context.context_id, &mapping, &legacy).unwrap();
            store.write_envelope(&id, &envelope).unwrap();
            id
        })
        .collect();

    (store, legacy, records)
}

/// Wraps an [`InMemoryStore`] and fails envelope writes for chosen records,
/// and optionally every owner key write.
pub struct FlakyStore {
    pub inner: InMemoryStore,
    pub fail_writes: HashSet<RecordId>,
    pub fail_owner_key_writes: bool,
}

impl FlakyStore {
    pub fn new(inner: InMemoryStore, fail_writes: impl IntoIterator<Item = RecordId>) -> Self {
        Self {
            inner,
            fail_writes: fail_writes.into_iter().collect(),
            fail_owner_key_writes: false,
        }
    }

    pub fn with_failing_owner_key_writes(mut self) -> Self {
        self.fail_owner_key_writes = true;
        self
    }
}

impl OwnerKeyStore for FlakyStore {
    fn read_owner_key(&self, context_id: ContextId) -> KeyringResult<Option<String>> {
        self.inner.read_owner_key(context_id)
    }

    fn write_owner_key(&self, context_id: ContextId, key: &str) -> KeyringResult<()> {
        if self.fail_owner_key_writes {
            return Err(KeyringError::Storage(format!(
                "owner key write rejected for context {context_id}"
            )));
        }
        self.inner.write_owner_key(context_id, key)
    }
}

impl EnvelopeStore for FlakyStore {
    fn read_envelope(&self, record_id: &RecordId) -> KeyringResult<Option<String>> {
        self.inner.read_envelope(record_id)
    }

    fn write_envelope(&self, record_id: &RecordId, envelope: &str) -> KeyringResult<()> {
        if self.fail_writes.contains(record_id) {
            return Err(KeyringError::Storage(format!("write rejected for {record_id}")));
        }
        self.inner.write_envelope(record_id, envelope)
    }
}
