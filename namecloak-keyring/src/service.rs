//! Process-wide entry point for the business layer.

use crate::config::KeyringConfig;
use crate::error::KeyringResult;
use crate::key_cache::MasterKeyCache;
use crate::migration::{MigrationReport, migrate_context};
use crate::policy::{self, ContextRef, RecoveredKey, ResolvedKey};
use crate::reveal::{RevealedNames, reveal_original_names};
use crate::store::{EnvelopeStore, OwnerKeyStore, RecordId};
use namecloak_crypto::{
    self as crypto, ContextId, DecryptError, KeyKind, MappingPayload, NameMapping, OwnerId,
};
use tracing::debug;

/// Key and envelope operations for every context in the process.
///
/// Built once and shared behind an `Arc`. The only state is the
/// configuration and, when enabled, the master key cache.
#[derive(Clone)]
pub struct AnonymizationService {
    config: KeyringConfig,
    cache: Option<MasterKeyCache>,
}

impl Default for AnonymizationService {
    fn default() -> Self {
        Self::new(KeyringConfig::default())
    }
}

impl AnonymizationService {
    pub fn new(config: KeyringConfig) -> Self {
        let cache = config.cache_master_keys.then(MasterKeyCache::new);
        Self { config, cache }
    }

    /// Builds a service from defaults overlaid with the environment.
    pub fn from_env() -> KeyringResult<Self> {
        Ok(Self::new(KeyringConfig::from_env()?))
    }

    pub fn config(&self) -> &KeyringConfig {
        &self.config
    }

    pub fn cache(&self) -> Option<&MasterKeyCache> {
        self.cache.as_ref()
    }

    /// The owner's encoded master key.
    pub fn derive_master_key(&self, owner_id: &OwnerId) -> String {
        match &self.cache {
            Some(cache) => cache.get_or_derive(owner_id),
            None => crypto::derive_master_key(owner_id).encode(),
        }
    }

    /// The key a context should use under the configured preference.
    pub fn resolve_owner_key(&self, context: &ContextRef) -> ResolvedKey {
        self.resolve_owner_key_with(context, self.config.prefer_master)
    }

    /// The key a context should use, overriding the configured preference.
    pub fn resolve_owner_key_with(&self, context: &ContextRef, prefer_master: bool) -> ResolvedKey {
        if prefer_master {
            ResolvedKey {
                kind: KeyKind::Master,
                key: self.derive_master_key(&context.owner_id),
            }
        } else {
            policy::resolve_owner_key(context, false)
        }
    }

    pub fn encrypt_mapping(
        &self,
        context_id: ContextId,
        mapping: &NameMapping,
        key: &str,
    ) -> KeyringResult<String> {
        Ok(crypto::encrypt_mapping(context_id, mapping, key)?)
    }

    pub fn decrypt_mapping(
        &self,
        envelope: &str,
        key: &str,
    ) -> Result<MappingPayload, DecryptError> {
        crypto::decrypt_mapping(envelope, key)
    }

    /// Opens a context's envelope on behalf of `principal`.
    ///
    /// Ownership is checked before any decryption is attempted, and the
    /// payload must belong to the context.
    pub fn decrypt_for(
        &self,
        principal: &OwnerId,
        context: &ContextRef,
        envelope: &str,
        key: &str,
    ) -> KeyringResult<MappingPayload> {
        policy::ensure_owner(context, principal)?;
        let payload = crypto::decrypt_mapping(envelope, key)?;
        payload.ensure_context(context.context_id)?;
        Ok(payload)
    }

    pub fn verify_key_roundtrip(
        &self,
        context_id: ContextId,
        key: &str,
        test_mapping: &NameMapping,
    ) -> bool {
        crypto::verify_key_roundtrip(context_id, key, test_mapping)
    }

    /// Reveals original names for `principal`, trying the context's stored
    /// key first and then the owner's master key.
    pub fn reveal_original_names<S>(
        &self,
        store: &S,
        principal: &OwnerId,
        context: &ContextRef,
        envelope: &str,
    ) -> KeyringResult<RevealedNames>
    where
        S: OwnerKeyStore + ?Sized,
    {
        policy::ensure_owner(context, principal)?;

        let mut candidates = Vec::with_capacity(2);
        if let Some(stored) = store.read_owner_key(context.context_id)? {
            candidates.push(stored);
        }
        let master = self.derive_master_key(&context.owner_id);
        if !candidates.contains(&master) {
            candidates.push(master);
        }

        Ok(reveal_original_names(envelope, context.context_id, &candidates))
    }

    /// Returns the context's key, restoring the master key when the stored
    /// key is missing.
    pub fn recover_owner_key<S>(
        &self,
        store: &S,
        context: &ContextRef,
    ) -> KeyringResult<RecoveredKey>
    where
        S: OwnerKeyStore + ?Sized,
    {
        policy::recover_owner_key(store, context, |owner| self.derive_master_key(owner))
    }

    /// Moves a context's envelopes from its stored key to the owner's master
    /// key.
    ///
    /// With no stored key there is nothing to migrate from: the master key is
    /// written and every record is checked against it.
    pub fn migrate_context<S>(
        &self,
        store: &S,
        context: &ContextRef,
        records: &[RecordId],
    ) -> KeyringResult<MigrationReport>
    where
        S: OwnerKeyStore + EnvelopeStore + ?Sized,
    {
        let master = self.derive_master_key(&context.owner_id);
        let old_key = match store.read_owner_key(context.context_id)? {
            Some(stored) => stored,
            None => {
                debug!(
                    context_id = context.context_id,
                    "no stored key; migrating against master key"
                );
                master.clone()
            }
        };

        migrate_context(
            store,
            context,
            records,
            &old_key,
            &master,
            self.config.verify_migrated_envelopes,
        )
    }
}
