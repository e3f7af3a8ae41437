//! Key lifecycle for namecloak.
//!
//! Builds on `namecloak-crypto` with the rules the business layer needs:
//! - Ownership checks before any decryption
//! - Master key preference with explicit legacy fallback
//! - Recovery of lost key columns from the owner id
//! - Per-record migration of envelopes from legacy keys to the master key
//! - A shared cache of derived master keys

pub mod config;
pub mod error;
pub mod key_cache;
pub mod migration;
pub mod policy;
pub mod reveal;
pub mod service;
pub mod store;

pub use config::KeyringConfig;
pub use error::{KeyringError, KeyringResult};
pub use key_cache::MasterKeyCache;
pub use migration::{
    FailedRecord, MigrationReport, RecordMigration, migrate_context, migrate_record,
};
pub use policy::{
    CandidateMatch, ContextRef, RecoveredKey, ResolvedKey, decrypt_with_candidates, ensure_owner,
    recover_owner_key, resolve_owner_key,
};
pub use reveal::{OriginalName, RevealedNames, reveal_original_names};
pub use service::AnonymizationService;
pub use store::{EnvelopeStore, InMemoryStore, OwnerKeyStore, RecordId};
