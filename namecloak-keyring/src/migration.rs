//! Re-keying stored envelopes from a legacy context key to the master key.
//!
//! Each record is migrated on its own: decrypt with the old key, check the
//! context binding, seal the same payload under the new key, optionally
//! reopen it, and only then overwrite the stored envelope. A record that
//! fails at any step keeps its old envelope and is reported; the batch moves
//! on to the next one. There is no cross-record transaction.

use crate::error::{KeyringError, KeyringResult};
use crate::policy::ContextRef;
use crate::store::{EnvelopeStore, OwnerKeyStore, RecordId};
use namecloak_crypto::{ContextId, decrypt_mapping, reseal};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Outcome of migrating a single record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordMigration {
    /// The envelope was re-encrypted and replaced.
    Migrated,
    /// The envelope already opened under the new key; nothing was written.
    AlreadyMigrated,
    /// The record holds no envelope.
    Missing,
}

/// A record whose migration failed, with the reason.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FailedRecord {
    pub record_id: RecordId,
    pub reason: String,
}

/// Per-record results of a batch migration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub migrated: Vec<RecordId>,
    pub already_migrated: Vec<RecordId>,
    pub missing: Vec<RecordId>,
    pub failed: Vec<FailedRecord>,
    /// Whether the context's stored key was switched to the new key.
    pub owner_key_switched: bool,
}

impl MigrationReport {
    /// True when no record failed.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total number of records visited.
    pub fn total(&self) -> usize {
        self.migrated.len() + self.already_migrated.len() + self.missing.len() + self.failed.len()
    }

    fn record(&mut self, record_id: RecordId, outcome: KeyringResult<RecordMigration>) {
        match outcome {
            Ok(RecordMigration::Migrated) => self.migrated.push(record_id),
            Ok(RecordMigration::AlreadyMigrated) => self.already_migrated.push(record_id),
            Ok(RecordMigration::Missing) => self.missing.push(record_id),
            Err(e) => {
                warn!(record = %record_id, "record migration failed: {e}");
                self.failed.push(FailedRecord {
                    record_id,
                    reason: e.to_string(),
                });
            }
        }
    }
}

/// Moves one record's envelope from `old_key` to `new_key`.
///
/// The stored envelope is overwritten only after every earlier step
/// succeeded. With `verify` set, the new envelope must also reopen under
/// `new_key` to the same payload before it is written.
pub fn migrate_record<S>(
    store: &S,
    record_id: &RecordId,
    expected_context: ContextId,
    old_key: &str,
    new_key: &str,
    verify: bool,
) -> KeyringResult<RecordMigration>
where
    S: EnvelopeStore + ?Sized,
{
    let Some(envelope) = store.read_envelope(record_id)? else {
        debug!(record = %record_id, "no envelope to migrate");
        return Ok(RecordMigration::Missing);
    };

    if let Ok(payload) = decrypt_mapping(&envelope, new_key) {
        payload.ensure_context(expected_context)?;
        debug!(record = %record_id, "envelope already sealed under new key");
        return Ok(RecordMigration::AlreadyMigrated);
    }

    let (payload, resealed) = reseal(&envelope, expected_context, old_key, new_key)?;

    if verify {
        match decrypt_mapping(&resealed, new_key) {
            Ok(reopened) if reopened == payload => {}
            _ => return Err(KeyringError::VerificationFailed(record_id.to_string())),
        }
    }

    store.write_envelope(record_id, &resealed)?;
    debug!(
        record = %record_id,
        context_id = expected_context,
        entries = payload.mapping.len(),
        "migrated envelope"
    );
    Ok(RecordMigration::Migrated)
}

/// Migrates every listed record of a context from `old_key` to `new_key`.
///
/// Records are handled independently: a failure is reported and the batch
/// continues. The context's stored key is replaced with `new_key` only when
/// no record failed, so envelopes left behind stay readable under the key
/// still on file. A failed key write is logged and leaves
/// `owner_key_switched` unset; the report is still returned.
pub fn migrate_context<S>(
    store: &S,
    context: &ContextRef,
    records: &[RecordId],
    old_key: &str,
    new_key: &str,
    verify: bool,
) -> KeyringResult<MigrationReport>
where
    S: OwnerKeyStore + EnvelopeStore + ?Sized,
{
    let mut report = MigrationReport::default();

    for record_id in records {
        let outcome = migrate_record(
            store,
            record_id,
            context.context_id,
            old_key,
            new_key,
            verify,
        );
        report.record(record_id.clone(), outcome);
    }

    if report.is_complete() {
        match store.write_owner_key(context.context_id, new_key) {
            Ok(()) => {
                report.owner_key_switched = true;
                info!(
                    context_id = context.context_id,
                    migrated = report.migrated.len(),
                    already_migrated = report.already_migrated.len(),
                    missing = report.missing.len(),
                    "context migrated to new key"
                );
            }
            Err(e) => {
                report.owner_key_switched = false;
                warn!(
                    context_id = context.context_id,
                    migrated = report.migrated.len(),
                    "records migrated but owner key switch failed: {e}"
                );
            }
        }
    } else {
        warn!(
            context_id = context.context_id,
            failed = report.failed.len(),
            total = report.total(),
            "context migration incomplete; keeping current owner key"
        );
    }

    Ok(report)
}
