//! Authenticated name-mapping envelopes.
//!
//! A mapping (original name -> alias) is wrapped with the context it belongs
//! to and a timestamp, serialized as JSON with sorted keys, sealed with
//! AES-256-GCM under an owner key and stored as one base64url string:
//!
//! ```text
//! base64url( nonce[12] || tag[16] || AES-GCM( {"context_id":..,"mapping":{..},"timestamp":..} ) )
//! ```
//!
//! Opening never yields plaintext unless both the key and the envelope are
//! intact. The embedded context id is returned to the caller, who checks it
//! against the context they expected with [`MappingPayload::ensure_context`].

use crate::cipher;
use crate::error::{ContextMismatch, CryptoResult, DecryptError, ResealError};
use crate::key::OwnerKey;
use crate::owner::ContextId;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Original name -> alias. Ordered so serialized payloads are deterministic.
pub type NameMapping = BTreeMap<String, String>;

/// Decrypted contents of a mapping envelope.
///
/// Fields are declared in lexical order so the serialized object has sorted
/// keys. Unknown fields are rejected when decoding. Timestamps are written as
/// RFC 3339; on decode an ISO-8601 timestamp without an offset is read as UTC.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MappingPayload {
    pub context_id: ContextId,
    pub mapping: NameMapping,
    #[serde(deserialize_with = "iso8601::deserialize")]
    pub timestamp: DateTime<Utc>,
}

mod iso8601 {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::de::Error;
    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
            return Ok(ts.with_timezone(&Utc));
        }
        raw.parse::<NaiveDateTime>()
            .map(|naive| naive.and_utc())
            .map_err(|e| D::Error::custom(format!("timestamp {raw:?} is not ISO-8601: {e}")))
    }
}

impl MappingPayload {
    /// Wraps a mapping for `context_id`, stamped with the current time.
    pub fn new(context_id: ContextId, mapping: NameMapping) -> Self {
        Self {
            context_id,
            mapping,
            timestamp: Utc::now(),
        }
    }

    /// Fails when the envelope was produced for a different context.
    pub fn ensure_context(&self, expected: ContextId) -> Result<(), ContextMismatch> {
        if self.context_id == expected {
            Ok(())
        } else {
            Err(ContextMismatch {
                expected,
                found: self.context_id,
            })
        }
    }

    /// Looks up the original name behind an alias.
    pub fn original_for(&self, alias: &str) -> Option<&str> {
        self.mapping
            .iter()
            .find(|(_, a)| a.as_str() == alias)
            .map(|(original, _)| original.as_str())
    }
}

/// Seals an existing payload as-is, keeping its timestamp.
///
/// Used when re-keying: the logical contents of the envelope do not change.
pub fn seal_payload(payload: &MappingPayload, key: &str) -> CryptoResult<String> {
    let owner_key = OwnerKey::decode(key)?;
    let plaintext = Zeroizing::new(serde_json::to_vec(payload)?);
    let sealed = cipher::seal(&owner_key, &plaintext)?;

    debug!(
        context_id = payload.context_id,
        entries = payload.mapping.len(),
        key = %owner_key.fingerprint(),
        "sealed name mapping"
    );
    Ok(URL_SAFE.encode(sealed))
}

/// Encrypts `mapping` for `context_id` under `key` (an encoded owner key).
///
/// Every call draws a fresh nonce, so the same input never produces the
/// same envelope twice.
pub fn encrypt_mapping(
    context_id: ContextId,
    mapping: &NameMapping,
    key: &str,
) -> CryptoResult<String> {
    seal_payload(&MappingPayload::new(context_id, mapping.clone()), key)
}

/// Opens an envelope with `key`.
///
/// Each failure mode is logged distinctly, but all of them mean the same
/// thing to the caller: no mapping.
pub fn decrypt_mapping(envelope: &str, key: &str) -> Result<MappingPayload, DecryptError> {
    let owner_key = OwnerKey::decode(key).map_err(|e| {
        warn!("refusing to decrypt mapping: {e}");
        DecryptError::from(e)
    })?;

    let sealed = URL_SAFE.decode(envelope.trim()).map_err(|e| {
        debug!("mapping envelope is not base64url: {e}");
        DecryptError::MalformedEnvelope(format!("not base64url: {e}"))
    })?;

    let plaintext = cipher::open(&owner_key, &sealed).inspect_err(|e| {
        debug!(key = %owner_key.fingerprint(), "mapping envelope did not open: {e}");
    })?;

    let payload: MappingPayload = serde_json::from_slice(&plaintext).map_err(|e| {
        warn!(
            key = %owner_key.fingerprint(),
            "mapping envelope authenticated but payload is corrupt: {e}"
        );
        DecryptError::StructuralCorruption(e.to_string())
    })?;

    debug!(
        context_id = payload.context_id,
        entries = payload.mapping.len(),
        "opened name mapping"
    );
    Ok(payload)
}

/// Checks that `key` can seal and reopen `test_mapping` for `context_id`.
///
/// A query, not an assertion: any failure is reported as `false`.
pub fn verify_key_roundtrip(context_id: ContextId, key: &str, test_mapping: &NameMapping) -> bool {
    let envelope = match encrypt_mapping(context_id, test_mapping, key) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!("key round-trip failed to encrypt: {e}");
            return false;
        }
    };

    match decrypt_mapping(&envelope, key) {
        Ok(payload) => payload.context_id == context_id && &payload.mapping == test_mapping,
        Err(e) => {
            debug!("key round-trip failed to decrypt: {e}");
            false
        }
    }
}

/// Opens `envelope` with `old_key`, checks it belongs to `expected_context`
/// and seals the same payload under `new_key`.
///
/// The input envelope is left untouched; callers replace it only once they
/// hold the new one.
pub fn reseal(
    envelope: &str,
    expected_context: ContextId,
    old_key: &str,
    new_key: &str,
) -> Result<(MappingPayload, String), ResealError> {
    let payload = decrypt_mapping(envelope, old_key)?;
    payload.ensure_context(expected_context)?;
    let resealed = seal_payload(&payload, new_key)?;
    Ok((payload, resealed))
}
