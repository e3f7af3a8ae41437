//! Identifiers for owners and contexts.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of an anonymization context (one expedition).
pub type ContextId = i64;

/// Stable identifier of the principal that owns one or more contexts.
///
/// Stored in its textual form: key derivation hashes the text, so `42` and
/// `"42"` name the same owner and derive the same master key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(String);

impl OwnerId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<i64> for OwnerId {
    fn from(id: i64) -> Self {
        Self(id.to_string())
    }
}

impl From<u64> for OwnerId {
    fn from(id: u64) -> Self {
        Self(id.to_string())
    }
}

impl From<&str> for OwnerId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OwnerId {
    fn from(id: String) -> Self {
        Self(id)
    }
}
