//! Turning aliases back into original names for display.
//!
//! When no candidate key opens a context's envelope, every original name in
//! it is permanently unavailable. Nothing here guesses or falls back to a
//! plaintext copy.

use crate::policy::decrypt_with_candidates;
use namecloak_crypto::ContextId;
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

/// Placeholder shown in place of an original name that cannot be recovered.
pub const UNAVAILABLE_PLACEHOLDER: &str = "[unavailable]";

/// Result of looking up one alias.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum OriginalName {
    Revealed(String),
    Unavailable,
}

impl OriginalName {
    pub fn is_revealed(&self) -> bool {
        matches!(self, OriginalName::Revealed(_))
    }
}

impl fmt::Display for OriginalName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OriginalName::Revealed(name) => f.write_str(name),
            OriginalName::Unavailable => f.write_str(UNAVAILABLE_PLACEHOLDER),
        }
    }
}

/// Alias -> original table recovered from one envelope.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevealedNames {
    originals: Option<HashMap<String, String>>,
}

impl RevealedNames {
    /// A table for an envelope that could not be opened.
    pub fn unavailable() -> Self {
        Self { originals: None }
    }

    /// Whether the envelope was opened.
    pub fn is_available(&self) -> bool {
        self.originals.is_some()
    }

    pub fn lookup(&self, alias: &str) -> OriginalName {
        self.originals
            .as_ref()
            .and_then(|originals| originals.get(alias))
            .map_or(OriginalName::Unavailable, |name| {
                OriginalName::Revealed(name.clone())
            })
    }

    /// Number of aliases that can be revealed.
    pub fn len(&self) -> usize {
        self.originals.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Opens `envelope` with the first candidate key that works and inverts its
/// mapping. If two originals share an alias, the one that sorts first wins.
pub fn reveal_original_names<I, K>(
    envelope: &str,
    expected_context: ContextId,
    candidates: I,
) -> RevealedNames
where
    I: IntoIterator<Item = K>,
    K: AsRef<str>,
{
    match decrypt_with_candidates(envelope, expected_context, candidates) {
        Ok(Some(found)) => {
            let mut originals = HashMap::with_capacity(found.payload.mapping.len());
            for (original, alias) in found.payload.mapping {
                originals.entry(alias).or_insert(original);
            }
            RevealedNames {
                originals: Some(originals),
            }
        }
        Ok(None) => {
            warn!(
                context_id = expected_context,
                "no candidate key opened the mapping; original names unavailable"
            );
            RevealedNames::unavailable()
        }
        Err(e) => {
            warn!(
                context_id = expected_context,
                "refusing to reveal names: {e}"
            );
            RevealedNames::unavailable()
        }
    }
}
