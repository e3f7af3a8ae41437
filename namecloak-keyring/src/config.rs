//! Keyring configuration.

use crate::error::{KeyringError, KeyringResult};
use serde::{Deserialize, Serialize};

/// Environment variable overriding [`KeyringConfig::prefer_master`].
pub const ENV_PREFER_MASTER: &str = "NAMECLOAK_PREFER_MASTER";
/// Environment variable overriding [`KeyringConfig::cache_master_keys`].
pub const ENV_CACHE_MASTER_KEYS: &str = "NAMECLOAK_CACHE_MASTER_KEYS";
/// Environment variable overriding [`KeyringConfig::verify_migrated_envelopes`].
pub const ENV_VERIFY_MIGRATED: &str = "NAMECLOAK_VERIFY_MIGRATED";

/// Configuration for the anonymization service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyringConfig {
    /// Resolve every context to its owner's master key unless a caller asks
    /// for a legacy key explicitly.
    pub prefer_master: bool,

    /// Keep derived master keys in an in-process lookup table.
    pub cache_master_keys: bool,

    /// Reopen each re-encrypted envelope before it replaces the old one.
    pub verify_migrated_envelopes: bool,
}

impl Default for KeyringConfig {
    fn default() -> Self {
        Self {
            prefer_master: true,
            cache_master_keys: true,
            verify_migrated_envelopes: true,
        }
    }
}

impl KeyringConfig {
    /// Defaults overlaid with any `NAMECLOAK_*` environment variables.
    pub fn from_env() -> KeyringResult<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`from_env`](Self::from_env) with an injectable variable source.
    pub fn from_lookup<F>(lookup: F) -> KeyringResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(ENV_PREFER_MASTER) {
            config.prefer_master = parse_bool(ENV_PREFER_MASTER, &value)?;
        }
        if let Some(value) = lookup(ENV_CACHE_MASTER_KEYS) {
            config.cache_master_keys = parse_bool(ENV_CACHE_MASTER_KEYS, &value)?;
        }
        if let Some(value) = lookup(ENV_VERIFY_MIGRATED) {
            config.verify_migrated_envelopes = parse_bool(ENV_VERIFY_MIGRATED, &value)?;
        }
        Ok(config)
    }
}

fn parse_bool(name: &str, value: &str) -> KeyringResult<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(KeyringError::Config(format!(
            "{name} must be a boolean, got {other:?}"
        ))),
    }
}
