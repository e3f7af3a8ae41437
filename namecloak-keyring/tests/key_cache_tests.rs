//! Tests for MasterKeyCache.
//!
//! Covers derivation equivalence, rejection of foreign values, clone sharing
//! and concurrent access.

use namecloak_crypto::{OwnerId, derive_legacy_key, derive_master_key};
use namecloak_keyring::{KeyringError, MasterKeyCache};
use std::sync::Arc;
use std::thread;

#[test]
fn get_or_derive_matches_fresh_derivation() {
    let cache = MasterKeyCache::new();
    let owner = OwnerId::from(5_094_426_438_i64);

    assert!(cache.get(&owner).is_none());
    let key = cache.get_or_derive(&owner);
    assert_eq!(key, derive_master_key(&owner).encode());
    assert_eq!(cache.get(&owner), Some(key));
}

#[test]
fn empty_cache_state() {
    let cache = MasterKeyCache::new();
    assert!(cache.is_empty());
    assert_eq!(cache.len(), 0);
}

#[test]
fn insert_verified_accepts_true_master_key() {
    let cache = MasterKeyCache::new();
    let owner = OwnerId::from("owner-a");
    let key = derive_master_key(&owner).encode();

    cache.insert_verified(&owner, &key).unwrap();
    assert_eq!(cache.get(&owner), Some(key));
}

#[test]
fn insert_verified_rejects_other_keys() {
    let cache = MasterKeyCache::new();
    let owner = OwnerId::from("owner-a");
    let other_master = derive_master_key(&OwnerId::from("owner-b")).encode();
    let legacy = derive_legacy_key(1, &owner).encode();

    for bogus in [other_master.as_str(), legacy.as_str(), "not-a-key"] {
        let err = cache.insert_verified(&owner, bogus).unwrap_err();
        match err {
            KeyringError::CacheMismatch { owner: o } => assert_eq!(o, "owner-a"),
            other => panic!("expected CacheMismatch, got: {other:?}"),
        }
    }
    assert!(cache.is_empty(), "rejected values must not be cached");
}

#[test]
fn remove_then_rederive() {
    let cache = MasterKeyCache::new();
    let owner = OwnerId::from(3_i64);
    let key = cache.get_or_derive(&owner);

    assert_eq!(cache.remove(&owner), Some(key.clone()));
    assert!(cache.remove(&owner).is_none());
    assert_eq!(cache.get_or_derive(&owner), key);
}

#[test]
fn clone_shares_same_underlying_data() {
    let cache = MasterKeyCache::new();
    let clone = cache.clone();
    let owner = OwnerId::from(9_i64);

    let key = cache.get_or_derive(&owner);
    assert_eq!(clone.get(&owner), Some(key));
    assert_eq!(clone.len(), 1);
}

#[test]
fn concurrent_derivations_agree() {
    let cache = Arc::new(MasterKeyCache::new());
    let owners: Vec<OwnerId> = (0..4_i64).map(OwnerId::from).collect();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let cache = Arc::clone(&cache);
            let owner = owners[i % owners.len()].clone();
            thread::spawn(move || (owner.clone(), cache.get_or_derive(&owner)))
        })
        .collect();

    for handle in handles {
        let (owner, key) = handle.join().unwrap();
        assert_eq!(key, derive_master_key(&owner).encode());
    }
    assert_eq!(cache.len(), owners.len(), "one entry per owner");
}
