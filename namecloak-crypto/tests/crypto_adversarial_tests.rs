//! Adversarial tests for mapping envelopes.
//!
//! Wrong keys, bit flips anywhere in the stored string, truncation and
//! splicing must all fail closed: no mapping comes back.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use namecloak_crypto::{
    DecryptError, ENVELOPE_MIN_LEN, NameMapping, OwnerId, decrypt_mapping, derive_legacy_key,
    derive_master_key, encrypt_mapping,
};
use std::sync::OnceLock;

fn names() -> NameMapping {
    [("Alice", "Capitão Barba Negra"), ("Bob", "Long John")]
        .into_iter()
        .map(|(o, a)| (o.to_string(), a.to_string()))
        .collect()
}

fn shared_key() -> &'static str {
    static KEY: OnceLock<String> = OnceLock::new();
    KEY.get_or_init(|| derive_master_key(&OwnerId::from(5094426438_i64)).encode())
}

// ── Wrong Key ──

#[test]
fn no_false_accepts_across_key_pairs() {
    let owner = OwnerId::from(1_i64);
    let keys: Vec<String> = std::iter::once(derive_master_key(&owner).encode())
        .chain((0..3).map(|i| derive_legacy_key(i, &owner).encode()))
        .chain(std::iter::once(derive_master_key(&OwnerId::from(2_i64)).encode()))
        .collect();

    for (i, k1) in keys.iter().enumerate() {
        let envelope = encrypt_mapping(1, &names(), k1).unwrap();
        for (j, k2) in keys.iter().enumerate() {
            let result = decrypt_mapping(&envelope, k2);
            if i == j {
                assert!(result.is_ok());
            } else {
                assert!(
                    result.unwrap_err().is_authentication_failure(),
                    "key {j} opened envelope sealed with key {i}"
                );
            }
        }
    }
}

// ── Tampering ──

#[test]
fn every_bit_flip_in_envelope_string_is_rejected() {
    let key = shared_key();
    let envelope = encrypt_mapping(7, &names(), key).unwrap();
    let bytes = envelope.as_bytes();

    for pos in 0..bytes.len() {
        for bit in 0..7 {
            let mut tampered = bytes.to_vec();
            tampered[pos] ^= 1 << bit;
            let tampered = String::from_utf8(tampered).unwrap();
            if tampered.trim() == envelope {
                // Whitespace at the edges is trimmed before decoding.
                continue;
            }
            assert!(
                decrypt_mapping(&tampered, key).is_err(),
                "flip of bit {bit} at char {pos} was accepted"
            );
        }
    }
}

#[test]
fn every_byte_of_decoded_envelope_is_authenticated() {
    let key = shared_key();
    let raw = URL_SAFE
        .decode(encrypt_mapping(7, &names(), key).unwrap())
        .unwrap();

    for i in 0..raw.len() {
        let mut tampered = raw.clone();
        tampered[i] ^= 0xFF;
        let err = decrypt_mapping(&URL_SAFE.encode(&tampered), key).unwrap_err();
        assert!(err.is_authentication_failure(), "byte {i}: {err:?}");
    }
}

#[test]
fn truncation_is_rejected() {
    let key = shared_key();
    let raw = URL_SAFE
        .decode(encrypt_mapping(7, &names(), key).unwrap())
        .unwrap();

    for len in [0, 1, ENVELOPE_MIN_LEN - 1] {
        let err = decrypt_mapping(&URL_SAFE.encode(&raw[..len]), key).unwrap_err();
        assert!(matches!(err, DecryptError::MalformedEnvelope(_)), "len {len}: {err:?}");
    }
    for len in [ENVELOPE_MIN_LEN, raw.len() - 1] {
        let err = decrypt_mapping(&URL_SAFE.encode(&raw[..len]), key).unwrap_err();
        assert!(err.is_authentication_failure(), "len {len}: {err:?}");
    }
}

#[test]
fn appended_bytes_are_rejected() {
    let key = shared_key();
    let mut raw = URL_SAFE
        .decode(encrypt_mapping(7, &names(), key).unwrap())
        .unwrap();
    raw.push(0);
    assert!(decrypt_mapping(&URL_SAFE.encode(&raw), key)
        .unwrap_err()
        .is_authentication_failure());
}

#[test]
fn spliced_nonce_from_other_envelope_is_rejected() {
    let key = shared_key();
    let a = URL_SAFE.decode(encrypt_mapping(1, &names(), key).unwrap()).unwrap();
    let b = URL_SAFE.decode(encrypt_mapping(2, &names(), key).unwrap()).unwrap();

    let mut spliced = b[..12].to_vec();
    spliced.extend_from_slice(&a[12..]);
    assert!(decrypt_mapping(&URL_SAFE.encode(&spliced), key).is_err());
}

#[test]
fn swapped_envelopes_keep_their_own_context() {
    let key = shared_key();
    let for_seven = encrypt_mapping(7, &names(), key).unwrap();
    // A valid envelope placed on the wrong record still opens, but reports
    // its true context so the caller's check catches it.
    let payload = decrypt_mapping(&for_seven, key).unwrap();
    assert!(payload.ensure_context(8).is_err());
}

// Property-based tests
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn mapping_strategy() -> impl Strategy<Value = NameMapping> {
        proptest::collection::btree_map(".{0,24}", ".{0,24}", 0..12)
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn encrypt_decrypt_always_roundtrips(ctx in any::<i64>(), mapping in mapping_strategy()) {
            let key = shared_key();
            let envelope = encrypt_mapping(ctx, &mapping, key).unwrap();
            let payload = decrypt_mapping(&envelope, key).unwrap();
            prop_assert_eq!(payload.context_id, ctx);
            prop_assert_eq!(payload.mapping, mapping);
        }

        #[test]
        fn ciphertexts_never_repeat(ctx in any::<i64>(), mapping in mapping_strategy()) {
            let key = shared_key();
            let a = encrypt_mapping(ctx, &mapping, key).unwrap();
            let b = encrypt_mapping(ctx, &mapping, key).unwrap();
            prop_assert_ne!(a, b);
        }

        #[test]
        fn random_strings_never_open(garbage in "[A-Za-z0-9_=-]{0,200}") {
            prop_assert!(decrypt_mapping(&garbage, shared_key()).is_err());
        }

        #[test]
        fn single_byte_corruption_never_opens(
            mapping in mapping_strategy(),
            index in any::<proptest::sample::Index>(),
            flip in 1u8..=255,
        ) {
            let key = shared_key();
            let mut raw = URL_SAFE.decode(encrypt_mapping(3, &mapping, key).unwrap()).unwrap();
            let i = index.index(raw.len());
            raw[i] ^= flip;
            prop_assert!(decrypt_mapping(&URL_SAFE.encode(&raw), key).is_err());
        }
    }
}
