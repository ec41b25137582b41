mod common;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use proptest::prelude::*;
use warden_jose::{EncryptionKeySet, JoseError, Jwk, KeyMaterial, jwe};

fn header_of(token: &str) -> serde_json::Value {
    let header = token.split('.').next().unwrap();
    serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header).unwrap()).unwrap()
}

// ── Round trips ──────────────────────────────────────────────────

#[test]
fn roundtrip_single_byte() {
    let (public, private) = EncryptionKeySet::generate();
    let token = jwe::encrypt(b"x", &public, "").unwrap();
    assert_eq!(token.split('.').count(), 5);
    assert_eq!(jwe::decrypt(token.as_bytes(), &private).unwrap(), b"x");
}

#[test]
fn roundtrip_multi_megabyte() {
    let (public, private) = EncryptionKeySet::generate();
    let payload: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    let token = jwe::encrypt(&payload, &public, "").unwrap();
    assert_eq!(jwe::decrypt(token.as_bytes(), &private).unwrap(), payload);
}

#[test]
fn header_names_algorithm_and_key() {
    let (public, _) = EncryptionKeySet::generate();
    let kid = public.keys()[0].kid.clone();
    let token = jwe::encrypt(b"secret", &public, &kid).unwrap();
    let header = header_of(&token);
    assert_eq!(header["alg"], "ECDH-ES+A128KW");
    assert_eq!(header["enc"], "A128GCM");
    assert_eq!(header["kid"], kid.as_str());
    assert_eq!(header["epk"]["crv"], "P-256");
}

#[test]
fn same_payload_encrypts_differently() {
    let (public, _) = EncryptionKeySet::generate();
    let a = jwe::encrypt(b"payload", &public, "").unwrap();
    let b = jwe::encrypt(b"payload", &public, "").unwrap();
    assert_ne!(a, b);
}

#[test]
fn private_set_decrypts_after_file_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let (public, private) = EncryptionKeySet::generate();
    let path = dir.path().join("enc.json");
    private.write(&path).unwrap();
    let loaded = EncryptionKeySet::read(&path).unwrap();

    let token = jwe::encrypt(b"hello", &public, "").unwrap();
    assert_eq!(jwe::decrypt(token.as_bytes(), &loaded).unwrap(), b"hello");
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn roundtrip_any_payload(payload in prop::collection::vec(any::<u8>(), 1..4096)) {
        let (public, private) = EncryptionKeySet::generate();
        let token = jwe::encrypt(&payload, &public, "").unwrap();
        prop_assert_eq!(jwe::decrypt(token.as_bytes(), &private).unwrap(), payload);
    }
}

// ── Key selection ────────────────────────────────────────────────

#[test]
fn empty_kid_selects_first_public_enc_key() {
    let (first_pub, first_priv) = EncryptionKeySet::generate();
    let (second_pub, _) = EncryptionKeySet::generate();

    let mut set = EncryptionKeySet::new();
    // private entries are skipped when choosing an encryption key
    set.push(first_priv.keys()[0].clone());
    set.push(first_pub.keys()[0].clone());
    set.push(second_pub.keys()[0].clone());

    let token = jwe::encrypt(b"data", &set, "").unwrap();
    assert_eq!(header_of(&token)["kid"], first_pub.keys()[0].kid.as_str());
}

#[test]
fn empty_kid_candidate_without_id_fails() {
    let (public, _) = EncryptionKeySet::generate();
    let mut jwk = public.keys()[0].clone();
    jwk.kid.clear();
    let mut set = EncryptionKeySet::new();
    set.push(jwk);
    assert!(matches!(
        jwe::encrypt(b"data", &set, ""),
        Err(JoseError::MissingKeyId)
    ));
}

#[test]
fn explicit_kid_must_exist() {
    let (public, _) = EncryptionKeySet::generate();
    assert!(matches!(
        jwe::encrypt(b"data", &public, "nope"),
        Err(JoseError::KeyNotFound(id)) if id == "nope"
    ));
}

#[test]
fn signing_key_is_not_an_encryption_candidate() {
    let key = common::fixed_key(1);
    let mut set = EncryptionKeySet::new();
    set.push(Jwk::signing("sig", KeyMaterial::Ed25519Public(key.verifying_key())));
    assert!(matches!(
        jwe::encrypt(b"data", &set, "sig"),
        Err(JoseError::KeyNotFound(_))
    ));
}

#[test]
fn mislabelled_key_fails_validation() {
    let key = common::fixed_key(1);
    let mut set = EncryptionKeySet::new();
    set.push(Jwk::encryption(
        "odd",
        KeyMaterial::Ed25519Public(key.verifying_key()),
    ));
    assert!(matches!(
        jwe::encrypt(b"data", &set, "odd"),
        Err(JoseError::WrongAlgorithm { .. })
    ));
}

// ── Failure modes ────────────────────────────────────────────────

#[test]
fn empty_inputs() {
    let (public, private) = EncryptionKeySet::generate();
    assert!(matches!(
        jwe::encrypt(b"", &public, ""),
        Err(JoseError::EmptyPayload)
    ));
    assert!(matches!(
        jwe::encrypt(b"x", &EncryptionKeySet::new(), ""),
        Err(JoseError::EmptyKeySet)
    ));
    assert!(matches!(
        jwe::decrypt(b"", &private),
        Err(JoseError::EmptyPayload)
    ));
    assert!(matches!(
        jwe::decrypt(b"a.b.c.d.e", &EncryptionKeySet::new()),
        Err(JoseError::EmptyKeySet)
    ));
}

#[test]
fn no_matching_private_key() {
    let (public, _) = EncryptionKeySet::generate();
    let (_, other_private) = EncryptionKeySet::generate();
    let token = jwe::encrypt(b"data", &public, "").unwrap();
    assert!(matches!(
        jwe::decrypt(token.as_bytes(), &other_private),
        Err(JoseError::KeyNotFound(_))
    ));
}

#[test]
fn public_set_cannot_decrypt() {
    let (public, _) = EncryptionKeySet::generate();
    let token = jwe::encrypt(b"data", &public, "").unwrap();
    assert!(matches!(
        jwe::decrypt(token.as_bytes(), &public),
        Err(JoseError::KeyNotFound(_))
    ));
}

#[test]
fn other_algorithms_rejected() {
    let (public, private) = EncryptionKeySet::generate();
    let token = jwe::encrypt(b"data", &public, "").unwrap();
    let mut header = header_of(&token);
    header["alg"] = "RSA-OAEP".into();
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    parts[0] = URL_SAFE_NO_PAD.encode(header.to_string());
    assert!(matches!(
        jwe::decrypt(parts.join(".").as_bytes(), &private),
        Err(JoseError::UnsupportedAlgorithm(_))
    ));
}

#[test]
fn missing_kid_rejected() {
    let (public, private) = EncryptionKeySet::generate();
    let token = jwe::encrypt(b"data", &public, "").unwrap();
    let mut header = header_of(&token);
    header.as_object_mut().unwrap().remove("kid");
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    parts[0] = URL_SAFE_NO_PAD.encode(header.to_string());
    assert!(matches!(
        jwe::decrypt(parts.join(".").as_bytes(), &private),
        Err(JoseError::MissingKeyId)
    ));
}

#[test]
fn tampered_ciphertext_fails() {
    let (public, private) = EncryptionKeySet::generate();
    let token = jwe::encrypt(b"some longer payload", &public, "").unwrap();
    let mut parts: Vec<String> = token.split('.').map(str::to_string).collect();
    let mut ciphertext = URL_SAFE_NO_PAD.decode(&parts[3]).unwrap();
    ciphertext[0] ^= 0x01;
    parts[3] = URL_SAFE_NO_PAD.encode(ciphertext);
    assert!(matches!(
        jwe::decrypt(parts.join(".").as_bytes(), &private),
        Err(JoseError::Decryption(_))
    ));
}

#[test]
fn wrong_segment_count_is_malformed() {
    let (_, private) = EncryptionKeySet::generate();
    assert!(matches!(
        jwe::decrypt(b"a.b.c", &private),
        Err(JoseError::MalformedToken(_))
    ));
}

#[cfg(unix)]
#[test]
fn encryption_set_modes() {
    let dir = tempfile::tempdir().unwrap();
    let (public, private) = EncryptionKeySet::generate();
    let public_path = dir.path().join("pub.json");
    let private_path = dir.path().join("priv.json");
    public.write(&public_path).unwrap();
    private.write(&private_path).unwrap();
    assert_eq!(common::mode_of(&public_path), 0o644);
    assert_eq!(common::mode_of(&private_path), 0o600);
}
