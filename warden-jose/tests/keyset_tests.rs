mod common;

use common::{ISSUER, fixed_key, fixed_pair};
use pretty_assertions::assert_eq;
use warden_jose::{JoseError, SigningKeySet, generate_signing_pair};

fn kids(set: &SigningKeySet) -> Vec<String> {
    set.keys().iter().map(|k| k.kid.clone()).collect()
}

// ── Add rules ────────────────────────────────────────────────────

#[test]
fn public_keys_are_prepended() {
    let mut set = SigningKeySet::new_public();
    set.add_public_key(fixed_key(1).verifying_key(), "first").unwrap();
    set.add_public_key(fixed_key(2).verifying_key(), "second").unwrap();
    assert_eq!(kids(&set), vec!["second", "first"]);
}

#[test]
fn public_key_duplicate_id_rejected() {
    let mut set = SigningKeySet::new_public();
    set.add_public_key(fixed_key(1).verifying_key(), "k").unwrap();
    let err = set
        .add_public_key(fixed_key(2).verifying_key(), "k")
        .unwrap_err();
    assert!(matches!(err, JoseError::DuplicateKeyId(id) if id == "k"));
    assert_eq!(set.len(), 1);
}

#[test]
fn public_key_rejected_on_private_set() {
    let mut set = SigningKeySet::new_private(ISSUER);
    let err = set
        .add_public_key(fixed_key(1).verifying_key(), "k")
        .unwrap_err();
    assert!(matches!(err, JoseError::PrivateSet));
}

#[test]
fn private_key_needs_issuer() {
    let mut set = SigningKeySet::new_public();
    let err = set.add_private_key(fixed_key(1), "k").unwrap_err();
    assert!(matches!(err, JoseError::MissingIssuer));
}

#[test]
fn private_set_holds_one_key() {
    let mut set = SigningKeySet::new_private(ISSUER);
    set.add_private_key(fixed_key(1), "a").unwrap();
    let err = set.add_private_key(fixed_key(2), "b").unwrap_err();
    assert!(matches!(err, JoseError::PrivateKeyPresent));
    assert_eq!(set.len(), 1);
}

#[test]
fn empty_id_rejected() {
    let mut set = SigningKeySet::new_public();
    assert!(matches!(
        set.add_public_key(fixed_key(1).verifying_key(), ""),
        Err(JoseError::MissingKeyId)
    ));
}

// ── Generation ───────────────────────────────────────────────────

#[test]
fn generated_pair_shares_key_id() {
    let (public, private) = generate_signing_pair(ISSUER).unwrap();
    assert!(!public.is_private());
    assert_eq!(private.issuer(), Some(ISSUER));
    assert_eq!(kids(&public), kids(&private));
    assert!(warden_types::ClaimId::parse(&public.keys()[0].kid).is_ok());

    let signer = private.private_key().unwrap();
    let verifier = public.public_key(signer.id()).unwrap();
    let signature = signer.sign(b"message");
    verifier.verify(b"message", &signature).unwrap();
}

#[test]
fn generate_requires_issuer() {
    assert!(matches!(
        generate_signing_pair(""),
        Err(JoseError::MissingIssuer)
    ));
}

#[test]
fn to_public_strips_private_material() {
    let (_, private) = fixed_pair(3, "k");
    let public = private.to_public();
    assert!(!public.is_private());
    assert!(public.keys()[0].is_public());
    let json = String::from_utf8(public.to_json().unwrap()).unwrap();
    assert!(!json.contains("\"d\""));
    assert!(!json.contains("issuer"));
}

// ── Parsing ──────────────────────────────────────────────────────

#[test]
fn from_json_rejects_empty_keys() {
    let err = SigningKeySet::from_json(br#"{"keys":[]}"#).unwrap_err();
    assert!(matches!(err, JoseError::EmptyKeySet));
}

#[test]
fn from_json_rejects_private_set_with_two_keys() {
    let (_, a) = fixed_pair(1, "a");
    let (_, b) = fixed_pair(2, "b");
    let a: serde_json::Value = serde_json::from_slice(&a.to_json().unwrap()).unwrap();
    let b: serde_json::Value = serde_json::from_slice(&b.to_json().unwrap()).unwrap();
    let doc = serde_json::json!({
        "issuer": ISSUER,
        "keys": [a["keys"][0], b["keys"][0]],
    });
    let err = SigningKeySet::from_json(doc.to_string().as_bytes()).unwrap_err();
    assert!(matches!(err, JoseError::TooManyPrivateKeys(2)));
}

#[test]
fn from_json_rejects_garbage() {
    assert!(matches!(
        SigningKeySet::from_json(b"not json"),
        Err(JoseError::Serialization(_))
    ));
}

/// A private set's JSON with the issuer removed or blanked.
fn private_json_without_issuer(blank: bool) -> Vec<u8> {
    let (_, private) = fixed_pair(3, "k3");
    let mut doc: serde_json::Value = serde_json::from_slice(&private.to_json().unwrap()).unwrap();
    if blank {
        doc["issuer"] = serde_json::json!("");
    } else {
        doc.as_object_mut().unwrap().remove("issuer");
    }
    doc.to_string().into_bytes()
}

#[test]
fn from_json_rejects_private_material_without_issuer() {
    for blank in [false, true] {
        let err = SigningKeySet::from_json(&private_json_without_issuer(blank)).unwrap_err();
        assert!(
            matches!(&err, JoseError::KeyMaterialMismatch { kid, set: "public" } if kid == "k3"),
            "{err}"
        );
    }
}

#[test]
fn from_json_rejects_public_material_with_issuer() {
    let (public, _) = fixed_pair(3, "k3");
    let mut doc: serde_json::Value = serde_json::from_slice(&public.to_json().unwrap()).unwrap();
    doc["issuer"] = serde_json::json!(ISSUER);
    let err = SigningKeySet::from_json(doc.to_string().as_bytes()).unwrap_err();
    assert!(matches!(err, JoseError::KeyMaterialMismatch { set: "private", .. }));
}

#[test]
fn json_roundtrip_preserves_keys() {
    let (public, private) = fixed_pair(4, "k4");
    let parsed = SigningKeySet::from_json(&private.to_json().unwrap()).unwrap();
    assert_eq!(parsed.issuer(), Some(ISSUER));
    assert_eq!(
        parsed.private_key().unwrap().public_key().verifying_key(),
        &fixed_key(4).verifying_key()
    );
    let parsed = SigningKeySet::from_json(&public.to_json().unwrap()).unwrap();
    assert_eq!(kids(&parsed), vec!["k4"]);
}

// ── Lookup ───────────────────────────────────────────────────────

#[test]
fn public_key_by_id_not_found() {
    let (public, _) = fixed_pair(1, "k1");
    let err = SigningKeySet::public_key_by_id(&public.to_json().unwrap(), "other").unwrap_err();
    assert!(matches!(err, JoseError::KeyNotFound(id) if id == "other"));
}

#[test]
fn public_key_by_id_rejects_wrong_use() {
    let (public, _) = fixed_pair(1, "k1");
    let json = String::from_utf8(public.to_json().unwrap())
        .unwrap()
        .replace("\"sig\"", "\"enc\"");
    let err = SigningKeySet::public_key_by_id(json.as_bytes(), "k1").unwrap_err();
    assert!(matches!(err, JoseError::WrongUse { .. }));
}

#[test]
fn public_key_by_id_rejects_wrong_alg() {
    let (public, _) = fixed_pair(1, "k1");
    let json = String::from_utf8(public.to_json().unwrap())
        .unwrap()
        .replace("\"EdDSA\"", "\"ES256\"");
    let err = SigningKeySet::public_key_by_id(json.as_bytes(), "k1").unwrap_err();
    assert!(matches!(err, JoseError::WrongAlgorithm { .. }));
}

#[test]
fn public_key_by_id_rejects_private_material() {
    let key = fixed_key(1);
    let mut set = SigningKeySet::new_private(ISSUER);
    set.add_private_key(key, "k1").unwrap();
    let err = SigningKeySet::public_key_by_id(&set.to_json().unwrap(), "k1").unwrap_err();
    assert!(matches!(err, JoseError::WrongKeyType { .. }));
}

#[test]
fn private_key_by_id_rejects_public_set() {
    let (public, _) = fixed_pair(1, "k1");
    let err = SigningKeySet::private_key_by_id(&public.to_json().unwrap()).unwrap_err();
    assert!(matches!(err, JoseError::MissingIssuer));
}

#[test]
fn private_key_debug_is_redacted() {
    let (_, private) = fixed_pair(5, "k5");
    let key = private.private_key().unwrap();
    let debug = format!("{key:?}");
    assert!(debug.contains("REDACTED"));
    assert!(debug.contains("k5"));
}

// ── Persistence ──────────────────────────────────────────────────

#[test]
fn public_writes_merge() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("public.json");

    let (first, _) = fixed_pair(1, "one");
    let (second, _) = fixed_pair(2, "two");
    first.write(&path).unwrap();
    second.write(&path).unwrap();

    let merged = SigningKeySet::read(&path).unwrap();
    assert_eq!(kids(&merged), vec!["two", "one"]);
}

#[test]
fn duplicate_write_leaves_file_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("public.json");

    let (first, _) = fixed_pair(1, "same");
    first.write(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let (second, _) = fixed_pair(2, "same");
    let err = second.write(&path).unwrap_err();
    assert!(matches!(err, JoseError::DuplicateKeyId(id) if id == "same"));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn private_write_never_clobbers() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("private.json");

    let (_, first) = fixed_pair(1, "one");
    first.write(&path).unwrap();
    let before = std::fs::read(&path).unwrap();

    let (_, second) = fixed_pair(2, "two");
    let err = second.write(&path).unwrap_err();
    assert!(matches!(err, JoseError::FileExists(p) if p == path));
    assert_eq!(std::fs::read(&path).unwrap(), before);
}

#[test]
fn public_write_refuses_to_merge_into_private_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");

    let (public, private) = fixed_pair(1, "one");
    private.write(&path).unwrap();
    let err = public.write(&path).unwrap_err();
    assert!(matches!(err, JoseError::PrivateSet));
}

#[test]
fn empty_set_is_not_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");
    let err = SigningKeySet::new_public().write(&path).unwrap_err();
    assert!(matches!(err, JoseError::EmptyKeySet));
    assert!(!path.exists());
}

#[cfg(unix)]
#[test]
fn file_modes_follow_privacy() {
    let dir = tempfile::tempdir().unwrap();
    let public_path = dir.path().join("public.json");
    let private_path = dir.path().join("private.json");

    let (public, private) = fixed_pair(1, "k");
    public.write(&public_path).unwrap();
    private.write(&private_path).unwrap();

    assert_eq!(common::mode_of(&public_path), 0o644);
    assert_eq!(common::mode_of(&private_path), 0o600);
}

#[test]
fn private_material_without_issuer_is_never_written() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("keys.json");

    let set: SigningKeySet = serde_json::from_slice(&private_json_without_issuer(false)).unwrap();
    let err = set.write(&path).unwrap_err();
    assert!(matches!(err, JoseError::KeyMaterialMismatch { .. }));
    assert!(!path.exists());
}

#[test]
fn public_write_refuses_to_merge_private_material() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("public.json");
    let leaked = private_json_without_issuer(true);
    std::fs::write(&path, &leaked).unwrap();

    let (public, _) = fixed_pair(4, "k4");
    let err = public.write(&path).unwrap_err();
    assert!(matches!(err, JoseError::KeyMaterialMismatch { .. }));
    assert_eq!(std::fs::read(&path).unwrap(), leaked);
}
