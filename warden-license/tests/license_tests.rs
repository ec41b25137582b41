mod common;

use chrono::Duration;
use common::{AUDIENCE, ISSUER, license_for, signer};
use ed25519_dalek::SigningKey;
use pretty_assertions::assert_eq;
use proptest::prelude::*;
use warden_jose::{JoseError, SigningKeySet};
use warden_license::{ClaimError, License, LicenseClaims, Subsystem, anonymize_subject};
use warden_types::{ClaimId, ErrorKind};

// ── Construction ─────────────────────────────────────────────────

#[test]
fn new_fills_claims() {
    let license = license_for(Duration::days(30));
    let claims = license.claims();
    assert_eq!(claims.issuer, ISSUER);
    assert_eq!(
        claims.subject,
        anonymize_subject("Customer Ltd <ops@customer.example>")
    );
    assert_eq!(claims.audience, vec![AUDIENCE.to_string()]);
    assert_eq!(claims.expires_at - claims.issued_at, 30 * 24 * 60 * 60);
    assert!(!license.is_expired(Duration::zero()));
}

#[test]
fn zero_and_negative_validity_are_accepted() {
    let zero = license_for(Duration::zero());
    assert_eq!(zero.claims().expires_at, zero.claims().issued_at);

    let negative = license_for(Duration::hours(-1));
    assert!(negative.validate().is_ok());
    assert!(negative.is_expired(Duration::zero()));
}

#[test]
fn new_rejects_empty_audience() {
    let err = License::new(ISSUER, "subject", vec![], Duration::days(1), vec![]).unwrap_err();
    assert_eq!(err.subsystem(), Some(Subsystem::License));
    assert!(matches!(err.root(), ClaimError::EmptyField("audience")));
    assert!(err.to_string().starts_with("invalid license key: "));
}

#[test]
fn new_rejects_empty_issuer() {
    let err = License::new(
        "",
        "subject",
        vec![AUDIENCE.into()],
        Duration::days(1),
        vec![],
    )
    .unwrap_err();
    assert!(matches!(err.root(), ClaimError::EmptyField("issuer")));
    assert_eq!(err.kind(), ErrorKind::ClaimViolation);
}

#[test]
fn from_claims_rejects_future_issue() {
    let now = chrono::Utc::now().timestamp();
    let claims = LicenseClaims {
        id: ClaimId::new(),
        issuer: ISSUER.into(),
        subject: "c-0000000000000000".into(),
        audience: vec![AUDIENCE.into()],
        issued_at: now + 3600,
        expires_at: now + 7200,
        capabilities: vec![],
    };
    let err = License::from_claims(claims).unwrap_err();
    assert!(matches!(err.root(), ClaimError::IssuedInFuture(_)));
}

// ── Expiry ───────────────────────────────────────────────────────

#[test]
fn expiry_boundary_uses_leeway() {
    // expired thirty seconds ago
    let license = license_for(Duration::seconds(-30));
    assert!(!license.is_expired(Duration::minutes(1)));
    assert!(license.is_expired(Duration::seconds(10)));
}

// ── Membership ───────────────────────────────────────────────────

#[test]
fn membership_is_case_insensitive() {
    let license = license_for(Duration::days(1));
    assert!(license.has_audience("CLUSTER.example.com"));
    assert!(!license.has_audience("other.example.com"));
    assert!(license.has_capability("scheduler"));
    assert!(!license.has_capability("billing"));
}

// ── Tokens ───────────────────────────────────────────────────────

#[test]
fn sign_and_verify() {
    let (key, public) = signer();
    let license = license_for(Duration::days(365));
    let token = license.sign(&key).unwrap();
    let verified = License::from_token(&token, &public).unwrap();
    assert_eq!(verified, license);
}

#[test]
fn expired_license_still_verifies() {
    let (key, public) = signer();
    let license = license_for(Duration::days(-2));
    let token = license.sign(&key).unwrap();
    let verified = License::from_token(&token, &public).unwrap();
    assert!(verified.is_expired(Duration::minutes(1)));
}

#[test]
fn token_payload_is_plain_claims() {
    use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};

    let (key, _) = signer();
    let license = license_for(Duration::days(1));
    let token = license.sign(&key).unwrap();
    let payload = token.split('.').nth(1).unwrap();
    let json: serde_json::Value =
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(payload).unwrap()).unwrap();
    assert_eq!(json["jti"], license.id().to_string());
    assert_eq!(json["iss"], ISSUER);
    assert!(json["aud"].is_array());
    assert_eq!(json["capabilities"][0], "Scheduler");
}

#[test]
fn unknown_kid_is_lookup_failure() {
    let (key, _) = signer();
    let (_, other_public) = signer();
    let token = license_for(Duration::days(1)).sign(&key).unwrap();
    let err = License::from_token(&token, &other_public).unwrap_err();
    assert_eq!(err.subsystem(), Some(Subsystem::License));
    assert!(matches!(err.root(), ClaimError::Jose(JoseError::KeyNotFound(_))));
}

#[test]
fn same_kid_other_key_fails_signature() {
    let (key, _) = signer();
    let mut impostor = SigningKeySet::new_public();
    impostor
        .add_public_key(SigningKey::from_bytes(&[9; 32]).verifying_key(), key.id())
        .unwrap();
    let token = license_for(Duration::days(1)).sign(&key).unwrap();
    let err = License::from_token(&token, &impostor.to_json().unwrap()).unwrap_err();
    assert!(matches!(err.root(), ClaimError::Jose(JoseError::SignatureInvalid)));
    assert_eq!(err.kind(), ErrorKind::Crypto);
}

#[test]
fn invalid_claims_in_valid_token_are_rejected() {
    let (key, public) = signer();
    let payload = serde_json::json!({
        "jti": ClaimId::new().to_string(),
        "iss": ISSUER,
        "sub": "",
        "aud": [AUDIENCE],
        "iat": chrono::Utc::now().timestamp(),
        "exp": chrono::Utc::now().timestamp() + 60,
    });
    let token = warden_jose::jwt::sign(payload.to_string().as_bytes(), &key).unwrap();
    let err = License::from_token(&token, &public).unwrap_err();
    assert_eq!(err.subsystem(), Some(Subsystem::License));
    assert!(matches!(err.root(), ClaimError::EmptyField("subject")));
}

#[test]
fn non_v6_id_in_token_is_rejected() {
    let (key, public) = signer();
    let payload = serde_json::json!({
        "jti": "67e55044-10b1-426f-9247-bb680e5fe0c8",
        "iss": ISSUER,
        "sub": "c-1",
        "aud": AUDIENCE,
        "iat": chrono::Utc::now().timestamp(),
        "exp": chrono::Utc::now().timestamp() + 60,
    });
    let token = warden_jose::jwt::sign(payload.to_string().as_bytes(), &key).unwrap();
    let err = License::from_token(&token, &public).unwrap_err();
    assert!(matches!(err.root(), ClaimError::Serialization(_)));
    assert!(err.to_string().contains("version 6"));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn roundtrip_any_license(
        subject in "[a-zA-Z0-9 @.<>-]{1,40}",
        audience in prop::collection::vec("[a-z.]{1,20}", 1..4),
        days in 0i64..5000,
        capabilities in prop::collection::vec("[A-Za-z]{1,12}", 0..5),
    ) {
        let (key, public) = signer();
        let license = License::new(
            ISSUER,
            &subject,
            audience,
            Duration::days(days),
            capabilities,
        )
        .unwrap();
        let token = license.sign(&key).unwrap();
        let verified = License::from_token(&token, &public).unwrap();
        prop_assert_eq!(verified.claims(), license.claims());
    }
}
