//! JSON Web Key entries.
//!
//! Only four kinds of key material are supported, modelled as the closed
//! [`KeyMaterial`] enum: Ed25519 public/private keys for signing and P-256
//! public/private keys for ECDH key agreement. Any other `kty`/`crv`
//! combination is rejected while parsing.

use std::fmt;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::{SigningKey, VerifyingKey};
use p256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use serde::{Deserialize, Serialize};

use crate::error::{JoseError, JoseResult};

/// `alg` tag of signing keys.
pub const ALG_EDDSA: &str = "EdDSA";
/// `use` tag of signing keys.
pub const USE_SIG: &str = "sig";
/// `alg` tag of encryption keys.
pub const ALG_ECDH_ES_A128KW: &str = "ECDH-ES+A128KW";
/// Content encryption algorithm of encrypted tokens.
pub const ENC_A128GCM: &str = "A128GCM";
/// `use` tag of encryption keys.
pub const USE_ENC: &str = "enc";

const KTY_OKP: &str = "OKP";
const KTY_EC: &str = "EC";
const CRV_ED25519: &str = "Ed25519";
const CRV_P256: &str = "P-256";

/// Raw key material held by a [`Jwk`].
#[derive(Clone)]
pub enum KeyMaterial {
    Ed25519Public(VerifyingKey),
    Ed25519Private(SigningKey),
    P256Public(p256::PublicKey),
    P256Private(p256::SecretKey),
}

impl KeyMaterial {
    /// Returns true if this holds only public material.
    #[must_use]
    pub fn is_public(&self) -> bool {
        matches!(self, Self::Ed25519Public(_) | Self::P256Public(_))
    }

    /// Returns the Ed25519 public key if this is one.
    #[must_use]
    pub fn as_ed25519_public(&self) -> Option<&VerifyingKey> {
        match self {
            Self::Ed25519Public(key) => Some(key),
            _ => None,
        }
    }

    /// Returns the Ed25519 private key if this is one.
    #[must_use]
    pub fn as_ed25519_private(&self) -> Option<&SigningKey> {
        match self {
            Self::Ed25519Private(key) => Some(key),
            _ => None,
        }
    }

    /// Returns the P-256 public key if this is one.
    #[must_use]
    pub fn as_p256_public(&self) -> Option<&p256::PublicKey> {
        match self {
            Self::P256Public(key) => Some(key),
            _ => None,
        }
    }

    /// Returns the P-256 private key if this is one.
    #[must_use]
    pub fn as_p256_private(&self) -> Option<&p256::SecretKey> {
        match self {
            Self::P256Private(key) => Some(key),
            _ => None,
        }
    }

    /// Returns the public half of this key.
    #[must_use]
    pub fn to_public(&self) -> Self {
        match self {
            Self::Ed25519Private(key) => Self::Ed25519Public(key.verifying_key()),
            Self::P256Private(key) => Self::P256Public(key.public_key()),
            public => public.clone(),
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Self::Ed25519Public(_) => "Ed25519 public key",
            Self::Ed25519Private(_) => "Ed25519 private key",
            Self::P256Public(_) => "P-256 public key",
            Self::P256Private(_) => "P-256 private key",
        }
    }
}

impl fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ed25519Public(key) => f
                .debug_tuple("Ed25519Public")
                .field(&URL_SAFE_NO_PAD.encode(key.as_bytes()))
                .finish(),
            Self::P256Public(key) => f
                .debug_tuple("P256Public")
                .field(&URL_SAFE_NO_PAD.encode(key.to_encoded_point(true).as_bytes()))
                .finish(),
            Self::Ed25519Private(_) => f
                .debug_tuple("Ed25519Private")
                .field(&"[REDACTED]")
                .finish(),
            Self::P256Private(_) => f.debug_tuple("P256Private").field(&"[REDACTED]").finish(),
        }
    }
}

/// A single JSON Web Key with its metadata.
///
/// `alg` and `use` are kept as free-form strings so that a key set carrying
/// wrong tags still parses; lookups reject such entries with a typed error.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RawJwk", into = "RawJwk")]
pub struct Jwk {
    /// Key identifier (`kid`); empty when the document omits it.
    pub kid: String,
    /// Algorithm tag (`alg`).
    pub alg: String,
    /// Intended use (`use`).
    pub key_use: String,
    /// The key material.
    pub key: KeyMaterial,
}

impl Jwk {
    /// Builds a signing key entry (`alg = EdDSA`, `use = sig`).
    #[must_use]
    pub fn signing(kid: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            kid: kid.into(),
            alg: ALG_EDDSA.to_string(),
            key_use: USE_SIG.to_string(),
            key,
        }
    }

    /// Builds an encryption key entry (`alg = ECDH-ES+A128KW`, `use = enc`).
    #[must_use]
    pub fn encryption(kid: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            kid: kid.into(),
            alg: ALG_ECDH_ES_A128KW.to_string(),
            key_use: USE_ENC.to_string(),
            key,
        }
    }

    /// Returns true if this entry holds only public material.
    #[must_use]
    pub fn is_public(&self) -> bool {
        self.key.is_public()
    }

    /// Returns a copy of this entry with private material stripped.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            kid: self.kid.clone(),
            alg: self.alg.clone(),
            key_use: self.key_use.clone(),
            key: self.key.to_public(),
        }
    }

    /// Checks that the entry has an id and tags consistent with its material.
    pub fn validate(&self) -> JoseResult<()> {
        if self.kid.is_empty() {
            return Err(JoseError::MissingKeyId);
        }
        let (alg, key_use) = match self.key {
            KeyMaterial::Ed25519Public(_) | KeyMaterial::Ed25519Private(_) => (ALG_EDDSA, USE_SIG),
            KeyMaterial::P256Public(_) | KeyMaterial::P256Private(_) => {
                (ALG_ECDH_ES_A128KW, USE_ENC)
            }
        };
        self.expect_tags(alg, key_use)
    }

    /// Fails unless `alg` and `use` match the expected values.
    pub(crate) fn expect_tags(&self, alg: &'static str, key_use: &'static str) -> JoseResult<()> {
        if self.alg != alg {
            return Err(JoseError::WrongAlgorithm {
                kid: self.kid.clone(),
                expected: alg,
                found: self.alg.clone(),
            });
        }
        if self.key_use != key_use {
            return Err(JoseError::WrongUse {
                kid: self.kid.clone(),
                expected: key_use,
                found: self.key_use.clone(),
            });
        }
        Ok(())
    }

    pub(crate) fn wrong_type(&self, expected: &'static str) -> JoseError {
        tracing::debug!(kid = %self.kid, found = self.key.describe(), "key type mismatch");
        JoseError::WrongKeyType {
            kid: self.kid.clone(),
            expected,
        }
    }
}

/// Wire form of a JWK; every field optional so validation can report what
/// is missing.
#[derive(Debug, Default, Serialize, Deserialize)]
struct RawJwk {
    kty: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    crv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alg: Option<String>,
    #[serde(default, rename = "use", skip_serializing_if = "Option::is_none")]
    key_use: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    x: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    y: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    d: Option<String>,
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

impl From<Jwk> for RawJwk {
    fn from(jwk: Jwk) -> Self {
        let mut raw = RawJwk {
            kid: non_empty(jwk.kid),
            alg: non_empty(jwk.alg),
            key_use: non_empty(jwk.key_use),
            ..RawJwk::default()
        };
        match &jwk.key {
            KeyMaterial::Ed25519Public(key) => {
                raw.kty = KTY_OKP.to_string();
                raw.crv = Some(CRV_ED25519.to_string());
                raw.x = Some(URL_SAFE_NO_PAD.encode(key.as_bytes()));
            }
            KeyMaterial::Ed25519Private(key) => {
                raw.kty = KTY_OKP.to_string();
                raw.crv = Some(CRV_ED25519.to_string());
                raw.x = Some(URL_SAFE_NO_PAD.encode(key.verifying_key().as_bytes()));
                raw.d = Some(URL_SAFE_NO_PAD.encode(key.to_bytes()));
            }
            KeyMaterial::P256Public(key) => {
                raw.kty = KTY_EC.to_string();
                raw.crv = Some(CRV_P256.to_string());
                let point = key.to_encoded_point(false);
                raw.x = point.x().map(|x| URL_SAFE_NO_PAD.encode(x));
                raw.y = point.y().map(|y| URL_SAFE_NO_PAD.encode(y));
            }
            KeyMaterial::P256Private(key) => {
                raw.kty = KTY_EC.to_string();
                raw.crv = Some(CRV_P256.to_string());
                let point = key.public_key().to_encoded_point(false);
                raw.x = point.x().map(|x| URL_SAFE_NO_PAD.encode(x));
                raw.y = point.y().map(|y| URL_SAFE_NO_PAD.encode(y));
                raw.d = Some(URL_SAFE_NO_PAD.encode(key.to_bytes()));
            }
        }
        raw
    }
}

impl TryFrom<RawJwk> for Jwk {
    type Error = JoseError;

    fn try_from(raw: RawJwk) -> Result<Self, Self::Error> {
        let key = match (raw.kty.as_str(), raw.crv.as_deref()) {
            (KTY_OKP, Some(CRV_ED25519)) => parse_ed25519(&raw)?,
            (KTY_EC, Some(CRV_P256)) => parse_p256(&raw)?,
            (kty, crv) => {
                return Err(JoseError::UnsupportedAlgorithm(format!(
                    "key type {kty}/{}",
                    crv.unwrap_or("-")
                )));
            }
        };
        Ok(Self {
            kid: raw.kid.unwrap_or_default(),
            alg: raw.alg.unwrap_or_default(),
            key_use: raw.key_use.unwrap_or_default(),
            key,
        })
    }
}

fn decode_field<const N: usize>(name: &str, value: Option<&str>) -> JoseResult<[u8; N]> {
    let value = value.ok_or_else(|| JoseError::MalformedKey(format!("missing {name}")))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(value)
        .map_err(|e| JoseError::MalformedKey(format!("invalid {name} base64: {e}")))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| JoseError::MalformedKey(format!("{name} must be {N} bytes, got {len}")))
}

fn parse_ed25519(raw: &RawJwk) -> JoseResult<KeyMaterial> {
    let x: [u8; 32] = decode_field("x", raw.x.as_deref())?;
    let public = VerifyingKey::from_bytes(&x)
        .map_err(|_| JoseError::MalformedKey("invalid Ed25519 public key".to_string()))?;

    match raw.d.as_deref() {
        None => Ok(KeyMaterial::Ed25519Public(public)),
        Some(d) => {
            let seed: [u8; 32] = decode_field("d", Some(d))?;
            let private = SigningKey::from_bytes(&seed);
            if private.verifying_key() != public {
                return Err(JoseError::MalformedKey(
                    "Ed25519 private key does not match x".to_string(),
                ));
            }
            Ok(KeyMaterial::Ed25519Private(private))
        }
    }
}

fn parse_p256(raw: &RawJwk) -> JoseResult<KeyMaterial> {
    let public = p256_from_coordinates(raw.x.as_deref(), raw.y.as_deref())?;

    match raw.d.as_deref() {
        None => Ok(KeyMaterial::P256Public(public)),
        Some(d) => {
            let scalar: [u8; 32] = decode_field("d", Some(d))?;
            let private = p256::SecretKey::from_slice(&scalar)
                .map_err(|_| JoseError::MalformedKey("invalid P-256 private scalar".to_string()))?;
            if private.public_key() != public {
                return Err(JoseError::MalformedKey(
                    "P-256 private key does not match x/y".to_string(),
                ));
            }
            Ok(KeyMaterial::P256Private(private))
        }
    }
}

/// Decodes base64url affine coordinates into a P-256 point.
pub(crate) fn p256_from_coordinates(
    x: Option<&str>,
    y: Option<&str>,
) -> JoseResult<p256::PublicKey> {
    let x: [u8; 32] = decode_field("x", x)?;
    let y: [u8; 32] = decode_field("y", y)?;
    let point = p256::EncodedPoint::from_affine_coordinates(&x.into(), &y.into(), false);
    Option::<p256::PublicKey>::from(p256::PublicKey::from_encoded_point(&point))
        .ok_or_else(|| JoseError::MalformedKey("P-256 point is not on the curve".to_string()))
}

/// Encodes a P-256 point as base64url affine coordinates.
pub(crate) fn p256_coordinates(key: &p256::PublicKey) -> JoseResult<(String, String)> {
    let point = key.to_encoded_point(false);
    match (point.x(), point.y()) {
        (Some(x), Some(y)) => Ok((URL_SAFE_NO_PAD.encode(x), URL_SAFE_NO_PAD.encode(y))),
        _ => Err(JoseError::MalformedKey("P-256 point at infinity".to_string())),
    }
}
