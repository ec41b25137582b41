//! Ed25519 signing key sets.
//!
//! A key set is either *public* (no issuer, any number of verification keys
//! with unique ids, most recent first) or *private* (an issuer plus exactly
//! one signing key). Public set files are merged into on write so that
//! rotated keys stay verifiable; private set files are never overwritten.

use std::fmt;
use std::io;
use std::path::Path;

use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier as _, VerifyingKey};
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use warden_types::ClaimId;
use warden_types::persist::{self, FileMode};

use crate::error::{JoseError, JoseResult};
use crate::jwk::{ALG_EDDSA, Jwk, KeyMaterial, USE_SIG};

/// A set of Ed25519 keys in JWK form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SigningKeySet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    issuer: Option<String>,
    #[serde(default)]
    keys: Vec<Jwk>,
}

impl SigningKeySet {
    /// Creates an empty public key set.
    #[must_use]
    pub fn new_public() -> Self {
        Self::default()
    }

    /// Creates an empty private key set for `issuer`.
    #[must_use]
    pub fn new_private(issuer: impl Into<String>) -> Self {
        Self {
            issuer: Some(issuer.into()),
            keys: Vec::new(),
        }
    }

    /// Returns the issuer of a private set.
    #[must_use]
    pub fn issuer(&self) -> Option<&str> {
        self.issuer.as_deref().filter(|issuer| !issuer.is_empty())
    }

    /// Returns true if this is a private set (it carries an issuer).
    #[must_use]
    pub fn is_private(&self) -> bool {
        self.issuer().is_some()
    }

    /// Returns the keys, most recently added first.
    #[must_use]
    pub fn keys(&self) -> &[Jwk] {
        &self.keys
    }

    /// Returns the number of keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Returns true if the set holds no keys.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Prepends a verification key.
    ///
    /// Fails on a private set or if `id` is already present.
    pub fn add_public_key(&mut self, key: VerifyingKey, id: &str) -> JoseResult<()> {
        if self.is_private() {
            return Err(JoseError::PrivateSet);
        }
        if id.is_empty() {
            return Err(JoseError::MissingKeyId);
        }
        if self.keys.iter().any(|k| k.kid == id) {
            return Err(JoseError::DuplicateKeyId(id.to_string()));
        }
        self.keys
            .insert(0, Jwk::signing(id, KeyMaterial::Ed25519Public(key)));
        Ok(())
    }

    /// Stores the sole signing key of a private set.
    ///
    /// Fails if the set has no issuer or already holds a key.
    pub fn add_private_key(&mut self, key: SigningKey, id: &str) -> JoseResult<()> {
        if !self.is_private() {
            return Err(JoseError::MissingIssuer);
        }
        if !self.keys.is_empty() {
            return Err(JoseError::PrivateKeyPresent);
        }
        if id.is_empty() {
            return Err(JoseError::MissingKeyId);
        }
        self.keys
            .push(Jwk::signing(id, KeyMaterial::Ed25519Private(key)));
        Ok(())
    }

    /// Returns the public set matching this set's keys.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            issuer: None,
            keys: self.keys.iter().map(Jwk::to_public).collect(),
        }
    }

    /// Parses a key set, rejecting empty sets and private sets with more
    /// than one key.
    pub fn from_json(bytes: &[u8]) -> JoseResult<Self> {
        let set: Self = serde_json::from_slice(bytes)?;
        if set.keys.is_empty() {
            return Err(JoseError::EmptyKeySet);
        }
        if set.is_private() && set.keys.len() > 1 {
            return Err(JoseError::TooManyPrivateKeys(set.keys.len()));
        }
        set.check_material()?;
        Ok(set)
    }

    /// Public sets hold only public keys; private sets only private keys.
    fn check_material(&self) -> JoseResult<()> {
        let private = self.is_private();
        match self.keys.iter().find(|k| k.is_public() == private) {
            Some(jwk) => Err(JoseError::KeyMaterialMismatch {
                kid: jwk.kid.clone(),
                set: if private { "private" } else { "public" },
            }),
            None => Ok(()),
        }
    }

    /// Serializes the set as pretty-printed JSON.
    pub fn to_json(&self) -> JoseResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Reads and parses a key set file.
    pub fn read(path: &Path) -> JoseResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    /// Persists the set.
    ///
    /// Private sets are written `0600` and never replace an existing file.
    /// Public sets are written `0644`; if the file exists its keys are
    /// appended after this set's keys, and any id collision aborts the write
    /// without touching the file.
    pub fn write(&self, path: &Path) -> JoseResult<()> {
        if self.keys.is_empty() {
            return Err(JoseError::EmptyKeySet);
        }
        self.check_material()?;

        if self.is_private() {
            let bytes = self.to_json()?;
            return match persist::create_new(path, &bytes, FileMode::Secret) {
                Ok(()) => {
                    info!(path = %path.display(), "wrote private signing key set");
                    Ok(())
                }
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                    Err(JoseError::FileExists(path.to_path_buf()))
                }
                Err(e) => Err(e.into()),
            };
        }

        let merged = if path.exists() {
            let existing = Self::read(path)?;
            if existing.is_private() {
                return Err(JoseError::PrivateSet);
            }
            let merged = self.merged_with(existing)?;
            info!(
                path = %path.display(),
                keys = merged.keys.len(),
                "merged public signing key set"
            );
            merged
        } else {
            info!(path = %path.display(), "wrote public signing key set");
            self.clone()
        };

        persist::overwrite(path, &merged.to_json()?, FileMode::Public)?;
        Ok(())
    }

    fn merged_with(&self, existing: Self) -> JoseResult<Self> {
        let mut keys = self.keys.clone();
        for jwk in existing.keys {
            if keys.iter().any(|k| k.kid == jwk.kid) {
                return Err(JoseError::DuplicateKeyId(jwk.kid));
            }
            keys.push(jwk);
        }
        Ok(Self { issuer: None, keys })
    }

    /// Looks up a verification key by id in this set.
    pub fn public_key(&self, id: &str) -> JoseResult<PublicSigningKey> {
        let jwk = self
            .keys
            .iter()
            .find(|k| k.kid == id)
            .ok_or_else(|| JoseError::KeyNotFound(id.to_string()))?;
        jwk.expect_tags(ALG_EDDSA, USE_SIG)?;
        let key = jwk
            .key
            .as_ed25519_public()
            .ok_or_else(|| jwk.wrong_type("an Ed25519 public key"))?;
        Ok(PublicSigningKey {
            id: jwk.kid.clone(),
            key: *key,
        })
    }

    /// Returns the sole signing key of a private set.
    pub fn private_key(&self) -> JoseResult<PrivateSigningKey> {
        let issuer = self.issuer().ok_or(JoseError::MissingIssuer)?;
        let jwk = self.keys.first().ok_or(JoseError::EmptyKeySet)?;
        if jwk.kid.is_empty() {
            return Err(JoseError::MissingKeyId);
        }
        jwk.expect_tags(ALG_EDDSA, USE_SIG)?;
        let key = jwk
            .key
            .as_ed25519_private()
            .ok_or_else(|| jwk.wrong_type("an Ed25519 private key"))?;
        Ok(PrivateSigningKey {
            id: jwk.kid.clone(),
            issuer: issuer.to_string(),
            key: key.clone(),
        })
    }

    /// Parses `bytes` as a key set and looks up the verification key `id`.
    pub fn public_key_by_id(bytes: &[u8], id: &str) -> JoseResult<PublicSigningKey> {
        Self::from_json(bytes)?.public_key(id)
    }

    /// Parses `bytes` as a private key set and returns its signing key.
    pub fn private_key_by_id(bytes: &[u8]) -> JoseResult<PrivateSigningKey> {
        Self::from_json(bytes)?.private_key()
    }
}

/// Generates a fresh Ed25519 pair under a new UUID v6 key id and returns
/// the `(public, private)` key sets.
pub fn generate_signing_pair(issuer: &str) -> JoseResult<(SigningKeySet, SigningKeySet)> {
    if issuer.is_empty() {
        return Err(JoseError::MissingIssuer);
    }
    let kid = ClaimId::new().to_string();
    let signing_key = SigningKey::generate(&mut OsRng);

    let mut public = SigningKeySet::new_public();
    public.add_public_key(signing_key.verifying_key(), &kid)?;

    let mut private = SigningKeySet::new_private(issuer);
    private.add_private_key(signing_key, &kid)?;

    debug!(%kid, issuer, "generated signing key pair");
    Ok((public, private))
}

/// A verification key resolved from a public key set.
#[derive(Debug, Clone)]
pub struct PublicSigningKey {
    id: String,
    key: VerifyingKey,
}

impl PublicSigningKey {
    /// Returns the key id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the raw verifying key.
    #[must_use]
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.key
    }

    /// Verifies `signature` over `message`.
    pub fn verify(&self, message: &[u8], signature: &Signature) -> JoseResult<()> {
        self.key
            .verify(message, signature)
            .map_err(|_| JoseError::SignatureInvalid)
    }
}

/// The signing key of a private key set, together with its issuer.
#[derive(Clone)]
pub struct PrivateSigningKey {
    id: String,
    issuer: String,
    key: SigningKey,
}

impl PrivateSigningKey {
    /// Returns the key id placed in token headers.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the issuer that owns this key.
    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Signs `message`.
    #[must_use]
    pub fn sign(&self, message: &[u8]) -> Signature {
        self.key.sign(message)
    }

    /// Returns the matching public key.
    #[must_use]
    pub fn public_key(&self) -> PublicSigningKey {
        PublicSigningKey {
            id: self.id.clone(),
            key: self.key.verifying_key(),
        }
    }
}

impl fmt::Debug for PrivateSigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateSigningKey")
            .field("id", &self.id)
            .field("issuer", &self.issuer)
            .field("key", &"[REDACTED]")
            .finish()
    }
}
