//! P-256 ECDH encryption key sets.

use std::path::Path;

use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use tracing::debug;
use warden_types::ClaimId;
use warden_types::persist::{self, FileMode};

use crate::error::{JoseError, JoseResult};
use crate::jwk::{ALG_ECDH_ES_A128KW, Jwk, KeyMaterial, USE_ENC};

/// A flat list of encryption keys. Unlike [`SigningKeySet`] there is no
/// issuer, no cardinality limit and no merge on write.
///
/// [`SigningKeySet`]: crate::SigningKeySet
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EncryptionKeySet {
    #[serde(default)]
    keys: Vec<Jwk>,
}

impl EncryptionKeySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Generates a P-256 pair under a new UUID v6 key id and returns the
    /// `(public, private)` sets.
    #[must_use]
    pub fn generate() -> (Self, Self) {
        let kid = ClaimId::new().to_string();
        let secret = p256::SecretKey::random(&mut OsRng);
        let public = Jwk::encryption(kid.clone(), KeyMaterial::P256Public(secret.public_key()));
        let private = Jwk::encryption(kid.clone(), KeyMaterial::P256Private(secret));
        debug!(%kid, "generated encryption key pair");
        (Self { keys: vec![public] }, Self { keys: vec![private] })
    }

    /// Appends a key entry.
    pub fn push(&mut self, jwk: Jwk) {
        self.keys.push(jwk);
    }

    /// Returns the keys in document order.
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

    /// Returns true if any entry holds private material.
    #[must_use]
    pub fn has_private(&self) -> bool {
        self.keys.iter().any(|k| !k.is_public())
    }

    /// Returns the public half of every key.
    #[must_use]
    pub fn to_public(&self) -> Self {
        Self {
            keys: self.keys.iter().map(Jwk::to_public).collect(),
        }
    }

    /// Selects the public key used for encryption.
    ///
    /// An empty `kid` picks the first public `enc` key; that entry must
    /// carry an id, since the id travels in the token header.
    pub(crate) fn find_public(&self, kid: &str) -> JoseResult<&Jwk> {
        let is_candidate =
            |k: &&Jwk| k.key_use == USE_ENC && k.alg == ALG_ECDH_ES_A128KW && k.is_public();

        if kid.is_empty() {
            let jwk = self
                .keys
                .iter()
                .find(is_candidate)
                .ok_or_else(|| JoseError::KeyNotFound("<any>".to_string()))?;
            if jwk.kid.is_empty() {
                return Err(JoseError::MissingKeyId);
            }
            return Ok(jwk);
        }

        self.keys
            .iter()
            .filter(is_candidate)
            .find(|k| k.kid == kid)
            .ok_or_else(|| JoseError::KeyNotFound(kid.to_string()))
    }

    /// Selects the private key matching a token's `kid`.
    pub(crate) fn find_private(&self, kid: &str) -> JoseResult<&Jwk> {
        self.keys
            .iter()
            .find(|k| {
                k.kid == kid
                    && k.key_use == USE_ENC
                    && k.alg == ALG_ECDH_ES_A128KW
                    && !k.is_public()
            })
            .ok_or_else(|| JoseError::KeyNotFound(kid.to_string()))
    }

    /// Parses a key set document.
    pub fn from_json(bytes: &[u8]) -> JoseResult<Self> {
        Ok(serde_json::from_slice(bytes)?)
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

    /// Writes the set, replacing any existing file. Sets holding private
    /// material are written `0600`, others `0644`.
    pub fn write(&self, path: &Path) -> JoseResult<()> {
        let mode = if self.has_private() {
            FileMode::Secret
        } else {
            FileMode::Public
        };
        persist::overwrite(path, &self.to_json()?, mode)?;
        debug!(path = %path.display(), keys = self.keys.len(), "wrote encryption key set");
        Ok(())
    }
}
