//! Artifact and manifest attestations.
//!
//! Both variants share the [`Attestation`] claim set and differ only in how
//! `digests` is filled: artifacts carry a caller-supplied digest list,
//! manifests carry a single [`hash_directory`] checksum that the verifier
//! recomputes. An attestation instance can be signed once; signing it again
//! fails with [`ClaimError::AlreadySigned`].

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use warden_jose::{PrivateSigningKey, jwt};
use warden_types::ClaimId;

use crate::claims::{self, CLOCK_SKEW_SECS, audience};
use crate::dirhash::hash_directory;
use crate::error::{ClaimError, ClaimResult, Subsystem};

/// Subject of artifact attestations.
pub const SUBJECT_ARTIFACTS: &str = "artifacts";
/// Subject of manifest attestations.
pub const SUBJECT_MANIFESTS: &str = "manifests";

/// Manifest attestations effectively never expire.
const MANIFEST_VALIDITY_SECS: i64 = 999 * 365 * 24 * 60 * 60;

/// The claim set carried by an attestation token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attestation {
    #[serde(rename = "jti", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ClaimId>,
    #[serde(rename = "iss", default)]
    pub issuer: String,
    #[serde(rename = "sub", default)]
    pub subject: String,
    #[serde(rename = "aud", default, with = "audience")]
    pub audience: Vec<String>,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "nbf", default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<i64>,
    #[serde(rename = "exp", default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(default)]
    pub digests: Vec<String>,
}

impl Attestation {
    fn shell(subject: &str, audience: String) -> Self {
        Self {
            subject: subject.to_string(),
            audience: vec![audience],
            ..Self::default()
        }
    }

    /// Validates the claim set against an expected subject and, if given,
    /// an audience the attestation must name.
    ///
    /// Failures are tagged [`Subsystem::Attestation`].
    pub fn validate(
        &self,
        expected_audience: Option<&str>,
        expected_subject: &str,
    ) -> ClaimResult<()> {
        self.validate_at(claims::now(), expected_audience, expected_subject)
            .map_err(|e| e.wrap(Subsystem::Attestation))
    }

    fn validate_at(
        &self,
        now: i64,
        expected_audience: Option<&str>,
        expected_subject: &str,
    ) -> ClaimResult<()> {
        if self.id.is_none() {
            return Err(ClaimError::EmptyField("id"));
        }
        claims::require("issuer", &self.issuer)?;
        claims::require_audience(&self.audience)?;
        if let Some(expected) = expected_audience.filter(|a| !a.is_empty()) {
            if !self.audience.iter().any(|a| a == expected) {
                return Err(ClaimError::AudienceMismatch(expected.to_string()));
            }
        }
        claims::require("subject", &self.subject)?;
        if self.subject != expected_subject {
            return Err(ClaimError::SubjectMismatch {
                expected: expected_subject.to_string(),
                found: self.subject.clone(),
            });
        }
        claims::check_issued_at(self.issued_at, now)?;
        if let Some(exp) = self.expires_at {
            if exp < now - CLOCK_SKEW_SECS {
                return Err(ClaimError::Expired(exp));
            }
        }
        if self.digests.is_empty() {
            return Err(ClaimError::NoDigests);
        }
        Ok(())
    }

    fn sign(&self, key: &PrivateSigningKey) -> ClaimResult<String> {
        let payload = serde_json::to_vec(self)?;
        Ok(jwt::sign(&payload, key)?)
    }

    fn from_verified(
        bytes: &[u8],
        expected_audience: Option<&str>,
        subject: &str,
    ) -> ClaimResult<Self> {
        let claims: Self = serde_json::from_slice(bytes)
            .map_err(|e| ClaimError::from(e).wrap(Subsystem::Attestation))?;
        claims.validate(expected_audience, subject)?;
        Ok(claims)
    }
}

/// Attestation over an explicit list of artifact digests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactsAttestation {
    claims: Attestation,
}

impl ArtifactsAttestation {
    /// Creates an unsigned attestation addressed to `audience`.
    #[must_use]
    pub fn for_audience(audience: impl Into<String>) -> Self {
        Self {
            claims: Attestation::shell(SUBJECT_ARTIFACTS, audience.into()),
        }
    }

    /// Fills in id, issuer, issued-at and `digests`, then signs.
    ///
    /// The instance is only updated if signing succeeds.
    pub fn sign(&mut self, key: &PrivateSigningKey, digests: Vec<String>) -> ClaimResult<String> {
        if !self.claims.digests.is_empty() {
            return Err(ClaimError::AlreadySigned.wrap(Subsystem::Attestation));
        }

        let claims = Attestation {
            id: Some(ClaimId::new()),
            issuer: key.issuer().to_string(),
            issued_at: claims::now(),
            digests,
            ..self.claims.clone()
        };
        claims.validate(None, SUBJECT_ARTIFACTS)?;
        let token = claims
            .sign(key)
            .map_err(|e| e.wrap(Subsystem::Attestation))?;

        debug!(digests = claims.digests.len(), kid = key.id(), "signed artifacts attestation");
        self.claims = claims;
        Ok(token)
    }

    /// Parses and validates claim bytes that were already authenticated by
    /// [`jwt::verify`]. The audience is not checked.
    pub fn from_verified(bytes: &[u8]) -> ClaimResult<Self> {
        let claims = Attestation::from_verified(bytes, None, SUBJECT_ARTIFACTS)?;
        Ok(Self { claims })
    }

    /// Verifies `token` against `public_key_set` and validates its claims.
    pub fn from_token(token: &str, public_key_set: &[u8]) -> ClaimResult<Self> {
        let payload = jwt::verify(token, public_key_set)
            .map_err(|e| ClaimError::from(e).wrap(Subsystem::Attestation))?;
        Self::from_verified(&payload)
    }

    /// Exact digest membership.
    #[must_use]
    pub fn has_digest(&self, value: &str) -> bool {
        self.claims.digests.iter().any(|d| d == value)
    }

    #[must_use]
    pub fn digests(&self) -> &[String] {
        &self.claims.digests
    }

    #[must_use]
    pub fn claims(&self) -> &Attestation {
        &self.claims
    }
}

/// Attestation over a directory tree, carried as one checksum.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestsAttestation {
    claims: Attestation,
}

impl ManifestsAttestation {
    /// Creates an unsigned attestation addressed to `audience`.
    #[must_use]
    pub fn for_audience(audience: impl Into<String>) -> Self {
        Self {
            claims: Attestation::shell(SUBJECT_MANIFESTS, audience.into()),
        }
    }

    /// Hashes `directory`, signs the checksum and returns the token together
    /// with the covered relative paths.
    pub fn sign(
        &mut self,
        key: &PrivateSigningKey,
        directory: &Path,
        ignore_patterns: &[String],
    ) -> ClaimResult<(String, Vec<String>)> {
        if !self.claims.digests.is_empty() {
            return Err(ClaimError::AlreadySigned.wrap(Subsystem::Attestation));
        }

        let hash = hash_directory(directory, ignore_patterns)
            .map_err(|e| e.wrap(Subsystem::Attestation))?;
        let issued_at = claims::now();
        let claims = Attestation {
            id: Some(ClaimId::new()),
            issuer: key.issuer().to_string(),
            issued_at,
            not_before: Some(issued_at),
            expires_at: Some(issued_at.saturating_add(MANIFEST_VALIDITY_SECS)),
            digests: vec![hash.checksum],
            ..self.claims.clone()
        };
        claims.validate(None, SUBJECT_MANIFESTS)?;
        let token = claims
            .sign(key)
            .map_err(|e| e.wrap(Subsystem::Attestation))?;

        debug!(
            directory = %directory.display(),
            files = hash.files.len(),
            kid = key.id(),
            "signed manifests attestation"
        );
        self.claims = claims;
        Ok((token, hash.files))
    }

    /// Verifies `token`, then recomputes the checksum of `directory` and
    /// compares it with the attested one. Returns the covered paths.
    ///
    /// If this instance names an audience, the token must include it.
    pub fn verify(
        &self,
        token: &str,
        public_key_set: &[u8],
        directory: &Path,
        ignore_patterns: &[String],
    ) -> ClaimResult<Vec<String>> {
        let payload = jwt::verify(token, public_key_set)
            .map_err(|e| ClaimError::from(e).wrap(Subsystem::Attestation))?;
        let expected_audience = self.claims.audience.first().map(String::as_str);
        let attested = Attestation::from_verified(&payload, expected_audience, SUBJECT_MANIFESTS)?;

        let hash = hash_directory(directory, ignore_patterns)
            .map_err(|e| e.wrap(Subsystem::Attestation))?;
        let expected = attested.digests.first().cloned().unwrap_or_default();
        if hash.checksum != expected {
            warn!(
                directory = %directory.display(),
                attested = %expected,
                computed = %hash.checksum,
                "manifest checksum mismatch"
            );
            return Err(ClaimError::ChecksumMismatch {
                expected,
                actual: hash.checksum,
            }
            .wrap(Subsystem::Attestation));
        }

        debug!(
            directory = %directory.display(),
            files = hash.files.len(),
            "verified manifests attestation"
        );
        Ok(hash.files)
    }

    /// Returns the attested checksum once signed.
    #[must_use]
    pub fn checksum(&self) -> Option<&str> {
        self.claims.digests.first().map(String::as_str)
    }

    #[must_use]
    pub fn claims(&self) -> &Attestation {
        &self.claims
    }
}
