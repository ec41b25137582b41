//! License keys.
//!
//! A license is a signed claim set naming who may run the software, for
//! which audiences, with which capabilities and until when. The subject is
//! stored anonymized so tokens can be shared without leaking customer names.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use warden_jose::{PrivateSigningKey, jwt};
use warden_types::ClaimId;

use crate::claims::{self, audience};
use crate::error::{ClaimError, ClaimResult, Subsystem};

/// Prefix of anonymized subjects.
const SUBJECT_PREFIX: &str = "c-";
/// Number of hex characters of the subject digest that are kept.
const SUBJECT_HEX_LEN: usize = 16;

/// The claim set carried by a license token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LicenseClaims {
    #[serde(rename = "jti")]
    pub id: ClaimId,
    #[serde(rename = "iss", default)]
    pub issuer: String,
    #[serde(rename = "sub", default)]
    pub subject: String,
    #[serde(rename = "aud", default, with = "audience")]
    pub audience: Vec<String>,
    #[serde(rename = "iat", default)]
    pub issued_at: i64,
    #[serde(rename = "exp", default)]
    pub expires_at: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub capabilities: Vec<String>,
}

impl LicenseClaims {
    /// Checks that every mandatory claim is present and issued-at is not
    /// in the future. A past expiry is accepted; see [`License::is_expired`].
    pub fn validate(&self) -> ClaimResult<()> {
        self.validate_at(claims::now())
    }

    fn validate_at(&self, now: i64) -> ClaimResult<()> {
        claims::require("issuer", &self.issuer)?;
        claims::require("subject", &self.subject)?;
        claims::require_audience(&self.audience)?;
        claims::check_issued_at(self.issued_at, now)?;
        if self.expires_at == 0 {
            return Err(ClaimError::MissingExpiry);
        }
        Ok(())
    }
}

/// A validated license.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct License {
    claims: LicenseClaims,
}

impl License {
    /// Issues a new license valid for `validity` from now.
    ///
    /// The subject is anonymized with [`anonymize_subject`]. A zero or
    /// negative `validity` yields a license that is already expired.
    pub fn new(
        issuer: impl Into<String>,
        subject: &str,
        audience: Vec<String>,
        validity: Duration,
        capabilities: Vec<String>,
    ) -> ClaimResult<Self> {
        let issued_at = claims::now();
        Self::from_claims(LicenseClaims {
            id: ClaimId::new(),
            issuer: issuer.into(),
            subject: anonymize_subject(subject),
            audience,
            issued_at,
            expires_at: issued_at.saturating_add(validity.num_seconds()),
            capabilities,
        })
    }

    /// Wraps an already populated claim set after validating it.
    pub fn from_claims(claims: LicenseClaims) -> ClaimResult<Self> {
        claims
            .validate()
            .map_err(|e| e.wrap(Subsystem::License))?;
        Ok(Self { claims })
    }

    /// Re-runs claim validation.
    pub fn validate(&self) -> ClaimResult<()> {
        self.claims
            .validate()
            .map_err(|e| e.wrap(Subsystem::License))
    }

    /// Returns true iff `now - leeway` is past the expiry.
    #[must_use]
    pub fn is_expired(&self, leeway: Duration) -> bool {
        claims::now() - leeway.num_seconds() > self.claims.expires_at
    }

    /// Case-insensitive audience membership.
    #[must_use]
    pub fn has_audience(&self, value: &str) -> bool {
        claims::contains_ignore_case(&self.claims.audience, value)
    }

    /// Case-insensitive capability membership.
    #[must_use]
    pub fn has_capability(&self, value: &str) -> bool {
        claims::contains_ignore_case(&self.claims.capabilities, value)
    }

    /// Signs the claims as a compact token.
    pub fn sign(&self, key: &PrivateSigningKey) -> ClaimResult<String> {
        let payload = serde_json::to_vec(&self.claims)?;
        let token = jwt::sign(&payload, key)?;
        debug!(id = %self.claims.id, kid = key.id(), "signed license");
        Ok(token)
    }

    /// Verifies `token` against `public_key_set` and validates its claims.
    ///
    /// Every failure is tagged [`Subsystem::License`].
    pub fn from_token(token: &str, public_key_set: &[u8]) -> ClaimResult<Self> {
        let verified = || -> ClaimResult<Self> {
            let payload = jwt::verify(token, public_key_set)?;
            let claims: LicenseClaims = serde_json::from_slice(&payload)?;
            claims.validate()?;
            Ok(Self { claims })
        };
        let license = verified().map_err(|e| e.wrap(Subsystem::License))?;
        debug!(id = %license.claims.id, "verified license");
        Ok(license)
    }

    #[must_use]
    pub fn id(&self) -> &ClaimId {
        &self.claims.id
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.claims.issuer
    }

    #[must_use]
    pub fn subject(&self) -> &str {
        &self.claims.subject
    }

    #[must_use]
    pub fn audience(&self) -> &[String] {
        &self.claims.audience
    }

    #[must_use]
    pub fn capabilities(&self) -> &[String] {
        &self.claims.capabilities
    }

    /// Issued-at as a timestamp.
    #[must_use]
    pub fn issued_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.claims.issued_at, 0)
    }

    /// Expiry as a timestamp.
    #[must_use]
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.claims.expires_at, 0)
    }

    /// Returns the raw claim set.
    #[must_use]
    pub fn claims(&self) -> &LicenseClaims {
        &self.claims
    }
}

/// Maps a human-readable subject to `c-` followed by the first 16 hex
/// characters of its SHA-256 digest.
#[must_use]
pub fn anonymize_subject(subject: &str) -> String {
    let digest = hex::encode(Sha256::digest(subject.as_bytes()));
    format!("{SUBJECT_PREFIX}{}", &digest[..SUBJECT_HEX_LEN])
}
