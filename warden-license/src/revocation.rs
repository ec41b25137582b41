//! Revocation ledger.
//!
//! A ledger maps revoked claim ids to the unix time they were revoked. It is
//! not secret: files are written `0644` so verifiers can fetch them. Writes
//! merge with an existing file of the same issuer.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use warden_types::ClaimId;
use warden_types::persist::{self, FileMode};

use crate::claims;
use crate::error::{ClaimError, ClaimResult, Subsystem};
use crate::license::License;

/// A per-issuer denylist of claim ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RevocationList {
    #[serde(default)]
    issuer: String,
    #[serde(default)]
    keys: BTreeMap<ClaimId, i64>,
}

impl RevocationList {
    /// Creates an empty ledger for `issuer`.
    #[must_use]
    pub fn new(issuer: impl Into<String>) -> Self {
        Self {
            issuer: issuer.into(),
            keys: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Revokes `id` as of now. Re-adding an id refreshes its timestamp.
    ///
    /// Fails, leaving the ledger unchanged, unless `id` is a UUID v6.
    pub fn add(&mut self, id: &str) -> ClaimResult<ClaimId> {
        let id = ClaimId::parse(id).map_err(|e| ClaimError::from(e).wrap(Subsystem::Revocation))?;
        self.keys.insert(id, claims::now());
        debug!(%id, issuer = %self.issuer, "revoked claim");
        Ok(id)
    }

    /// Returns whether `license` is revoked and, if so, when (RFC 3339).
    #[must_use]
    pub fn is_revoked(&self, license: Option<&License>) -> (bool, String) {
        let Some(at) = license.and_then(|l| self.keys.get(l.id())) else {
            return (false, String::new());
        };
        let formatted = DateTime::from_timestamp(*at, 0)
            .map(|t| t.to_rfc3339_opts(SecondsFormat::Secs, true))
            .unwrap_or_else(|| at.to_string());
        (true, formatted)
    }

    /// Returns the revocation time of `id`.
    #[must_use]
    pub fn revoked_at(&self, id: &ClaimId) -> Option<DateTime<Utc>> {
        self.keys
            .get(id)
            .and_then(|at| DateTime::from_timestamp(*at, 0))
    }

    #[must_use]
    pub fn contains(&self, id: &ClaimId) -> bool {
        self.keys.contains_key(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Parses a ledger, requiring a non-empty issuer.
    pub fn from_json(bytes: &[u8]) -> ClaimResult<Self> {
        let parse = || -> ClaimResult<Self> {
            let list: Self = serde_json::from_slice(bytes)?;
            claims::require("issuer", &list.issuer)?;
            Ok(list)
        };
        parse().map_err(|e| e.wrap(Subsystem::Revocation))
    }

    /// Serializes the ledger as pretty-printed JSON.
    pub fn to_json(&self) -> ClaimResult<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Reads and parses a ledger file.
    pub fn read(path: &Path) -> ClaimResult<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_json(&bytes)
    }

    /// Writes the ledger, merging with an existing file of the same issuer.
    /// Entries of this ledger win on collision.
    pub fn write(&self, path: &Path) -> ClaimResult<()> {
        claims::require("issuer", &self.issuer).map_err(|e| e.wrap(Subsystem::Revocation))?;

        let merged = if path.exists() {
            let mut existing = Self::read(path)?;
            if existing.issuer != self.issuer {
                warn!(
                    path = %path.display(),
                    expected = %self.issuer,
                    found = %existing.issuer,
                    "refusing to merge revocation lists of different issuers"
                );
                return Err(ClaimError::IssuerMismatch {
                    expected: self.issuer.clone(),
                    found: existing.issuer,
                });
            }
            existing
                .keys
                .extend(self.keys.iter().map(|(id, at)| (*id, *at)));
            info!(path = %path.display(), keys = existing.keys.len(), "merged revocation list");
            existing
        } else {
            info!(path = %path.display(), keys = self.keys.len(), "wrote revocation list");
            self.clone()
        };

        persist::overwrite(path, &merged.to_json()?, FileMode::Public)?;
        Ok(())
    }
}
