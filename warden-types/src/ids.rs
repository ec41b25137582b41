//! Claim identifiers.
//!
//! Every license, attestation, signing key and revocation entry is keyed by a
//! UUID version 6. The version is checked once when a [`ClaimId`] is built, so
//! holders never need to re-validate it.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Required UUID version for claim identifiers.
const CLAIM_ID_VERSION: usize = 6;

/// Errors produced while parsing a [`ClaimId`].
#[derive(Debug, Error)]
pub enum IdError {
    /// The input string was empty.
    #[error("claim id is empty")]
    Empty,

    /// The input is not a UUID at all.
    #[error("invalid UUID: {0}")]
    Invalid(#[from] uuid::Error),

    /// The input is a UUID of the wrong version.
    #[error("expected UUID version 6, got version {0}")]
    WrongVersion(usize),
}

/// A UUID v6 identifier for an issued claim or key.
///
/// Ordering follows the embedded timestamp, so sorted ids are sorted by
/// creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ClaimId(Uuid);

impl ClaimId {
    /// Creates a new identifier from the current time and a random node id.
    #[must_use]
    pub fn new() -> Self {
        let node: [u8; 6] = rand::random();
        Self(Uuid::now_v6(&node))
    }

    /// Wraps an existing UUID, rejecting any version other than 6.
    pub fn from_uuid(uuid: Uuid) -> Result<Self, IdError> {
        match uuid.get_version_num() {
            CLAIM_ID_VERSION => Ok(Self(uuid)),
            other => Err(IdError::WrongVersion(other)),
        }
    }

    /// Parses an identifier from its hyphenated string form.
    pub fn parse(s: &str) -> Result<Self, IdError> {
        if s.is_empty() {
            return Err(IdError::Empty);
        }
        Self::from_uuid(Uuid::parse_str(s)?)
    }

    /// Returns the underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for ClaimId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for ClaimId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for ClaimId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ClaimId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
