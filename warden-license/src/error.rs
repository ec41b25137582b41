//! Error types for license, attestation and revocation claims.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;
use warden_jose::JoseError;
use warden_types::{ErrorKind, IdError};

/// Result type for claim operations.
pub type ClaimResult<T> = Result<T, ClaimError>;

/// Which claim type an [`ClaimError::Invalid`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Subsystem {
    License,
    Attestation,
    Revocation,
}

impl fmt::Display for Subsystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::License => "invalid license key",
            Self::Attestation => "invalid attestation",
            Self::Revocation => "invalid revocation list",
        })
    }
}

/// Errors raised while building, validating, signing or verifying claims.
#[derive(Debug, Error)]
pub enum ClaimError {
    /// A license or attestation operation failed; `cause` holds the reason.
    #[error("{subsystem}: {cause}")]
    Invalid {
        subsystem: Subsystem,
        #[source]
        cause: Box<ClaimError>,
    },

    /// A mandatory claim is empty.
    #[error("{0} is empty")]
    EmptyField(&'static str),

    /// A claim id is not a UUID v6.
    #[error("invalid claim id: {0}")]
    InvalidId(#[from] IdError),

    /// The issued-at time is not set.
    #[error("issued-at is not set")]
    MissingIssuedAt,

    /// The issued-at time lies beyond the allowed clock skew.
    #[error("issued-at {0} is in the future")]
    IssuedInFuture(i64),

    /// The expiry time is not set.
    #[error("expiry is not set")]
    MissingExpiry,

    /// The expiry time lies in the past.
    #[error("expired at {0}")]
    Expired(i64),

    /// The subject differs from the expected one.
    #[error("subject mismatch: expected {expected:?}, found {found:?}")]
    SubjectMismatch { expected: String, found: String },

    /// The audience does not contain the expected value.
    #[error("audience does not include {0:?}")]
    AudienceMismatch(String),

    /// An attestation carries no digests.
    #[error("no digests")]
    NoDigests,

    /// An attestation instance was signed a second time.
    #[error("attestation is already signed")]
    AlreadySigned,

    /// The recomputed directory hash differs from the attested one.
    #[error("checksum mismatch: attested {expected}, computed {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// The manifest root is not a directory.
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),

    /// A path under the manifest root cannot be represented in the summary.
    #[error("unsupported path: {0}")]
    InvalidPath(String),

    /// A ledger file belongs to a different issuer.
    #[error("issuer mismatch: expected {expected:?}, found {found:?}")]
    IssuerMismatch { expected: String, found: String },

    /// Key lookup, signing or verification failed.
    #[error(transparent)]
    Jose(#[from] JoseError),

    /// Claim JSON could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading a file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

impl ClaimError {
    /// Tags this error with `subsystem`, unless it is already tagged.
    #[must_use]
    pub fn wrap(self, subsystem: Subsystem) -> Self {
        match self {
            tagged @ Self::Invalid { .. } => tagged,
            cause => Self::Invalid {
                subsystem,
                cause: Box::new(cause),
            },
        }
    }

    /// Returns the subsystem tag, if any.
    #[must_use]
    pub fn subsystem(&self) -> Option<Subsystem> {
        match self {
            Self::Invalid { subsystem, .. } => Some(*subsystem),
            _ => None,
        }
    }

    /// Returns the innermost untagged error.
    #[must_use]
    pub fn root(&self) -> &Self {
        match self {
            Self::Invalid { cause, .. } => cause.root(),
            other => other,
        }
    }

    /// Returns the coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Invalid { cause, .. } => cause.kind(),
            Self::EmptyField(_)
            | Self::InvalidId(_)
            | Self::MissingIssuedAt
            | Self::IssuedInFuture(_)
            | Self::MissingExpiry
            | Self::Expired(_)
            | Self::SubjectMismatch { .. }
            | Self::AudienceMismatch(_)
            | Self::NoDigests => ErrorKind::ClaimViolation,
            Self::AlreadySigned => ErrorKind::Immutable,
            Self::ChecksumMismatch { .. } => ErrorKind::Integrity,
            Self::NotADirectory(_) | Self::Io(_) => ErrorKind::Io,
            Self::InvalidPath(_) | Self::Serialization(_) => ErrorKind::Malformed,
            Self::IssuerMismatch { .. } => ErrorKind::Persistence,
            Self::Jose(e) => e.kind(),
        }
    }
}
