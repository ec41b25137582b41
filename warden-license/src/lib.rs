//! Licenses, attestations and revocation for Warden.
//!
//! This crate handles:
//! - License keys: who may run the software, for which audiences and
//!   capabilities, until when
//! - Artifact attestations over a list of image or file digests
//! - Manifest attestations over a whole directory tree
//! - Revocation ledgers of withdrawn claim ids
//! - Shape checks and retrieval of remote key sets and tokens
//!
//! # Token Format
//!
//! Claims are JSON objects signed as compact EdDSA tokens by
//! [`warden_jose::jwt`]. Every claim set is keyed by a UUID v6
//! ([`warden_types::ClaimId`]) in its `jti` field.
//!
//! # Errors
//!
//! Verification failures are tagged with the claim type that failed
//! ([`Subsystem`]), so a caller can tell "the license key is invalid" from
//! "the attestation is invalid"; [`ClaimError::root`] gives the reason.

mod attestation;
mod claims;
mod dirhash;
mod error;
mod license;
mod revocation;

pub mod fetch;

pub use attestation::{
    ArtifactsAttestation, Attestation, ManifestsAttestation, SUBJECT_ARTIFACTS, SUBJECT_MANIFESTS,
};
pub use claims::CLOCK_SKEW_SECS;
pub use dirhash::{CHECKSUM_ALGORITHM, DirectoryHash, hash_directory};
pub use error::{ClaimError, ClaimResult, Subsystem};
pub use license::{License, LicenseClaims, anonymize_subject};
pub use revocation::RevocationList;

#[cfg(feature = "online")]
pub use fetch::fetch;
