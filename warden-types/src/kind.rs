//! Coarse error taxonomy shared by every Warden error enum.

use std::fmt;

/// What went wrong, independent of which crate reported it.
///
/// Callers that only care about the category (for example to decide between
/// "reject the token" and "retry later") match on this instead of the
/// concrete error variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Unparseable JSON, JWS or JWE input.
    Malformed,
    /// A required key, key set or payload was empty or absent.
    MissingMaterial,
    /// A claim field is empty, invalid, mismatched, from the future or expired.
    ClaimViolation,
    /// An attestation was signed a second time.
    Immutable,
    /// A key id was not found in a key set.
    Lookup,
    /// A signature or decryption did not validate.
    Crypto,
    /// A recomputed directory hash differs from the attested one.
    Integrity,
    /// A write would clobber a private key, duplicate a key id, or merge
    /// ledgers of different issuers.
    Persistence,
    /// Raw filesystem failure.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Malformed => "malformed input",
            Self::MissingMaterial => "missing required material",
            Self::ClaimViolation => "claim violation",
            Self::Immutable => "immutability violation",
            Self::Lookup => "lookup failure",
            Self::Crypto => "cryptographic failure",
            Self::Integrity => "integrity failure",
            Self::Persistence => "persistence conflict",
            Self::Io => "i/o failure",
        };
        f.write_str(name)
    }
}
