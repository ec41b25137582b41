//! Error types for key sets and JOSE tokens.

use std::path::PathBuf;
use thiserror::Error;
use warden_types::ErrorKind;

/// Result type for key-set and token operations.
pub type JoseResult<T> = Result<T, JoseError>;

/// Errors raised by key-set management and JWS/JWE processing.
#[derive(Debug, Error)]
pub enum JoseError {
    /// A compact token could not be split or decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    /// A JWK entry could not be decoded into key material.
    #[error("malformed key: {0}")]
    MalformedKey(String),

    /// JSON (de)serialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Reading or writing a key-set file failed.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    /// The key set holds no keys.
    #[error("key set is empty")]
    EmptyKeySet,

    /// The payload to encrypt or decrypt is empty.
    #[error("payload is empty")]
    EmptyPayload,

    /// A private key set has no issuer.
    #[error("private key set has no issuer")]
    MissingIssuer,

    /// A public key was added to a set that carries an issuer.
    #[error("cannot add a public key to a private key set")]
    PrivateSet,

    /// A second key was added to a private key set.
    #[error("private key set already holds a key")]
    PrivateKeyPresent,

    /// A parsed private key set holds more than one key.
    #[error("private key set holds {0} keys, expected exactly one")]
    TooManyPrivateKeys(usize),

    /// A public set carries private material, or a private set public-only
    /// material.
    #[error("key {kid}: a {set} key set cannot hold this key")]
    KeyMaterialMismatch { kid: String, set: &'static str },

    /// A key id is already present in the set or the file being merged into.
    #[error("duplicate key id: {0}")]
    DuplicateKeyId(String),

    /// A private key set write would overwrite an existing file.
    #[error("refusing to overwrite existing private key file {}", .0.display())]
    FileExists(PathBuf),

    /// A token header or JWK entry has no `kid`.
    #[error("missing key id")]
    MissingKeyId,

    /// A compact JWS has an empty signature segment.
    #[error("token carries no signature")]
    NoSignature,

    /// No key in the set matches the requested id.
    #[error("key {0} not found in key set")]
    KeyNotFound(String),

    /// The matching key has the wrong `alg` tag.
    #[error("key {kid}: expected algorithm {expected}, found {found:?}")]
    WrongAlgorithm {
        kid: String,
        expected: &'static str,
        found: String,
    },

    /// The matching key has the wrong `use` tag.
    #[error("key {kid}: expected use {expected}, found {found:?}")]
    WrongUse {
        kid: String,
        expected: &'static str,
        found: String,
    },

    /// The matching key holds the wrong kind of material.
    #[error("key {kid}: expected {expected}")]
    WrongKeyType { kid: String, expected: &'static str },

    /// The token or key uses an algorithm this crate does not accept.
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// The signature does not verify under the selected key.
    #[error("signature verification failed")]
    SignatureInvalid,

    /// Content encryption or key wrapping failed.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// Key unwrapping or content decryption failed.
    #[error("decryption failed: {0}")]
    Decryption(String),
}

impl JoseError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedToken(_)
            | Self::MalformedKey(_)
            | Self::Serialization(_)
            | Self::TooManyPrivateKeys(_)
            | Self::KeyMaterialMismatch { .. }
            | Self::UnsupportedAlgorithm(_) => ErrorKind::Malformed,
            Self::Io(_) => ErrorKind::Io,
            Self::EmptyKeySet
            | Self::EmptyPayload
            | Self::MissingIssuer
            | Self::MissingKeyId
            | Self::NoSignature => ErrorKind::MissingMaterial,
            Self::PrivateSet
            | Self::PrivateKeyPresent
            | Self::DuplicateKeyId(_)
            | Self::FileExists(_) => ErrorKind::Persistence,
            Self::KeyNotFound(_)
            | Self::WrongAlgorithm { .. }
            | Self::WrongUse { .. }
            | Self::WrongKeyType { .. } => ErrorKind::Lookup,
            Self::SignatureInvalid | Self::Encryption(_) | Self::Decryption(_) => {
                ErrorKind::Crypto
            }
        }
    }
}
