//! Shared test helpers for key-set and token tests.

#![allow(dead_code)]

use ed25519_dalek::SigningKey;
use warden_jose::{PrivateSigningKey, SigningKeySet};

pub const ISSUER: &str = "warden.example.com";

/// Returns a deterministic Ed25519 key from a one-byte seed pattern.
pub fn fixed_key(seed: u8) -> SigningKey {
    SigningKey::from_bytes(&[seed; 32])
}

/// Builds a `(public, private)` pair around a fixed key and id.
pub fn fixed_pair(seed: u8, kid: &str) -> (SigningKeySet, SigningKeySet) {
    let key = fixed_key(seed);
    let mut public = SigningKeySet::new_public();
    public.add_public_key(key.verifying_key(), kid).unwrap();
    let mut private = SigningKeySet::new_private(ISSUER);
    private.add_private_key(key, kid).unwrap();
    (public, private)
}

/// Generates a fresh pair and returns the signer plus the public set as JSON.
pub fn signer() -> (PrivateSigningKey, Vec<u8>) {
    let (public, private) = warden_jose::generate_signing_pair(ISSUER).unwrap();
    (private.private_key().unwrap(), public.to_json().unwrap())
}

/// Returns the unix permission bits of `path`.
#[cfg(unix)]
pub fn mode_of(path: &std::path::Path) -> u32 {
    use std::os::unix::fs::PermissionsExt;
    std::fs::metadata(path).unwrap().permissions().mode() & 0o777
}
