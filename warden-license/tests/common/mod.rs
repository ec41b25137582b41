//! Shared test helpers for license, attestation and revocation tests.

#![allow(dead_code)]

use std::fs;
use std::path::Path;

use chrono::Duration;
use warden_jose::PrivateSigningKey;
use warden_license::License;

pub const ISSUER: &str = "licenses.example.com";
pub const AUDIENCE: &str = "cluster.example.com";

/// Generates a fresh signer and returns it with the public key set JSON.
pub fn signer() -> (PrivateSigningKey, Vec<u8>) {
    let (public, private) = warden_jose::generate_signing_pair(ISSUER).unwrap();
    (private.private_key().unwrap(), public.to_json().unwrap())
}

/// Issues a license valid for `validity` with a single capability.
pub fn license_for(validity: Duration) -> License {
    License::new(
        ISSUER,
        "Customer Ltd <ops@customer.example>",
        vec![AUDIENCE.to_string()],
        validity,
        vec!["Scheduler".to_string()],
    )
    .unwrap()
}

/// Writes `files` (relative path, contents) under `root`, creating parents.
pub fn write_tree(root: &Path, files: &[(&str, &str)]) {
    for (rel, contents) in files {
        let path = root.join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }
}

/// A small manifest tree used by attestation tests.
pub fn manifest_tree(root: &Path) {
    write_tree(
        root,
        &[
            ("deployment.yaml", "kind: Deployment\n"),
            ("service.yaml", "kind: Service\n"),
            ("crds/license.yaml", "kind: CustomResourceDefinition\n"),
            ("notes.txt.bak", "scratch\n"),
        ],
    );
}
