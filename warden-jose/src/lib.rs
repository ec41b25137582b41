//! JOSE primitives for Warden.
//!
//! This crate handles:
//! - Ed25519 signing key sets (public and private JWK documents)
//! - P-256 encryption key sets
//! - Compact EdDSA-signed tokens ([`jwt`])
//! - Compact `ECDH-ES+A128KW` / `A128GCM` encrypted tokens ([`jwe`])
//!
//! # Key Set Format
//!
//! ```json
//! {
//!   "issuer": "example.com",
//!   "keys": [{"kty":"OKP","crv":"Ed25519","kid":"…","alg":"EdDSA","use":"sig","x":"…","d":"…"}]
//! }
//! ```
//!
//! The `issuer` field is present only on private sets. Private material
//! (`d`) is written with mode `0600`, public sets with `0644`.

mod encryption;
mod error;
mod jwk;
mod keyset;

pub mod jwe;
pub mod jwt;

pub use encryption::EncryptionKeySet;
pub use error::{JoseError, JoseResult};
pub use jwk::{ALG_ECDH_ES_A128KW, ALG_EDDSA, ENC_A128GCM, Jwk, KeyMaterial, USE_ENC, USE_SIG};
pub use keyset::{PrivateSigningKey, PublicSigningKey, SigningKeySet, generate_signing_pair};
