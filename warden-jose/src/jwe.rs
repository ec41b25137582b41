//! Compact JWE with `ECDH-ES+A128KW` key management and `A128GCM` content
//! encryption.
//!
//! Encryption generates an ephemeral P-256 key, derives a 128-bit key
//! encryption key from the ECDH shared secret with the Concat KDF of
//! RFC 7518 §4.6.2, wraps a fresh content key with AES key wrap, and seals
//! the payload with AES-128-GCM using the encoded protected header as AAD.
//! Output is `header.encrypted_key.iv.ciphertext.tag`.

use aes_gcm::{
    Aes128Gcm, Nonce,
    aead::{Aead, KeyInit, Payload},
};
use aes_kw::KekAes128;
use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use zeroize::Zeroizing;

use crate::encryption::EncryptionKeySet;
use crate::error::{JoseError, JoseResult};
use crate::jwk::{ALG_ECDH_ES_A128KW, ENC_A128GCM, p256_coordinates, p256_from_coordinates};

/// Size of the AES-128 content and key-encryption keys.
const KEY_SIZE: usize = 16;
/// AES key wrap adds one 64-bit integrity block.
const WRAPPED_KEY_SIZE: usize = KEY_SIZE + 8;
/// GCM nonce size.
const IV_SIZE: usize = 12;
/// GCM tag size.
const TAG_SIZE: usize = 16;

#[derive(Debug, Serialize, Deserialize)]
struct EphemeralKey {
    kty: String,
    crv: String,
    x: String,
    y: String,
}

impl EphemeralKey {
    fn from_public(key: &p256::PublicKey) -> JoseResult<Self> {
        let (x, y) = p256_coordinates(key)?;
        Ok(Self {
            kty: "EC".to_string(),
            crv: "P-256".to_string(),
            x,
            y,
        })
    }

    fn to_public(&self) -> JoseResult<p256::PublicKey> {
        if self.kty != "EC" || self.crv != "P-256" {
            return Err(JoseError::UnsupportedAlgorithm(format!(
                "ephemeral key {}/{}",
                self.kty, self.crv
            )));
        }
        p256_from_coordinates(Some(&self.x), Some(&self.y))
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    enc: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    epk: Option<EphemeralKey>,
}

fn concat_kdf(shared_secret: &[u8]) -> Zeroizing<[u8; KEY_SIZE]> {
    let mut hasher = Sha256::new();
    hasher.update(1u32.to_be_bytes());
    hasher.update(shared_secret);
    hasher.update((ALG_ECDH_ES_A128KW.len() as u32).to_be_bytes());
    hasher.update(ALG_ECDH_ES_A128KW.as_bytes());
    // empty PartyUInfo and PartyVInfo
    hasher.update(0u32.to_be_bytes());
    hasher.update(0u32.to_be_bytes());
    hasher.update(((KEY_SIZE * 8) as u32).to_be_bytes());
    let digest = hasher.finalize();

    let mut kek = Zeroizing::new([0u8; KEY_SIZE]);
    kek.copy_from_slice(&digest[..KEY_SIZE]);
    kek
}

fn derive_kek(secret: &p256::SecretKey, public: &p256::PublicKey) -> Zeroizing<[u8; KEY_SIZE]> {
    let shared = p256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), public.as_affine());
    concat_kdf(shared.raw_secret_bytes().as_slice())
}

fn decode_segment(name: &str, segment: &str) -> JoseResult<Vec<u8>> {
    URL_SAFE_NO_PAD
        .decode(segment)
        .map_err(|e| JoseError::MalformedToken(format!("invalid {name} base64: {e}")))
}

/// Encrypts `payload` to the key `kid` in `public_keys`.
///
/// An empty `kid` selects the first public `enc` key in the set.
pub fn encrypt(payload: &[u8], public_keys: &EncryptionKeySet, kid: &str) -> JoseResult<String> {
    if payload.is_empty() {
        return Err(JoseError::EmptyPayload);
    }
    if public_keys.is_empty() {
        return Err(JoseError::EmptyKeySet);
    }

    let jwk = public_keys.find_public(kid)?;
    jwk.validate()?;
    let recipient = jwk
        .key
        .as_p256_public()
        .ok_or_else(|| jwk.wrong_type("a P-256 public key"))?;

    let ephemeral = p256::SecretKey::random(&mut OsRng);
    let kek = derive_kek(&ephemeral, recipient);

    let mut cek = Zeroizing::new([0u8; KEY_SIZE]);
    OsRng.fill_bytes(&mut cek[..]);
    let mut encrypted_key = [0u8; WRAPPED_KEY_SIZE];
    KekAes128::new(&(*kek).into())
        .wrap(&cek[..], &mut encrypted_key)
        .map_err(|e| JoseError::Encryption(format!("key wrap: {e}")))?;

    let header = Header {
        alg: ALG_ECDH_ES_A128KW.to_string(),
        enc: ENC_A128GCM.to_string(),
        kid: Some(jwk.kid.clone()),
        epk: Some(EphemeralKey::from_public(&ephemeral.public_key())?),
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);

    let mut iv = [0u8; IV_SIZE];
    OsRng.fill_bytes(&mut iv);
    let cipher = Aes128Gcm::new_from_slice(&cek[..])
        .map_err(|e| JoseError::Encryption(e.to_string()))?;
    let sealed = cipher
        .encrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: payload,
                aad: header_b64.as_bytes(),
            },
        )
        .map_err(|e| JoseError::Encryption(e.to_string()))?;
    let (ciphertext, tag) = sealed.split_at(sealed.len() - TAG_SIZE);

    debug!(kid = %jwk.kid, bytes = payload.len(), "encrypted payload");
    Ok(format!(
        "{header_b64}.{}.{}.{}.{}",
        URL_SAFE_NO_PAD.encode(encrypted_key),
        URL_SAFE_NO_PAD.encode(iv),
        URL_SAFE_NO_PAD.encode(ciphertext),
        URL_SAFE_NO_PAD.encode(tag),
    ))
}

/// Decrypts a compact JWE with the private key its `kid` header names.
pub fn decrypt(token: &[u8], private_keys: &EncryptionKeySet) -> JoseResult<Vec<u8>> {
    if token.is_empty() {
        return Err(JoseError::EmptyPayload);
    }
    if private_keys.is_empty() {
        return Err(JoseError::EmptyKeySet);
    }

    let token = std::str::from_utf8(token)
        .map_err(|_| JoseError::MalformedToken("token is not UTF-8".to_string()))?
        .trim();
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 5 {
        return Err(JoseError::MalformedToken(format!(
            "expected 5 segments, found {}",
            parts.len()
        )));
    }

    let header: Header = serde_json::from_slice(&decode_segment("header", parts[0])?)
        .map_err(|e| JoseError::MalformedToken(format!("invalid header JSON: {e}")))?;
    if header.alg != ALG_ECDH_ES_A128KW || header.enc != ENC_A128GCM {
        return Err(JoseError::UnsupportedAlgorithm(format!(
            "{}/{}",
            header.alg, header.enc
        )));
    }
    let kid = header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(JoseError::MissingKeyId)?;

    let jwk = private_keys.find_private(&kid)?;
    jwk.validate()?;
    let secret = jwk
        .key
        .as_p256_private()
        .ok_or_else(|| jwk.wrong_type("a P-256 private key"))?;

    let ephemeral = header
        .epk
        .ok_or_else(|| JoseError::MalformedToken("missing epk header".to_string()))?
        .to_public()?;
    let kek = derive_kek(secret, &ephemeral);

    let encrypted_key = decode_segment("encrypted key", parts[1])?;
    if encrypted_key.len() != WRAPPED_KEY_SIZE {
        return Err(JoseError::Decryption(format!(
            "wrapped key must be {WRAPPED_KEY_SIZE} bytes, got {}",
            encrypted_key.len()
        )));
    }
    let mut cek = Zeroizing::new([0u8; KEY_SIZE]);
    KekAes128::new(&(*kek).into())
        .unwrap(&encrypted_key, &mut cek[..])
        .map_err(|_| JoseError::Decryption("key unwrap failed".to_string()))?;

    let iv = decode_segment("iv", parts[2])?;
    if iv.len() != IV_SIZE {
        return Err(JoseError::MalformedToken(format!(
            "iv must be {IV_SIZE} bytes, got {}",
            iv.len()
        )));
    }
    let mut sealed = decode_segment("ciphertext", parts[3])?;
    let tag = decode_segment("tag", parts[4])?;
    if tag.len() != TAG_SIZE {
        return Err(JoseError::MalformedToken(format!(
            "tag must be {TAG_SIZE} bytes, got {}",
            tag.len()
        )));
    }
    sealed.extend_from_slice(&tag);

    let cipher = Aes128Gcm::new_from_slice(&cek[..])
        .map_err(|e| JoseError::Decryption(e.to_string()))?;
    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(&iv),
            Payload {
                msg: &sealed,
                aad: parts[0].as_bytes(),
            },
        )
        .map_err(|_| JoseError::Decryption("wrong key or tampered data".to_string()))?;

    debug!(%kid, bytes = plaintext.len(), "decrypted payload");
    Ok(plaintext)
}
