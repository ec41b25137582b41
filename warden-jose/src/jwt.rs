//! Compact EdDSA-signed tokens.
//!
//! Tokens use the format `base64url(header).base64url(payload).base64url(signature)`
//! where the header is `{"alg":"EdDSA","kid":"<key id>","typ":"JWT"}` and the
//! payload is the caller's bytes verbatim. The signature covers the ASCII
//! `header.payload` prefix.

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use ed25519_dalek::Signature;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{JoseError, JoseResult};
use crate::jwk::ALG_EDDSA;
use crate::keyset::{PrivateSigningKey, SigningKeySet};

const TYP_JWT: &str = "JWT";

#[derive(Debug, Serialize, Deserialize)]
struct Header {
    alg: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    typ: Option<String>,
}

struct ParsedToken<'a> {
    header: Header,
    signing_input: &'a str,
    payload: &'a str,
    signature: &'a str,
}

fn parse(token: &str) -> JoseResult<ParsedToken<'_>> {
    let token = token.trim();
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(JoseError::MalformedToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let header_json = URL_SAFE_NO_PAD
        .decode(parts[0])
        .map_err(|e| JoseError::MalformedToken(format!("invalid header base64: {e}")))?;
    let header: Header = serde_json::from_slice(&header_json)
        .map_err(|e| JoseError::MalformedToken(format!("invalid header JSON: {e}")))?;

    let signing_input_len = parts[0].len() + 1 + parts[1].len();
    Ok(ParsedToken {
        header,
        signing_input: &token[..signing_input_len],
        payload: parts[1],
        signature: parts[2],
    })
}

/// Signs `payload` with `key`, placing the key id in the header.
pub fn sign(payload: &[u8], key: &PrivateSigningKey) -> JoseResult<String> {
    let header = Header {
        alg: ALG_EDDSA.to_string(),
        kid: Some(key.id().to_string()),
        typ: Some(TYP_JWT.to_string()),
    };
    let header_b64 = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&header)?);
    let payload_b64 = URL_SAFE_NO_PAD.encode(payload);
    let signing_input = format!("{header_b64}.{payload_b64}");
    let signature = key.sign(signing_input.as_bytes());

    debug!(kid = key.id(), "signed token");
    Ok(format!(
        "{signing_input}.{}",
        URL_SAFE_NO_PAD.encode(signature.to_bytes())
    ))
}

/// Verifies `token` against the key in `public_key_set` named by its `kid`
/// header and returns the payload bytes.
///
/// # Errors
///
/// - [`JoseError::MalformedToken`] if the token cannot be decoded
/// - [`JoseError::NoSignature`] if the signature segment is empty
/// - [`JoseError::MissingKeyId`] if the header has no `kid`
/// - [`JoseError::KeyNotFound`] if the set has no key with that id
/// - [`JoseError::SignatureInvalid`] if the signature does not verify
pub fn verify(token: &str, public_key_set: &[u8]) -> JoseResult<Vec<u8>> {
    let parsed = parse(token)?;
    if parsed.signature.is_empty() {
        return Err(JoseError::NoSignature);
    }
    if parsed.header.alg != ALG_EDDSA {
        return Err(JoseError::UnsupportedAlgorithm(parsed.header.alg));
    }
    let kid = parsed
        .header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(JoseError::MissingKeyId)?;

    let key = SigningKeySet::public_key_by_id(public_key_set, &kid)?;

    let signature_bytes = URL_SAFE_NO_PAD
        .decode(parsed.signature)
        .map_err(|e| JoseError::MalformedToken(format!("invalid signature base64: {e}")))?;
    let signature =
        Signature::from_slice(&signature_bytes).map_err(|_| JoseError::SignatureInvalid)?;
    key.verify(parsed.signing_input.as_bytes(), &signature)?;

    let payload = URL_SAFE_NO_PAD
        .decode(parsed.payload)
        .map_err(|e| JoseError::MalformedToken(format!("invalid payload base64: {e}")))?;

    debug!(%kid, "verified signed token");
    Ok(payload)
}

/// Returns the `kid` header of `token` without verifying anything.
pub fn key_id_of(token: &str) -> JoseResult<String> {
    parse(token)?
        .header
        .kid
        .filter(|kid| !kid.is_empty())
        .ok_or(JoseError::MissingKeyId)
}
