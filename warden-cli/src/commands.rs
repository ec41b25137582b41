//! Subcommand implementations.
//!
//! Each function takes already-loaded inputs and returns what the binary
//! prints, so the same flows can be driven from tests.

use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, anyhow, bail};
use chrono::Duration;
use tracing::{info, warn};
use warden_jose::{EncryptionKeySet, SigningKeySet, generate_signing_pair, jwe};
use warden_license::fetch::ContentKind;
use warden_license::{ArtifactsAttestation, License, ManifestsAttestation, RevocationList};

/// Reads input from a file, from stdin (`-`), or with the `online` feature
/// from an https URL whose body must have the shape `expect`.
pub async fn read_source(source: &str, expect: ContentKind) -> Result<Vec<u8>> {
    if source == "-" {
        let mut buf = Vec::new();
        std::io::stdin()
            .read_to_end(&mut buf)
            .context("reading stdin")?;
        return Ok(buf);
    }
    if source.starts_with("https://") || source.starts_with("http://") {
        return fetch_url(source, expect).await;
    }
    std::fs::read(source).with_context(|| format!("reading {source}"))
}

#[cfg(feature = "online")]
async fn fetch_url(url: &str, expect: ContentKind) -> Result<Vec<u8>> {
    let options = warden_license::fetch::FetchOptions::expecting(expect);
    warden_license::fetch(url, &options)
        .await
        .with_context(|| format!("fetching {url}"))
}

#[cfg(not(feature = "online"))]
async fn fetch_url(url: &str, _expect: ContentKind) -> Result<Vec<u8>> {
    bail!("{url}: this build cannot fetch URLs (enable the `online` feature)")
}

/// Generates an Ed25519 pair and writes both key sets. Returns the key id.
pub fn keygen_signing(issuer: &str, public_path: &Path, private_path: &Path) -> Result<String> {
    let (public, private) = generate_signing_pair(issuer)?;
    private
        .write(private_path)
        .with_context(|| format!("writing {}", private_path.display()))?;
    public
        .write(public_path)
        .with_context(|| format!("writing {}", public_path.display()))?;
    let kid = public.keys()[0].kid.clone();
    info!(%kid, issuer, "generated signing key");
    Ok(kid)
}

/// Generates a P-256 pair and writes both key sets. Returns the key id.
pub fn keygen_encryption(public_path: &Path, private_path: &Path) -> Result<String> {
    let (public, private) = EncryptionKeySet::generate();
    if private_path.exists() {
        bail!("refusing to overwrite {}", private_path.display());
    }
    private
        .write(private_path)
        .with_context(|| format!("writing {}", private_path.display()))?;
    public
        .write(public_path)
        .with_context(|| format!("writing {}", public_path.display()))?;
    let kid = public.keys()[0].kid.clone();
    info!(%kid, "generated encryption key");
    Ok(kid)
}

/// Inputs for a new license.
#[derive(Debug, Clone)]
pub struct LicenseRequest {
    pub subject: String,
    pub audience: Vec<String>,
    pub validity: Duration,
    pub capabilities: Vec<String>,
}

/// Converts a `--days` count into a validity period.
pub fn validity_days(days: i64) -> Result<Duration> {
    Duration::try_days(days).ok_or_else(|| anyhow!("--days {days} is out of range"))
}

/// Issues and signs a license with the key in `private_key_set`.
pub fn issue_license(private_key_set: &[u8], request: LicenseRequest) -> Result<String> {
    let key = SigningKeySet::private_key_by_id(private_key_set).context("loading signing key")?;
    if request.audience.is_empty() {
        bail!("no audience given (use --audience or set `audience` in the config)");
    }
    let license = License::new(
        key.issuer(),
        &request.subject,
        request.audience,
        request.validity,
        request.capabilities,
    )?;
    let token = license.sign(&key)?;
    info!(id = %license.id(), subject = license.subject(), "issued license");
    Ok(token)
}

/// Checks applied after a license token verifies.
#[derive(Debug, Clone)]
pub struct LicenseCheck<'a> {
    pub audience: Option<&'a str>,
    pub capability: Option<&'a str>,
    pub revocations: Option<&'a RevocationList>,
    pub leeway: Duration,
}

/// Verifies a license token and applies expiry, audience, capability and
/// revocation checks.
pub fn verify_license(
    token: &str,
    public_key_set: &[u8],
    check: &LicenseCheck<'_>,
) -> Result<License> {
    let license = License::from_token(token, public_key_set)?;

    if license.is_expired(check.leeway) {
        let expiry = license.expires_at().map_or_else(
            || license.claims().expires_at.to_string(),
            |t| t.to_rfc3339(),
        );
        warn!(id = %license.id(), %expiry, "license expired");
        bail!("license {} expired at {expiry}", license.id());
    }
    if let Some(audience) = check.audience {
        if !license.has_audience(audience) {
            bail!("license {} is not valid for {audience}", license.id());
        }
    }
    if let Some(capability) = check.capability {
        if !license.has_capability(capability) {
            bail!("license {} does not grant {capability}", license.id());
        }
    }
    if let Some(ledger) = check.revocations {
        let (revoked, at) = ledger.is_revoked(Some(&license));
        if revoked {
            warn!(id = %license.id(), %at, "license revoked");
            bail!("license {} was revoked at {at}", license.id());
        }
    }
    Ok(license)
}

/// Signs an artifacts attestation over `digests`.
pub fn attest_artifacts(
    private_key_set: &[u8],
    audience: &str,
    digests: Vec<String>,
) -> Result<String> {
    let key = SigningKeySet::private_key_by_id(private_key_set).context("loading signing key")?;
    let mut attestation = ArtifactsAttestation::for_audience(audience);
    Ok(attestation.sign(&key, digests)?)
}

/// Signs a manifests attestation over `directory`. Returns the token and
/// the covered files.
pub fn attest_manifests(
    private_key_set: &[u8],
    audience: &str,
    directory: &Path,
    ignore_patterns: &[String],
) -> Result<(String, Vec<String>)> {
    let key = SigningKeySet::private_key_by_id(private_key_set).context("loading signing key")?;
    let mut attestation = ManifestsAttestation::for_audience(audience);
    Ok(attestation.sign(&key, directory, ignore_patterns)?)
}

/// Verifies an artifacts attestation, optionally requiring `digest`.
pub fn verify_artifacts(
    token: &str,
    public_key_set: &[u8],
    digest: Option<&str>,
) -> Result<ArtifactsAttestation> {
    let attestation = ArtifactsAttestation::from_token(token, public_key_set)?;
    if let Some(digest) = digest {
        if !attestation.has_digest(digest) {
            bail!("attestation does not cover {digest}");
        }
    }
    Ok(attestation)
}

/// Verifies a manifests attestation against `directory`.
pub fn verify_manifests(
    token: &str,
    public_key_set: &[u8],
    audience: &str,
    directory: &Path,
    ignore_patterns: &[String],
) -> Result<Vec<String>> {
    Ok(ManifestsAttestation::for_audience(audience).verify(
        token,
        public_key_set,
        directory,
        ignore_patterns,
    )?)
}

/// Adds `ids` to the ledger at `path` (merging with its current content).
/// Returns the number of ids added.
pub fn revoke(path: &Path, issuer: &str, ids: &[String]) -> Result<usize> {
    let mut ledger = RevocationList::new(issuer);
    for id in ids {
        ledger.add(id).with_context(|| format!("revoking {id}"))?;
    }
    ledger
        .write(path)
        .with_context(|| format!("writing {}", path.display()))?;
    info!(path = %path.display(), count = ids.len(), "updated revocation list");
    Ok(ids.len())
}

/// Encrypts `payload` to `kid` (or the first usable key) in `public_key_set`.
pub fn encrypt(payload: &[u8], public_key_set: &[u8], kid: &str) -> Result<String> {
    let keys = EncryptionKeySet::from_json(public_key_set).context("loading encryption keys")?;
    Ok(jwe::encrypt(payload, &keys, kid)?)
}

/// Decrypts a compact JWE with `private_key_set`.
pub fn decrypt(token: &[u8], private_key_set: &[u8]) -> Result<Vec<u8>> {
    let keys = EncryptionKeySet::from_json(private_key_set).context("loading encryption keys")?;
    Ok(jwe::decrypt(token, &keys)?)
}
