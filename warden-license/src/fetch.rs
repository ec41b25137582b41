//! Retrieval of remote key sets and tokens.
//!
//! The checks ([`check_url`], [`validate_content`]) are always available so
//! callers that bring their own transport can apply the same rules. The
//! [`fetch`] function itself needs the `online` feature.

use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

use base64::{Engine, engine::general_purpose::URL_SAFE_NO_PAD};
use thiserror::Error;
use url::{Host, Url};
use warden_types::ErrorKind;

/// Default number of retries after the first attempt.
pub const DEFAULT_RETRIES: u32 = 3;
/// Default per-request timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
/// Delay added per attempt between retries.
pub const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Shape a fetched body must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    /// A JSON key set document with a `keys` array.
    KeySet,
    /// A compact signed token (three segments).
    Jwt,
    /// A compact encrypted token (five segments).
    Jwe,
    /// No shape check.
    Any,
}

impl std::fmt::Display for ContentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::KeySet => "key set",
            Self::Jwt => "signed token",
            Self::Jwe => "encrypted token",
            Self::Any => "any content",
        })
    }
}

/// Errors raised while retrieving remote content.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("invalid url: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Only `https` is accepted, except `http` to localhost when allowed.
    #[error("refusing insecure url {0}")]
    InsecureUrl(String),

    /// The body does not have the expected shape.
    #[error("expected {expected}: {reason}")]
    UnexpectedContent {
        expected: ContentKind,
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("server returned status {0}")]
    Status(u16),

    #[cfg(feature = "online")]
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

impl FetchError {
    /// Returns the coarse category of this error.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidUrl(_) | Self::InsecureUrl(_) | Self::UnexpectedContent { .. } => {
                ErrorKind::Malformed
            }
            Self::Status(_) => ErrorKind::Lookup,
            #[cfg(feature = "online")]
            Self::Http(_) => ErrorKind::Io,
        }
    }
}

/// Options for [`fetch`].
#[derive(Debug, Clone)]
pub struct FetchOptions {
    /// Retries after the first attempt on connect errors, timeouts and 5xx.
    pub retries: u32,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
    /// Required shape of the body.
    pub expect: ContentKind,
    /// Accept plain `http` to `localhost`, `127.0.0.1` and `::1`.
    pub allow_localhost: bool,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            retries: DEFAULT_RETRIES,
            timeout: DEFAULT_TIMEOUT,
            user_agent: concat!("warden/", env!("CARGO_PKG_VERSION")).to_string(),
            expect: ContentKind::Any,
            allow_localhost: false,
        }
    }
}

impl FetchOptions {
    /// Default options expecting `kind`.
    #[must_use]
    pub fn expecting(kind: ContentKind) -> Self {
        Self {
            expect: kind,
            ..Self::default()
        }
    }
}

fn is_localhost(url: &Url) -> bool {
    match url.host() {
        Some(Host::Domain(domain)) => domain.eq_ignore_ascii_case("localhost"),
        Some(Host::Ipv4(ip)) => ip == Ipv4Addr::LOCALHOST,
        Some(Host::Ipv6(ip)) => ip == Ipv6Addr::LOCALHOST,
        None => false,
    }
}

/// Parses `url` and enforces TLS.
pub fn check_url(url: &str, allow_localhost: bool) -> Result<Url, FetchError> {
    let parsed = Url::parse(url)?;
    match parsed.scheme() {
        "https" => Ok(parsed),
        "http" if allow_localhost && is_localhost(&parsed) => Ok(parsed),
        _ => Err(FetchError::InsecureUrl(url.to_string())),
    }
}

fn unexpected(expected: ContentKind, reason: impl Into<String>) -> FetchError {
    FetchError::UnexpectedContent {
        expected,
        reason: reason.into(),
    }
}

fn check_segments(kind: ContentKind, body: &[u8], count: usize) -> Result<(), FetchError> {
    let text = std::str::from_utf8(body).map_err(|_| unexpected(kind, "body is not UTF-8"))?;
    let segments: Vec<&str> = text.trim().split('.').collect();
    if segments.len() != count {
        return Err(unexpected(
            kind,
            format!("{} segments, want {count}", segments.len()),
        ));
    }
    // the header is never empty and must decode
    URL_SAFE_NO_PAD
        .decode(segments[0])
        .map_err(|_| unexpected(kind, "header is not base64url"))?;
    for segment in &segments[1..] {
        if segment
            .bytes()
            .any(|b| !(b.is_ascii_alphanumeric() || b == b'-' || b == b'_'))
        {
            return Err(unexpected(kind, "segment is not base64url"));
        }
    }
    Ok(())
}

/// Checks that `body` has the shape `kind` demands.
pub fn validate_content(kind: ContentKind, body: &[u8]) -> Result<(), FetchError> {
    if body.is_empty() {
        return Err(unexpected(kind, "empty body"));
    }
    match kind {
        ContentKind::Any => Ok(()),
        ContentKind::Jwt => check_segments(kind, body, 3),
        ContentKind::Jwe => check_segments(kind, body, 5),
        ContentKind::KeySet => {
            let value: serde_json::Value = serde_json::from_slice(body)
                .map_err(|e| unexpected(kind, format!("invalid JSON: {e}")))?;
            match value.get("keys") {
                Some(serde_json::Value::Array(keys)) if !keys.is_empty() => Ok(()),
                Some(serde_json::Value::Array(_)) => Err(unexpected(kind, "no keys")),
                _ => Err(unexpected(kind, "missing keys array")),
            }
        }
    }
}

/// Retrieves `url`, retrying transient failures, and validates the body.
#[cfg(feature = "online")]
pub async fn fetch(url: &str, options: &FetchOptions) -> Result<Vec<u8>, FetchError> {
    use tracing::{debug, warn};

    let url = check_url(url, options.allow_localhost)?;
    let client = reqwest::Client::builder()
        .timeout(options.timeout)
        .user_agent(options.user_agent.as_str())
        .https_only(url.scheme() == "https")
        .build()?;

    let attempts = options.retries + 1;
    let mut attempt = 0;
    loop {
        attempt += 1;
        match client.get(url.clone()).send().await {
            Ok(resp) if resp.status().is_server_error() && attempt < attempts => {
                warn!(%url, status = resp.status().as_u16(), attempt, "server error, retrying");
            }
            Ok(resp) if !resp.status().is_success() => {
                return Err(FetchError::Status(resp.status().as_u16()));
            }
            Ok(resp) => {
                let body = resp.bytes().await?;
                validate_content(options.expect, &body)?;
                debug!(%url, bytes = body.len(), "fetched");
                return Ok(body.to_vec());
            }
            Err(e) if (e.is_connect() || e.is_timeout()) && attempt < attempts => {
                warn!(%url, error = %e, attempt, "request failed, retrying");
            }
            Err(e) => return Err(e.into()),
        }
        tokio::time::sleep(RETRY_BACKOFF * attempt).await;
    }
}
