//! Operator configuration.
//!
//! Loaded from `warden.toml` (or `--config`). A missing file means "use
//! defaults"; an unreadable or malformed file is reported and also falls
//! back to defaults, so a broken config never blocks verification flags
//! given on the command line.
//!
//! ```toml
//! issuer = "licenses.example.com"
//! audience = ["cluster.example.com"]
//! signing_key = "keys/private.json"
//! public_keys = "https://licenses.example.com/keys.json"
//! encryption_keys = "keys/encryption.json"
//! revocations = "revocations.json"
//! ignore_patterns = [".bak", "kustomization.yaml"]
//! leeway_secs = 60
//! ```

use std::path::{Path, PathBuf};

use chrono::Duration;
use serde::Deserialize;
use tracing::{info, warn};

/// Default config file name, resolved against the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "warden.toml";

/// Default expiry leeway in seconds.
pub const DEFAULT_LEEWAY_SECS: i64 = 60;

/// Settings shared by every subcommand. Command-line flags take precedence.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Issuer name used when generating signing keys.
    pub issuer: Option<String>,
    /// Audiences for issued licenses and attestations.
    pub audience: Vec<String>,
    /// Private signing key set.
    pub signing_key: Option<PathBuf>,
    /// Public signing key set; a path or, with the `online` feature, a URL.
    pub public_keys: Option<String>,
    /// Encryption key set (public for `encrypt`, private for `decrypt`).
    pub encryption_keys: Option<PathBuf>,
    /// Revocation ledger; a path or URL.
    pub revocations: Option<String>,
    /// Path suffixes skipped when hashing manifest directories.
    pub ignore_patterns: Vec<String>,
    /// Expiry leeway applied when verifying licenses.
    pub leeway_secs: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            issuer: None,
            audience: Vec::new(),
            signing_key: None,
            public_keys: None,
            encryption_keys: None,
            revocations: None,
            ignore_patterns: Vec::new(),
            leeway_secs: DEFAULT_LEEWAY_SECS,
        }
    }
}

impl Config {
    /// Loads the config from `path`, falling back to defaults.
    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            info!("No config file at {:?}, using defaults", path);
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<Self>(&contents) {
                Ok(config) => {
                    info!("Loaded config from {:?}", path);
                    config
                }
                Err(e) => {
                    warn!("Failed to parse config file {:?}: {}. Using defaults.", path, e);
                    Self::default()
                }
            },
            Err(e) => {
                warn!("Failed to read config file {:?}: {}", path, e);
                Self::default()
            }
        }
    }

    /// Expiry leeway as a duration.
    #[must_use]
    pub fn leeway(&self) -> Duration {
        Duration::seconds(self.leeway_secs)
    }

    /// The first configured audience, if any.
    #[must_use]
    pub fn primary_audience(&self) -> Option<&str> {
        self.audience.first().map(String::as_str)
    }
}
