//! Warden operator CLI
//!
//! Issues and verifies license keys and attestations, maintains revocation
//! ledgers and encrypts payloads for distribution.
//!
//! Usage:
//!   warden keygen signing --issuer licenses.example.com
//!   warden license issue "Customer Ltd" --audience cluster.example.com --days 365
//!   warden license verify token.jwt --public-keys public.json
//!   warden attest manifests ./deploy --audience cluster.example.com
//!   warden verify manifests ./deploy token.jwt --public-keys public.json

use std::io::Write;
use std::path::PathBuf;

use anyhow::{Context, Result, anyhow};
use clap::{Parser, Subcommand};
use tracing::{Level, debug};
use tracing_subscriber::FmtSubscriber;
use warden_cli::Config;
use warden_cli::commands::{self, LicenseCheck, LicenseRequest};
use warden_cli::config::DEFAULT_CONFIG_FILE;
use warden_license::RevocationList;
use warden_license::fetch::ContentKind;

#[derive(Parser, Debug)]
#[command(name = "warden")]
#[command(about = "Issue and verify licenses and attestations")]
#[command(version)]
struct Args {
    /// Path to the config file
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE, global = true)]
    config: PathBuf,

    /// Enable verbose debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Generate a key pair
    Keygen {
        #[command(subcommand)]
        kind: KeygenCommand,
    },
    /// Issue or verify license keys
    License {
        #[command(subcommand)]
        action: LicenseCommand,
    },
    /// Sign an attestation
    Attest {
        #[command(subcommand)]
        kind: AttestCommand,
    },
    /// Verify an attestation
    Verify {
        #[command(subcommand)]
        kind: VerifyCommand,
    },
    /// Add claim ids to a revocation ledger
    Revoke {
        /// Claim ids (UUID v6) to revoke
        #[arg(required = true)]
        ids: Vec<String>,
        /// Ledger file to update
        #[arg(long)]
        ledger: Option<PathBuf>,
        /// Issuer owning the ledger
        #[arg(long)]
        issuer: Option<String>,
    },
    /// Encrypt a payload to a public encryption key
    Encrypt {
        /// Payload file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
        /// Public encryption key set
        #[arg(long)]
        keys: Option<PathBuf>,
        /// Key id; the first usable key when omitted
        #[arg(long, default_value = "")]
        kid: String,
    },
    /// Decrypt a token with a private encryption key
    Decrypt {
        /// Token file, or `-` for stdin
        #[arg(default_value = "-")]
        input: String,
        /// Private encryption key set
        #[arg(long)]
        keys: Option<PathBuf>,
    },
}

#[derive(Subcommand, Debug)]
enum KeygenCommand {
    /// Ed25519 signing keys
    Signing {
        #[arg(long)]
        issuer: Option<String>,
        /// Public key set, merged into if it exists
        #[arg(long, default_value = "public.json")]
        public: PathBuf,
        /// Private key set, never overwritten
        #[arg(long, default_value = "private.json")]
        private: PathBuf,
    },
    /// P-256 encryption keys
    Encryption {
        #[arg(long, default_value = "encryption.pub.json")]
        public: PathBuf,
        #[arg(long, default_value = "encryption.json")]
        private: PathBuf,
    },
}

#[derive(Subcommand, Debug)]
enum LicenseCommand {
    /// Issue a signed license key
    Issue {
        /// Human-readable subject; stored anonymized
        subject: String,
        #[arg(long)]
        audience: Vec<String>,
        /// Validity in days
        #[arg(long, default_value = "365", allow_negative_numbers = true)]
        days: i64,
        #[arg(long)]
        capability: Vec<String>,
        /// Private signing key set
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Verify a license key and print its claims
    Verify {
        /// Token file, URL, or `-` for stdin
        #[arg(default_value = "-")]
        token: String,
        #[arg(long)]
        public_keys: Option<String>,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        capability: Option<String>,
        #[arg(long)]
        revocations: Option<String>,
    },
}

#[derive(Subcommand, Debug)]
enum AttestCommand {
    /// Attest a list of artifact digests
    Artifacts {
        #[arg(required = true)]
        digests: Vec<String>,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        key: Option<PathBuf>,
    },
    /// Attest every file under a directory
    Manifests {
        directory: PathBuf,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        key: Option<PathBuf>,
        /// Path suffix to skip; repeatable
        #[arg(long)]
        ignore: Vec<String>,
    },
}

#[derive(Subcommand, Debug)]
enum VerifyCommand {
    /// Verify an artifacts attestation
    Artifacts {
        #[arg(default_value = "-")]
        token: String,
        #[arg(long)]
        public_keys: Option<String>,
        /// Digest that must be covered
        #[arg(long)]
        digest: Option<String>,
    },
    /// Verify a manifests attestation against a directory
    Manifests {
        directory: PathBuf,
        #[arg(default_value = "-")]
        token: String,
        #[arg(long)]
        public_keys: Option<String>,
        #[arg(long)]
        audience: Option<String>,
        #[arg(long)]
        ignore: Vec<String>,
    },
}

fn pick<T>(flag: Option<T>, configured: Option<T>, what: &str) -> Result<T> {
    flag.or(configured)
        .ok_or_else(|| anyhow!("no {what} given (pass a flag or set it in the config)"))
}

fn pick_list(flag: Vec<String>, configured: &[String]) -> Vec<String> {
    if flag.is_empty() {
        configured.to_vec()
    } else {
        flag
    }
}

async fn read_token(source: &str) -> Result<String> {
    let bytes = commands::read_source(source, ContentKind::Jwt).await?;
    let token = String::from_utf8(bytes).context("token is not UTF-8")?;
    Ok(token.trim().to_string())
}

async fn read_key_set(source: Option<String>, configured: &Option<String>) -> Result<Vec<u8>> {
    let source = pick(source, configured.clone(), "public key set")?;
    commands::read_source(&source, ContentKind::KeySet).await
}

fn read_private(flag: Option<PathBuf>, config: &Config) -> Result<Vec<u8>> {
    let path = pick(flag, config.signing_key.clone(), "signing key")?;
    std::fs::read(&path).with_context(|| format!("reading {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let log_level = if args.verbose { Level::DEBUG } else { Level::INFO };
    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let config = Config::load_from(&args.config);
    debug!(?config, "effective config");

    match args.command {
        Command::Keygen { kind } => match kind {
            KeygenCommand::Signing {
                issuer,
                public,
                private,
            } => {
                let issuer = pick(issuer, config.issuer.clone(), "issuer")?;
                let kid = commands::keygen_signing(&issuer, &public, &private)?;
                println!("{kid}");
            }
            KeygenCommand::Encryption { public, private } => {
                let kid = commands::keygen_encryption(&public, &private)?;
                println!("{kid}");
            }
        },

        Command::License { action } => match action {
            LicenseCommand::Issue {
                subject,
                audience,
                days,
                capability,
                key,
            } => {
                let private = read_private(key, &config)?;
                let request = LicenseRequest {
                    subject,
                    audience: pick_list(audience, &config.audience),
                    validity: commands::validity_days(days)?,
                    capabilities: capability,
                };
                println!("{}", commands::issue_license(&private, request)?);
            }
            LicenseCommand::Verify {
                token,
                public_keys,
                audience,
                capability,
                revocations,
            } => {
                let token = read_token(&token).await?;
                let public = read_key_set(public_keys, &config.public_keys).await?;
                let ledger = match revocations.or(config.revocations.clone()) {
                    Some(source) => {
                        let bytes = commands::read_source(&source, ContentKind::Any).await?;
                        Some(RevocationList::from_json(&bytes)?)
                    }
                    None => None,
                };
                let check = LicenseCheck {
                    audience: audience.as_deref().or(config.primary_audience()),
                    capability: capability.as_deref(),
                    revocations: ledger.as_ref(),
                    leeway: config.leeway(),
                };
                let license = commands::verify_license(&token, &public, &check)?;
                println!("{}", serde_json::to_string_pretty(license.claims())?);
            }
        },

        Command::Attest { kind } => match kind {
            AttestCommand::Artifacts {
                digests,
                audience,
                key,
            } => {
                let private = read_private(key, &config)?;
                let configured = config.primary_audience().map(str::to_string);
                let audience = pick(audience, configured, "audience")?;
                println!("{}", commands::attest_artifacts(&private, &audience, digests)?);
            }
            AttestCommand::Manifests {
                directory,
                audience,
                key,
                ignore,
            } => {
                let private = read_private(key, &config)?;
                let configured = config.primary_audience().map(str::to_string);
                let audience = pick(audience, configured, "audience")?;
                let ignore = pick_list(ignore, &config.ignore_patterns);
                let (token, files) =
                    commands::attest_manifests(&private, &audience, &directory, &ignore)?;
                for file in &files {
                    eprintln!("  {file}");
                }
                println!("{token}");
            }
        },

        Command::Verify { kind } => match kind {
            VerifyCommand::Artifacts {
                token,
                public_keys,
                digest,
            } => {
                let token = read_token(&token).await?;
                let public = read_key_set(public_keys, &config.public_keys).await?;
                let attestation = commands::verify_artifacts(&token, &public, digest.as_deref())?;
                println!("{}", serde_json::to_string_pretty(attestation.claims())?);
            }
            VerifyCommand::Manifests {
                directory,
                token,
                public_keys,
                audience,
                ignore,
            } => {
                let token = read_token(&token).await?;
                let public = read_key_set(public_keys, &config.public_keys).await?;
                let audience = audience
                    .or(config.primary_audience().map(str::to_string))
                    .unwrap_or_default();
                let ignore = pick_list(ignore, &config.ignore_patterns);
                let files =
                    commands::verify_manifests(&token, &public, &audience, &directory, &ignore)?;
                println!("verified {} files", files.len());
            }
        },

        Command::Revoke {
            ids,
            ledger,
            issuer,
        } => {
            let configured = config.revocations.as_ref().map(PathBuf::from);
            let path = pick(ledger, configured, "ledger")?;
            let issuer = pick(issuer, config.issuer.clone(), "issuer")?;
            let count = commands::revoke(&path, &issuer, &ids)?;
            println!("revoked {count} ids in {}", path.display());
        }

        Command::Encrypt { input, keys, kid } => {
            let keys_path = pick(keys, config.encryption_keys.clone(), "encryption key set")?;
            let public = std::fs::read(&keys_path)
                .with_context(|| format!("reading {}", keys_path.display()))?;
            let payload = commands::read_source(&input, ContentKind::Any).await?;
            println!("{}", commands::encrypt(&payload, &public, &kid)?);
        }

        Command::Decrypt { input, keys } => {
            let keys_path = pick(keys, config.encryption_keys.clone(), "encryption key set")?;
            let private = std::fs::read(&keys_path)
                .with_context(|| format!("reading {}", keys_path.display()))?;
            let token = commands::read_source(&input, ContentKind::Jwe).await?;
            let plaintext = commands::decrypt(&token, &private)?;
            std::io::stdout().write_all(&plaintext)?;
        }
    }

    Ok(())
}
