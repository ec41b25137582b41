//! Directory tree hashing for manifest attestations.
//!
//! Every regular file under the root is hashed individually; the sorted
//! list of `<sha256-hex>  <relative/path>` lines is then hashed again to
//! give one `sha256:<hex>` checksum for the whole tree. Adding, removing,
//! renaming or editing any covered file changes the checksum.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::debug;

use crate::error::{ClaimError, ClaimResult};

/// Algorithm prefix of directory checksums.
pub const CHECKSUM_ALGORITHM: &str = "sha256";

/// Result of hashing a directory tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryHash {
    /// `sha256:<hex>` over the per-file summary.
    pub checksum: String,
    /// Slash-separated relative paths of the covered files, sorted.
    pub files: Vec<String>,
}

/// Hashes every file under `root` whose relative path does not end with
/// one of `ignore_patterns`.
pub fn hash_directory(root: &Path, ignore_patterns: &[String]) -> ClaimResult<DirectoryHash> {
    let metadata = fs::metadata(root)?;
    if !metadata.is_dir() {
        return Err(ClaimError::NotADirectory(root.to_path_buf()));
    }

    let mut files = Vec::new();
    let mut visited = HashSet::new();
    walk(root, root, ignore_patterns, &mut visited, &mut files)?;
    files.sort();

    let mut summary = String::new();
    for rel in &files {
        let content = fs::read(root.join(rel))?;
        summary.push_str(&hex::encode(Sha256::digest(&content)));
        summary.push_str("  ");
        summary.push_str(rel);
        summary.push('\n');
    }
    let checksum = format!(
        "{CHECKSUM_ALGORITHM}:{}",
        hex::encode(Sha256::digest(summary.as_bytes()))
    );

    debug!(root = %root.display(), files = files.len(), %checksum, "hashed directory");
    Ok(DirectoryHash { checksum, files })
}

fn walk(
    root: &Path,
    dir: &Path,
    ignore_patterns: &[String],
    visited: &mut HashSet<PathBuf>,
    files: &mut Vec<String>,
) -> ClaimResult<()> {
    // symlinked directories are followed once
    if !visited.insert(fs::canonicalize(dir)?) {
        return Ok(());
    }

    // sorted; a linked directory is covered under its first name
    let mut entries = fs::read_dir(dir)?
        .map(|entry| entry.map(|e| e.path()))
        .collect::<Result<Vec<_>, _>>()?;
    entries.sort();

    for path in entries {
        if fs::metadata(&path)?.is_dir() {
            walk(root, &path, ignore_patterns, visited, files)?;
            continue;
        }

        let rel = relative_path(root, &path)?;
        if is_ignored(&rel, ignore_patterns) {
            continue;
        }
        files.push(rel);
    }
    Ok(())
}

fn relative_path(root: &Path, path: &Path) -> ClaimResult<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|_| ClaimError::InvalidPath(path.display().to_string()))?;

    let mut parts = Vec::new();
    for component in rel.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| ClaimError::InvalidPath(rel.display().to_string()))?;
        parts.push(part);
    }
    let joined = parts.join("/");
    if joined.contains('\n') {
        return Err(ClaimError::InvalidPath(joined));
    }
    Ok(joined)
}

fn is_ignored(rel: &str, ignore_patterns: &[String]) -> bool {
    ignore_patterns
        .iter()
        .any(|pattern| !pattern.is_empty() && rel.ends_with(pattern.as_str()))
}
