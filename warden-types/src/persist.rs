//! File writes with explicit permission bits.
//!
//! Key sets holding private material are written `0600`; public key sets and
//! revocation ledgers are written `0644`. Permission bits are only applied on
//! Unix; elsewhere the platform default is kept.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::Path;

use tempfile::NamedTempFile;

/// Permission class of a persisted file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileMode {
    /// Owner read/write only (`0600`).
    Secret,
    /// World readable (`0644`).
    Public,
}

impl FileMode {
    /// Returns the Unix permission bits for this mode.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Secret => 0o600,
            Self::Public => 0o644,
        }
    }
}

fn open_options(mode: FileMode) -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.write(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        opts.mode(mode.bits());
    }
    #[cfg(not(unix))]
    let _ = mode;
    opts
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: FileMode) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode.bits()))
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: FileMode) -> io::Result<()> {
    Ok(())
}

/// Writes `contents` to a file that must not exist yet.
///
/// Fails with [`io::ErrorKind::AlreadyExists`] if `path` exists; the existing
/// file is left untouched.
pub fn create_new(path: &Path, contents: &[u8], mode: FileMode) -> io::Result<()> {
    let mut file = open_options(mode).create_new(true).open(path)?;
    file.write_all(contents)?;
    file.sync_all()
}

/// Replaces `path` with `contents`.
///
/// The data goes to a temporary file in the same directory that already
/// carries `mode` and is then renamed over `path`; the bits of a previous
/// file never apply to the new content.
pub fn overwrite(path: &Path, contents: &[u8], mode: FileMode) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = NamedTempFile::new_in(dir)?;
    apply_mode(file.path(), mode)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
