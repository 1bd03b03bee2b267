//! File relocation used for stage handoff and output organization
//!
//! Artifacts move between the input, intermediate and output trees with a plain
//! rename. When the trees live on different filesystems the rename fails with
//! `EXDEV`; the move then falls back to copy, fsync, remove.

use std::fs;
use std::io;
use std::path::Path;

/// How a [`move_file`] call was carried out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MoveResult {
    /// The rename crossed filesystems and was replaced by copy + remove
    pub used_cross_filesystem_fallback: bool,
}

/// Move `from` to `to`, replacing any existing file at `to`.
///
/// The parent directory of `to` must already exist.
pub fn move_file(from: &Path, to: &Path) -> io::Result<MoveResult> {
    match fs::rename(from, to) {
        Ok(()) => Ok(MoveResult::default()),
        Err(e) if is_cross_filesystem_error(&e) => {
            cross_filesystem_move(from, to)?;
            Ok(MoveResult {
                used_cross_filesystem_fallback: true,
            })
        }
        Err(e) => Err(e),
    }
}

/// True if `path` exists and is a regular file (symlinks are followed).
#[must_use]
pub fn is_regular_file(path: &Path) -> bool {
    fs::metadata(path).map(|m| m.is_file()).unwrap_or(false)
}

/// Create `path` and its parents if missing; fails if it exists as a non-directory.
pub fn ensure_dir(path: &Path) -> io::Result<()> {
    fs::create_dir_all(path)?;
    if fs::metadata(path)?.is_dir() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::AlreadyExists,
            format!("{} exists and is not a directory", path.display()),
        ))
    }
}

#[cfg(unix)]
fn is_cross_filesystem_error(err: &io::Error) -> bool {
    err.raw_os_error() == Some(18) // EXDEV on Linux/macOS
}

#[cfg(windows)]
fn is_cross_filesystem_error(err: &io::Error) -> bool {
    err.raw_os_error() == Some(17) // ERROR_NOT_SAME_DEVICE
}

#[cfg(not(any(unix, windows)))]
fn is_cross_filesystem_error(_err: &io::Error) -> bool {
    false
}

fn cross_filesystem_move(from: &Path, to: &Path) -> io::Result<()> {
    fs::copy(from, to)?;
    fs::File::open(to)?.sync_all()?;
    fs::remove_file(from)
}
