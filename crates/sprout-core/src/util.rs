//! Path safety and file helpers shared by storage and archive code

use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

/// Errors related to path validation
#[derive(Error, Debug)]
pub enum PathError {
    #[error("Path traversal attempt detected: {0}")]
    TraversalAttempt(String),

    #[error("Path escapes root directory: {0}")]
    EscapesRoot(String),

    #[error("Invalid path component: {0}")]
    InvalidComponent(String),
}

/// Join an untrusted relative path onto `root`, refusing anything that
/// would land outside of it
///
/// # Errors
/// Returns an error if the path would escape the root directory
pub fn safe_join(root: &Path, untrusted_path: &Path) -> Result<PathBuf, PathError> {
    let normalized = normalize_path(untrusted_path)?;
    if normalized.as_os_str().is_empty() {
        return Err(PathError::InvalidComponent("Empty path".to_string()));
    }

    let joined = root.join(&normalized);
    verify_under_root(root, &joined)?;

    Ok(joined)
}

/// Normalize a path by removing `.` and resolvable `..` components
fn normalize_path(path: &Path) -> Result<PathBuf, PathError> {
    let mut normalized = PathBuf::new();
    let mut depth: i32 = 0;

    for component in path.components() {
        match component {
            Component::Normal(c) => {
                if c.to_string_lossy().contains('\0') {
                    return Err(PathError::InvalidComponent(
                        "Null byte in path".to_string(),
                    ));
                }
                normalized.push(c);
                depth += 1;
            }
            Component::CurDir => {}
            Component::ParentDir => {
                if depth > 0 {
                    normalized.pop();
                    depth -= 1;
                } else {
                    return Err(PathError::TraversalAttempt(path.display().to_string()));
                }
            }
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathError::InvalidComponent(
                    "Absolute path not allowed".to_string(),
                ));
            }
        }
    }

    Ok(normalized)
}

/// Verify that a joined path is still under the given root.
///
/// Canonicalization is only possible when both paths exist; otherwise the
/// normalization above already rejected escaping components.
fn verify_under_root(root: &Path, path: &Path) -> Result<(), PathError> {
    if root.exists() && path.exists() {
        let canonical_root = root
            .canonicalize()
            .map_err(|_| PathError::EscapesRoot(path.display().to_string()))?;
        let canonical_path = path
            .canonicalize()
            .map_err(|_| PathError::EscapesRoot(path.display().to_string()))?;

        if !canonical_path.starts_with(&canonical_root) {
            return Err(PathError::EscapesRoot(path.display().to_string()));
        }
    } else if !path.starts_with(root) {
        return Err(PathError::EscapesRoot(path.display().to_string()));
    }

    Ok(())
}

/// Validate a single file name (an upload name) for use in paths
///
/// # Errors
/// Returns an error if the name is empty, hidden, or contains separators
pub fn validate_file_name(name: &str) -> Result<(), PathError> {
    if name.is_empty() {
        return Err(PathError::InvalidComponent("Empty name".to_string()));
    }

    if name.contains('/') || name.contains('\\') {
        return Err(PathError::TraversalAttempt(format!(
            "Name contains path separator: {name}"
        )));
    }

    if name.contains("..") {
        return Err(PathError::TraversalAttempt(format!(
            "Name contains parent directory reference: {name}"
        )));
    }

    if name.starts_with('.') {
        return Err(PathError::InvalidComponent(format!(
            "Name cannot start with dot: {name}"
        )));
    }

    if name.contains('\0') {
        return Err(PathError::InvalidComponent(
            "Name contains null byte".to_string(),
        ));
    }

    Ok(())
}

/// Hex-encoded SHA-256 of a byte slice
#[must_use]
pub fn sha256_hex(content: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content);
    hex::encode(hasher.finalize())
}

/// Move a file or directory tree, falling back to copy + remove when a
/// plain rename is not possible (e.g. across filesystems).
///
/// `check` runs before every file copied on the fallback path, so callers
/// can abort long copies.
///
/// # Errors
/// Returns an error if neither rename nor copy succeeds, or `check` fails
pub fn move_path<F>(from: &Path, to: &Path, check: &mut F) -> io::Result<()>
where
    F: FnMut() -> io::Result<()>,
{
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }

    if fs::rename(from, to).is_ok() {
        return Ok(());
    }

    if from.is_dir() {
        copy_dir_all(from, to, check)?;
        fs::remove_dir_all(from)
    } else {
        check()?;
        fs::copy(from, to)?;
        fs::remove_file(from)
    }
}

/// Recursively copy a directory. Symlinks are skipped.
///
/// # Errors
/// Returns an error if any entry cannot be read or written
pub fn copy_dir_all<F>(from: &Path, to: &Path, check: &mut F) -> io::Result<()>
where
    F: FnMut() -> io::Result<()>,
{
    fs::create_dir_all(to)?;

    for entry in WalkDir::new(from).follow_links(false) {
        let entry = entry.map_err(io::Error::other)?;
        let relative = entry
            .path()
            .strip_prefix(from)
            .map_err(io::Error::other)?;
        let target = to.join(relative);

        if entry.file_type().is_dir() {
            fs::create_dir_all(&target)?;
        } else if entry.file_type().is_file() {
            check()?;
            fs::copy(entry.path(), &target)?;
        }
    }

    Ok(())
}

/// Remove a file or directory if it exists
///
/// # Errors
/// Returns an error if the path exists but cannot be removed
pub fn remove_path(path: &Path) -> io::Result<()> {
    match fs::symlink_metadata(path) {
        Ok(meta) if meta.is_dir() => fs::remove_dir_all(path),
        Ok(_) => fs::remove_file(path),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e),
    }
}
