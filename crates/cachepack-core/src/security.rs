//! Path checks for safe extraction

use crate::{Error, Result};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::error;

/// Sanitize and validate a path to prevent directory traversal attacks
///
/// The check is purely lexical; the result is `base` joined with the normal
/// components of `untrusted`.
pub fn sanitize_path(base: &Path, untrusted: &Path) -> Result<PathBuf> {
    let mut result = base.to_path_buf();

    for component in untrusted.components() {
        match component {
            Component::Normal(name) => {
                result.push(name);
            }
            Component::CurDir => {}
            Component::ParentDir => {
                error!(path = ?untrusted, "Path contains parent directory component");
                return Err(Error::InvalidPath(format!(
                    "Path traversal attempt detected: {:?}",
                    untrusted
                )));
            }
            Component::RootDir => {
                error!(path = ?untrusted, "Path is absolute");
                return Err(Error::InvalidPath(format!(
                    "Absolute path not allowed: {:?}",
                    untrusted
                )));
            }
            Component::Prefix(_) => {
                error!(path = ?untrusted, "Path contains Windows prefix");
                return Err(Error::InvalidPath(format!(
                    "Windows path prefix not allowed: {:?}",
                    untrusted
                )));
            }
        }
    }

    Ok(result)
}

/// Refuse to write `target` through a symlink that already exists below `base`.
///
/// An earlier entry may have planted `base/link -> /elsewhere`; a later entry
/// named `link/file` would otherwise land outside `base`.
pub fn ensure_no_symlink_ancestors(base: &Path, target: &Path) -> Result<()> {
    let relative = target.strip_prefix(base).map_err(|_| {
        Error::InvalidPath(format!("{:?} is not inside {:?}", target, base))
    })?;

    let mut current = base.to_path_buf();
    let mut components = relative.components().peekable();
    while let Some(component) = components.next() {
        if components.peek().is_none() {
            break;
        }
        current.push(component);

        match fs::symlink_metadata(&current) {
            Ok(metadata) if metadata.file_type().is_symlink() => {
                error!(path = ?target, link = ?current, "Entry would be written through a symlink");
                return Err(Error::InvalidPath(format!(
                    "Path would escape extraction directory through symlink {:?}: {:?}",
                    current, target
                )));
            }
            Ok(_) => {}
            // Nothing further down can exist yet
            Err(_) => break,
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_sanitize_path_normal() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let path = Path::new("subdir/./file.txt");
        let result = sanitize_path(base, path).unwrap();
        assert_eq!(result, base.join("subdir/file.txt"));
    }

    #[test]
    fn test_sanitize_path_parent_dir() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let path = Path::new("../etc/passwd");
        assert!(sanitize_path(base, path).is_err());
    }

    #[test]
    fn test_sanitize_path_absolute() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        let path = Path::new("/etc/passwd");
        assert!(sanitize_path(base, path).is_err());
    }

    #[test]
    fn test_plain_ancestors_are_accepted() {
        let temp_dir = TempDir::new().unwrap();
        let base = temp_dir.path();
        fs::create_dir_all(base.join("a/b")).unwrap();

        assert!(ensure_no_symlink_ancestors(base, &base.join("a/b/c.txt")).is_ok());
        assert!(ensure_no_symlink_ancestors(base, &base.join("new/dir/c.txt")).is_ok());
    }

    #[cfg(unix)]
    #[test]
    fn test_symlink_ancestor_is_rejected() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let base = temp_dir.path();
        std::os::unix::fs::symlink(outside.path(), base.join("link")).unwrap();

        assert!(ensure_no_symlink_ancestors(base, &base.join("link/file.txt")).is_err());
        // Replacing the link itself is fine
        assert!(ensure_no_symlink_ancestors(base, &base.join("link")).is_ok());
    }
}
