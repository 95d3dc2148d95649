//! Common assertions for cachepack testing

use anyhow::Result;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Asserts that two trees hold the same relative paths, entry kinds,
/// file contents, and symlink targets. Symlinks are compared, not followed.
pub fn assert_trees_equal(expected: &Path, actual: &Path) -> Result<()> {
    let entries1 = collect_entries(expected)?;
    let entries2 = collect_entries(actual)?;

    assert_eq!(
        entries1, entries2,
        "Different entries under {:?} and {:?}",
        expected, actual
    );

    for relative in &entries1 {
        let path1 = expected.join(relative);
        let path2 = actual.join(relative);

        let meta1 = fs::symlink_metadata(&path1)?;
        let meta2 = fs::symlink_metadata(&path2)?;

        assert_eq!(
            meta1.file_type().is_symlink(),
            meta2.file_type().is_symlink(),
            "Symlink mismatch for {:?}",
            relative
        );
        assert_eq!(
            meta1.is_dir(),
            meta2.is_dir(),
            "Directory mismatch for {:?}",
            relative
        );

        if meta1.file_type().is_symlink() {
            assert_eq!(
                fs::read_link(&path1)?,
                fs::read_link(&path2)?,
                "Link target mismatch for {:?}",
                relative
            );
        } else if meta1.is_file() {
            assert_eq!(
                fs::read(&path1)?,
                fs::read(&path2)?,
                "Content mismatch for {:?}",
                relative
            );
        }
    }

    Ok(())
}

/// Asserts that nothing under `dir` is a symlink
pub fn assert_no_symlinks(dir: &Path) -> Result<()> {
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = entry?;
        assert!(
            !entry.path_is_symlink(),
            "Unexpected symlink {:?}",
            entry.path()
        );
    }
    Ok(())
}

/// Asserts that a file has specific permissions (Unix only)
#[cfg(unix)]
pub fn assert_file_permissions(path: &Path, expected: u32) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let metadata = fs::metadata(path)?;
    let mode = metadata.permissions().mode() & 0o777;

    assert_eq!(
        mode, expected,
        "Permission mismatch for {:?}: expected {:o}, got {:o}",
        path, expected, mode
    );

    Ok(())
}

/// Relative paths of everything below `dir`, sorted
pub fn collect_entries(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in WalkDir::new(dir).follow_links(false).min_depth(1) {
        let entry = entry?;
        entries.push(entry.path().strip_prefix(dir)?.to_path_buf());
    }

    entries.sort();
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TestDir;

    #[test]
    fn test_identical_trees_pass() {
        let a = TestDir::new().unwrap();
        let b = TestDir::new().unwrap();
        for dir in [&a, &b] {
            dir.create_file("x/y.txt", b"same").unwrap();
        }

        assert_trees_equal(a.path(), b.path()).unwrap();
    }

    #[test]
    #[should_panic(expected = "Content mismatch")]
    fn test_content_difference_is_caught() {
        let a = TestDir::new().unwrap();
        let b = TestDir::new().unwrap();
        a.create_file("y.txt", b"one").unwrap();
        b.create_file("y.txt", b"two").unwrap();

        let _ = assert_trees_equal(a.path(), b.path());
    }
}
