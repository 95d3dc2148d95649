//! Common test fixtures for cachepack testing

use crate::TestDir;
use anyhow::Result;
use rand::{Rng, SeedableRng};

/// Creates a small dependency-cache style tree under `cache/`
pub fn create_cache_tree(test_dir: &TestDir) -> Result<()> {
    test_dir.create_file("cache/manifest.json", br#"{"name":"demo","version":"1.0.0"}"#)?;
    test_dir.create_file("cache/lib/index.js", b"module.exports = 42;\n")?;
    test_dir.create_file("cache/lib/util/strings.js", b"exports.trim = s => s.trim();\n")?;
    test_dir.create_dir("cache/empty")?;

    // Binary file (simple image placeholder)
    test_dir.create_file("cache/assets/logo.png", &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A])?;

    // Large compressible file
    let large_content = "x".repeat(1024 * 1024); // 1MB
    test_dir.create_file("cache/build.log", large_content.as_bytes())?;

    Ok(())
}

/// Total size of the regular files [`create_cache_tree`] writes
pub const CACHE_TREE_BYTES: u64 = 33 + 21 + 30 + 6 + 1024 * 1024;

/// Creates the cache tree plus symlinks (Unix only)
#[cfg(unix)]
pub fn create_symlink_tree(test_dir: &TestDir) -> Result<()> {
    create_cache_tree(test_dir)?;

    test_dir.create_symlink("lib/index.js", "cache/main.js")?;
    test_dir.create_symlink("../manifest.json", "cache/lib/manifest.json")?;
    test_dir.create_symlink("util", "cache/lib/helpers")?;

    Ok(())
}

/// Deterministic incompressible bytes
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; len];
    rng.fill(&mut data[..]);
    data
}

#[cfg(test)]
mod tests {
    use super::*;
    use walkdir::WalkDir;

    #[test]
    fn test_cache_tree_byte_total() {
        let test_dir = TestDir::new().unwrap();
        create_cache_tree(&test_dir).unwrap();

        let total: u64 = WalkDir::new(test_dir.path())
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.metadata().unwrap().len())
            .sum();
        assert_eq!(total, CACHE_TREE_BYTES);
    }

    #[test]
    fn test_random_bytes_are_deterministic() {
        assert_eq!(random_bytes(64, 7), random_bytes(64, 7));
        assert_ne!(random_bytes(64, 7), random_bytes(64, 8));
    }
}
