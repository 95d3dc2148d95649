//! Gzip compressed tar archives (`.tar.gz`)

use super::tar::TarArchive;
use super::{expect_magic, Archive};
use crate::close::{Closer, Drain};
use crate::level::gzip_level;
use crate::{Error, Phase, Result};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;

fn is_gzip_magic(head: &[u8; 4]) -> bool {
    head[0] == 0x1F && head[1] == 0x8B
}

/// Tar archive compressed with gzip on the fly
#[derive(Debug, Clone)]
pub struct GzipArchive {
    root: PathBuf,
    level: Compression,
    skip_symlinks: bool,
}

impl GzipArchive {
    /// Create an archive that reads and writes `.tar.gz` streams.
    ///
    /// Negative `compression_level` values select the gzip default.
    pub fn new(root: impl Into<PathBuf>, skip_symlinks: bool, compression_level: i32) -> Self {
        Self {
            root: root.into(),
            level: gzip_level(compression_level),
            skip_symlinks,
        }
    }

    /// Gzip level mapped at construction
    pub fn level(&self) -> Compression {
        self.level
    }

    fn tar(&self) -> TarArchive {
        TarArchive::new(self.root.clone(), self.skip_symlinks)
    }
}

impl Archive for GzipArchive {
    fn create(&self, srcs: &[PathBuf], w: &mut dyn Write) -> Result<u64> {
        debug!(level = self.level.level(), "Opening gzip encoder");
        let mut encoder = Closer::new(GzEncoder::new(w, self.level), "gzip writer");

        self.tar().create(srcs, &mut *encoder)
    }

    fn extract(&self, dst: &Path, r: &mut dyn Read) -> Result<u64> {
        let r = expect_magic(r, "gzip", is_gzip_magic).map_err(Error::DecoderConstruction)?;
        let mut decoder = Closer::new(Drain(GzDecoder::new(r)), "gzip reader");

        let written = self.tar().extract(dst, &mut *decoder)?;

        decoder
            .close()
            .map_err(|e| Error::from(e).during(Phase::Extract, written))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_is_mapped_at_construction() {
        assert_eq!(GzipArchive::new(".", false, -1).level(), Compression::default());
        assert_eq!(GzipArchive::new(".", false, 1).level(), Compression::fast());
        assert_eq!(GzipArchive::new(".", false, 99).level(), Compression::best());
    }

    #[test]
    fn test_empty_source_list_is_still_framed() {
        let mut out = Vec::new();
        let written = GzipArchive::new(".", false, 6).create(&[], &mut out).unwrap();

        assert_eq!(written, 0);
        assert_eq!(&out[..2], &[0x1F, 0x8B]);
    }
}
