//! Zstd compressed tar archives (`.tar.zst`)

use super::tar::TarArchive;
use super::{expect_magic, Archive};
use crate::close::{Closer, Drain};
use crate::level::EncoderLevel;
use crate::{Error, Phase, Result};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tracing::debug;
use zstd::stream::read::Decoder;
use zstd::stream::write::Encoder;

/// Frame magic number, little endian
const MAGIC: [u8; 4] = [0x28, 0xB5, 0x2F, 0xFD];

/// Skippable frames use 0x184D2A50..=0x184D2A5F
const SKIPPABLE_MAGIC_MASK: u32 = 0xFFFF_FFF0;
const SKIPPABLE_MAGIC: u32 = 0x184D_2A50;

fn is_zstd_magic(head: &[u8; 4]) -> bool {
    *head == MAGIC || u32::from_le_bytes(*head) & SKIPPABLE_MAGIC_MASK == SKIPPABLE_MAGIC
}

/// Tar archive compressed with zstd on the fly
#[derive(Debug, Clone)]
pub struct ZstdArchive {
    root: PathBuf,
    level: EncoderLevel,
    skip_symlinks: bool,
}

impl ZstdArchive {
    /// Create an archive that reads and writes `.tar.zst` streams.
    ///
    /// `compression_level` is on the standard zstd scale; negative values
    /// select the encoder default. The level is mapped once, here.
    pub fn new(root: impl Into<PathBuf>, skip_symlinks: bool, compression_level: i32) -> Self {
        Self {
            root: root.into(),
            level: EncoderLevel::from_zstd(compression_level),
            skip_symlinks,
        }
    }

    /// Encoder tier mapped at construction
    pub fn level(&self) -> EncoderLevel {
        self.level
    }

    fn tar(&self) -> TarArchive {
        TarArchive::new(self.root.clone(), self.skip_symlinks)
    }
}

impl Archive for ZstdArchive {
    fn create(&self, srcs: &[PathBuf], w: &mut dyn Write) -> Result<u64> {
        debug!(level = ?self.level, "Opening zstd encoder");
        let encoder = Encoder::new(w, self.level.to_zstd()).map_err(Error::EncoderConstruction)?;
        let mut encoder = Closer::new(encoder, "zstd writer");

        self.tar().create(srcs, &mut *encoder)
    }

    fn extract(&self, dst: &Path, r: &mut dyn Read) -> Result<u64> {
        let r = expect_magic(r, "zstd", is_zstd_magic).map_err(Error::DecoderConstruction)?;
        let decoder = Decoder::new(r).map_err(Error::DecoderConstruction)?;
        let mut decoder = Closer::new(Drain(decoder), "zstd reader");

        let written = self.tar().extract(dst, &mut *decoder)?;

        // A frame cut short only shows once the decoder reaches its end
        decoder
            .close()
            .map_err(|e| Error::from(e).during(Phase::Extract, written))?;

        Ok(written)
    }
}
