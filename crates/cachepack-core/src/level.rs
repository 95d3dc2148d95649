//! Compression level normalization
//!
//! Callers speak the usual zstd/gzip scale (1 fastest, higher is smaller) and
//! use a negative value for "no preference". Each codec gets exactly one
//! internal level, computed when an archive is constructed.

use flate2::Compression;
use tracing::{debug, warn};

/// Level value meaning "no explicit preference"
pub const UNSPECIFIED_LEVEL: i32 = -1;

/// Highest level gzip understands
const GZIP_MAX_LEVEL: u32 = 9;

/// Zstd encoder speed tier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum EncoderLevel {
    /// Roughly zstd level 1
    Fastest,
    /// Roughly zstd level 3
    #[default]
    Default,
    /// Roughly zstd level 7
    Better,
    /// Roughly zstd level 11
    Best,
}

impl EncoderLevel {
    /// Map a level on the standard zstd scale onto an encoder tier.
    ///
    /// Negative input falls back to [`EncoderLevel::Default`].
    pub fn from_zstd(level: i32) -> Self {
        if level < 0 {
            note_default("zstd", level);
            return EncoderLevel::Default;
        }

        match level {
            0..=2 => EncoderLevel::Fastest,
            3..=5 => EncoderLevel::Default,
            6..=9 => EncoderLevel::Better,
            _ => EncoderLevel::Best,
        }
    }

    /// Native zstd level passed to the encoder
    pub fn to_zstd(self) -> i32 {
        match self {
            EncoderLevel::Fastest => 1,
            EncoderLevel::Default => zstd::DEFAULT_COMPRESSION_LEVEL,
            EncoderLevel::Better => 7,
            EncoderLevel::Best => 11,
        }
    }
}

/// Map a level on the standard gzip scale, clamping anything above 9
pub fn gzip_level(level: i32) -> Compression {
    if level < 0 {
        note_default("gzip", level);
        return Compression::default();
    }

    let level = level as u32;
    if level > GZIP_MAX_LEVEL {
        warn!(
            requested = level,
            max = GZIP_MAX_LEVEL,
            "gzip compression level out of range, clamping"
        );
        return Compression::new(GZIP_MAX_LEVEL);
    }

    Compression::new(level)
}

fn note_default(codec: &str, level: i32) {
    if level == UNSPECIFIED_LEVEL {
        debug!(codec, "no compression level requested, using codec default");
    } else {
        warn!(
            codec,
            requested = level,
            "invalid compression level, using codec default"
        );
    }
}
