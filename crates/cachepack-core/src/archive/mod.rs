//! Archive operations module
//!
//! [`TarArchive`](tar::TarArchive) turns a list of paths into a tar stream and
//! back. [`ZstdArchive`](zstd::ZstdArchive) and [`GzipArchive`](gzip::GzipArchive)
//! put a compression codec in front of it; all three share the [`Archive`] trait.

pub mod gzip;
pub mod tar;
pub mod zstd;

use crate::level::UNSPECIFIED_LEVEL;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Cursor, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::debug;

/// A streaming archive format
pub trait Archive: Send + Sync {
    /// Write `srcs` into `w` as one archive, returning the logical bytes written
    fn create(&self, srcs: &[PathBuf], w: &mut dyn Write) -> Result<u64>;

    /// Restore the archive read from `r` below `dst`, returning the bytes restored
    fn extract(&self, dst: &Path, r: &mut dyn Read) -> Result<u64>;
}

/// Supported archive formats
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// Plain tar
    Tar,
    /// Gzip compressed tar
    #[serde(alias = "gz")]
    Gzip,
    /// Zstd compressed tar
    #[default]
    #[serde(alias = "zst")]
    Zstd,
}

impl Format {
    /// Format name as accepted by [`FromStr`]
    pub const fn as_str(self) -> &'static str {
        match self {
            Format::Tar => "tar",
            Format::Gzip => "gzip",
            Format::Zstd => "zstd",
        }
    }

    /// Conventional file extension
    pub const fn extension(self) -> &'static str {
        match self {
            Format::Tar => "tar",
            Format::Gzip => "tar.gz",
            Format::Zstd => "tar.zst",
        }
    }

    /// Detect the format from a file name
    pub fn from_path(path: &Path) -> Option<Format> {
        let name = path.file_name()?.to_string_lossy().to_lowercase();

        if name.ends_with(".tar.zst") || name.ends_with(".tzst") {
            Some(Format::Zstd)
        } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Format::Gzip)
        } else if name.ends_with(".tar") {
            Some(Format::Tar)
        } else {
            None
        }
    }
}

impl fmt::Display for Format {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "tar" => Ok(Format::Tar),
            "gzip" | "gz" | "tar.gz" | "tgz" => Ok(Format::Gzip),
            "zstd" | "zst" | "tar.zst" | "tzst" => Ok(Format::Zstd),
            other => Err(Error::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Construction-time settings shared by every format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Options {
    /// Level on the codec's standard scale, negative for the default
    pub compression_level: i32,
    /// Leave symlinks out of created archives
    pub skip_symlinks: bool,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            compression_level: UNSPECIFIED_LEVEL,
            skip_symlinks: false,
        }
    }
}

/// Build the archive implementation for `format`
pub fn from_format(format: Format, root: impl Into<PathBuf>, options: Options) -> Box<dyn Archive> {
    let root = root.into();
    debug!(%format, root = ?root, ?options, "Selecting archive implementation");

    match format {
        Format::Tar => Box::new(tar::TarArchive::new(root, options.skip_symlinks)),
        Format::Gzip => Box::new(gzip::GzipArchive::new(
            root,
            options.skip_symlinks,
            options.compression_level,
        )),
        Format::Zstd => Box::new(zstd::ZstdArchive::new(
            root,
            options.skip_symlinks,
            options.compression_level,
        )),
    }
}

const MAGIC_LEN: usize = 4;

/// Reader that replays the already checked header bytes
pub(crate) type Sniffed<'a> = io::Chain<Cursor<[u8; MAGIC_LEN]>, &'a mut dyn Read>;

/// Read the leading bytes of `r` and check them before any decoder sees the stream
pub(crate) fn expect_magic<'a>(
    r: &'a mut dyn Read,
    codec: &str,
    is_magic: fn(&[u8; MAGIC_LEN]) -> bool,
) -> io::Result<Sniffed<'a>> {
    let mut head = [0u8; MAGIC_LEN];
    r.read_exact(&mut head).map_err(|e| {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("stream too short for a {} header", codec),
            )
        } else {
            e
        }
    })?;

    if !is_magic(&head) {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("missing {} header, found {:02x?}", codec, head),
        ));
    }

    Ok(Cursor::new(head).chain(r))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_from_str() {
        assert_eq!("tar".parse::<Format>().unwrap(), Format::Tar);
        assert_eq!("GZ".parse::<Format>().unwrap(), Format::Gzip);
        assert_eq!("zst".parse::<Format>().unwrap(), Format::Zstd);
        assert!(matches!(
            "rar".parse::<Format>(),
            Err(Error::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn test_format_from_path() {
        assert_eq!(
            Format::from_path(Path::new("cache/deps.tar.zst")),
            Some(Format::Zstd)
        );
        assert_eq!(Format::from_path(Path::new("deps.TGZ")), Some(Format::Gzip));
        assert_eq!(Format::from_path(Path::new("deps.tar")), Some(Format::Tar));
        assert_eq!(Format::from_path(Path::new("deps.zip")), None);
    }

    #[test]
    fn test_extension_round_trips_through_from_path() {
        for format in [Format::Tar, Format::Gzip, Format::Zstd] {
            let name = format!("cache.{}", format.extension());
            assert_eq!(Format::from_path(Path::new(&name)), Some(format));
        }
    }

    #[test]
    fn test_expect_magic_replays_header() {
        let data = b"MAGIC-and-the-rest".to_vec();
        let mut source: &[u8] = &data;
        let mut sniffed = expect_magic(&mut source, "test", |h| h == b"MAGI").unwrap();

        let mut out = Vec::new();
        sniffed.read_to_end(&mut out).unwrap();
        assert_eq!(out, data);
    }

    #[test]
    fn test_expect_magic_rejects_short_and_wrong_input() {
        let mut short: &[u8] = b"MA";
        let err = expect_magic(&mut short, "test", |_| true).map(drop).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let mut wrong: &[u8] = b"NOPE";
        let err = expect_magic(&mut wrong, "test", |h| h == b"MAGI").map(drop).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
