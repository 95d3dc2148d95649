//! cachepack - streaming cache archives
//!
//! This library serializes a set of filesystem paths into a tar stream and
//! compresses it on the fly into any [`std::io::Write`] sink, and restores such
//! a stream from any [`std::io::Read`] source. Nothing is buffered in memory
//! beyond the codec windows.

pub mod archive;
pub mod close;
pub mod config;
pub mod error;
pub mod level;
pub mod security;

pub use error::{Error, Phase, Result};

// Re-export commonly used types
pub use archive::{
    from_format, gzip::GzipArchive, tar::TarArchive, zstd::ZstdArchive, Archive, Format, Options,
};
pub use level::{EncoderLevel, UNSPECIFIED_LEVEL};
