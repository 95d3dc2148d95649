//! Error types for cachepack-core

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Which half of the pipeline an error interrupted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Serializing sources into an archive
    Create,
    /// Restoring entries from an archive
    Extract,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Create => f.write_str("archive creation"),
            Phase::Extract => f.write_str("archive extraction"),
        }
    }
}

/// Core error types for the cachepack library
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation failed
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Directory walk failed
    #[error("Walk error: {0}")]
    Walk(#[from] walkdir::Error),

    /// The codec refused to set up an encoder; nothing was written
    #[error("create archive writer: {0}")]
    EncoderConstruction(#[source] std::io::Error),

    /// The input did not start with a valid codec header; nothing was read
    #[error("create archive reader: {0}")]
    DecoderConstruction(#[source] std::io::Error),

    /// A structural failure part way through an operation
    #[error("{phase} failed after {written} bytes: {source}")]
    Aborted {
        phase: Phase,
        written: u64,
        #[source]
        source: Box<Error>,
    },

    /// Invalid file or directory path
    #[error("Invalid path: {0}")]
    InvalidPath(String),

    /// The tar stream could not be parsed
    #[error("Archive not readable: {0}")]
    NotReadable(String),

    /// Tar entry type this library does not restore
    #[error("Unsupported entry type {kind:?} for {path:?}")]
    UnsupportedEntry { path: PathBuf, kind: char },

    /// Unsupported archive format
    #[error("Unsupported format: {0}")]
    UnsupportedFormat(String),

    /// Configuration-related error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl Error {
    /// Logical bytes processed before the error, zero when nothing moved
    pub fn bytes_written(&self) -> u64 {
        match self {
            Error::Aborted { written, .. } => *written,
            _ => 0,
        }
    }

    /// Tag an error with the phase it interrupted and the partial count.
    ///
    /// Errors that are already tagged pass through unchanged.
    pub(crate) fn during(self, phase: Phase, written: u64) -> Self {
        match self {
            Error::Aborted { .. } => self,
            other => Error::Aborted {
                phase,
                written,
                source: Box::new(other),
            },
        }
    }

    /// The innermost error, looking through `Aborted`
    pub fn root_cause(&self) -> &Error {
        match self {
            Error::Aborted { source, .. } => source.root_cause(),
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
