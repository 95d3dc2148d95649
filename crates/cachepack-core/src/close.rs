//! Scoped finalization for codec and tar streams
//!
//! Encoders only produce a valid stream once their trailer has been written,
//! and decoders only prove the input was complete once they reach EOF. A
//! [`Closer`] owns such a stream for the duration of one call and finalizes it
//! exactly once: explicitly through [`Closer::close`], or when it is dropped on
//! any other exit path. A drop only releases the stream, which for a reader
//! means reading nothing more. Drop-time failures are logged, never propagated.

use std::io::{self, Read, Write};
use std::ops::{Deref, DerefMut};
use tracing::error;

/// A stream with a fallible final step
pub trait Finalize: Sized {
    /// Flush and release the stream
    fn finalize(self) -> io::Result<()>;

    /// Release the stream on an exit path that already has its outcome
    fn release(self) -> io::Result<()> {
        self.finalize()
    }
}

impl<W: Write> Finalize for zstd::stream::write::Encoder<'_, W> {
    fn finalize(self) -> io::Result<()> {
        self.finish()?.flush()
    }
}

impl<W: Write> Finalize for flate2::write::GzEncoder<W> {
    fn finalize(self) -> io::Result<()> {
        self.finish()?.flush()
    }
}

/// Writes the end-of-archive marker; flushing is left to the codec underneath
impl<W: Write> Finalize for tar::Builder<W> {
    fn finalize(self) -> io::Result<()> {
        self.into_inner().map(drop)
    }
}

/// Decoder wrapper whose finalization reads the stream to its end.
///
/// A decoder that stops before its trailer never checks that the compressed
/// input was complete; draining it does.
pub struct Drain<R>(pub R);

impl<R: Read> Read for Drain<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

impl<R: Read> Finalize for Drain<R> {
    fn finalize(mut self) -> io::Result<()> {
        io::copy(&mut self.0, &mut io::sink())?;
        Ok(())
    }

    /// Drops the decoder without pulling any more input
    fn release(self) -> io::Result<()> {
        Ok(())
    }
}

/// Guard that finalizes its stream exactly once
pub struct Closer<T: Finalize> {
    inner: Option<T>,
    label: &'static str,
}

impl<T: Finalize> Closer<T> {
    /// Take ownership of `inner`; `label` names it in diagnostics
    pub fn new(inner: T, label: &'static str) -> Self {
        Self {
            inner: Some(inner),
            label,
        }
    }

    /// Finalize now and return the outcome instead of logging it
    pub fn close(mut self) -> io::Result<()> {
        match self.inner.take() {
            Some(inner) => inner.finalize(),
            None => Ok(()),
        }
    }
}

impl<T: Finalize> Deref for Closer<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.inner {
            Some(inner) => inner,
            None => unreachable!("{} used after close", self.label),
        }
    }
}

impl<T: Finalize> DerefMut for Closer<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.inner {
            Some(inner) => inner,
            None => unreachable!("{} used after close", self.label),
        }
    }
}

impl<T: Finalize> Drop for Closer<T> {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            if let Err(err) = inner.release() {
                error!(component = self.label, error = %err, "failed to close {}", self.label);
            }
        }
    }
}
