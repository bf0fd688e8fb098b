//! # Output sinks
//!
//! The writer side needs exactly two things from its destination: append bytes, and
//! report the current absolute position so file blocks can record where each message
//! starts. Anything that can do that is an [`OutputSink`].

use crate::error::Result;

/// Append-only byte destination with a position cursor.
///
/// Writes are blocking. A failed write leaves the position undefined; callers should
/// not reuse a sink after an error without re-validating it.
pub trait OutputSink {
    /// Append all of `data`.
    fn write(&mut self, data: &[u8]) -> Result<()>;

    /// Absolute position of the next byte to be written.
    fn tell(&self) -> Result<u64>;

    /// Flush any buffered bytes to the underlying destination.
    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<S: OutputSink + ?Sized> OutputSink for &mut S {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        (**self).write(data)
    }

    fn tell(&self) -> Result<u64> {
        (**self).tell()
    }

    fn flush(&mut self) -> Result<()> {
        (**self).flush()
    }
}
