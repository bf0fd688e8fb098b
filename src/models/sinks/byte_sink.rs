use std::io::Write;

use crate::error::Result;
use crate::models::buffer::Buffer;
use crate::traits::output_sink::OutputSink;
use crate::traits::stream_buffer::StreamBuffer;

/// In-memory sink over any [`StreamBuffer`].
///
/// The usual destination for tests and for payloads that are handed to another transport.
/// `into_buffer` turns the written bytes into a [`Buffer`] readers can consume without a copy.
///
/// Bytes moved out with [`take`](Self::take) still count towards the position, so a
/// writer can drain the sink between messages and keep correct file block offsets.
#[derive(Debug, Default)]
pub struct MemorySink<B: StreamBuffer = Vec<u8>> {
    buf: B,
    drained: u64,
}

impl<B: StreamBuffer> MemorySink<B> {
    pub fn new() -> Self {
        Self { buf: B::default(), drained: 0 }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self { buf: B::with_capacity(n), drained: 0 }
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    /// Move out everything written since the last `take`.
    pub fn take(&mut self) -> Vec<u8> {
        let out = self.buf.take();
        self.drained += out.len() as u64;
        out
    }

    pub fn into_inner(self) -> B {
        self.buf
    }

    pub fn into_buffer(mut self) -> Buffer {
        Buffer::from_vec(self.buf.take())
    }
}

impl<B: StreamBuffer> OutputSink for MemorySink<B> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.drained + self.buf.len() as u64)
    }
}

/// Adapts any blocking [`std::io::Write`] into an [`OutputSink`], tracking the position
/// itself so unseekable destinations (pipes, sockets) work too.
#[derive(Debug)]
pub struct WriteSink<W: Write> {
    inner: W,
    position: u64,
}

impl<W: Write> WriteSink<W> {
    pub fn new(inner: W) -> Self {
        Self { inner, position: 0 }
    }

    /// Start counting from `position`, for destinations that already hold bytes.
    pub fn with_position(inner: W, position: u64) -> Self {
        Self { inner, position }
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    pub fn into_inner(self) -> W {
        self.inner
    }
}

impl<W: Write> OutputSink for WriteSink<W> {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.inner.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.position)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()?;
        Ok(())
    }
}

/// Discards bytes and only counts them.
#[derive(Debug, Default, Clone, Copy)]
pub struct CountingSink {
    written: u64,
}

impl CountingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn written(&self) -> u64 {
        self.written
    }
}

impl OutputSink for CountingSink {
    fn write(&mut self, data: &[u8]) -> Result<()> {
        self.written += data.len() as u64;
        Ok(())
    }

    fn tell(&self) -> Result<u64> {
        Ok(self.written)
    }
}
