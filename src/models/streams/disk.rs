//! # Asynchronous disk byte stream
//!
//! Wraps a file in a [`Stream`] that yields byte chunks of a bounded size.
//!
//! ## Overview
//! - Uses Tokio [`File`] + [`BufReader`] under the hood.
//! - Supports async backpressure via `poll_next`.
//! - One copy into a fresh `Vec<u8>` per chunk.
//! - Chunk size controlled by [`BufferChunkSize`].

use std::io;
use std::path::Path;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::fs::File;
use tokio::io::{AsyncRead, BufReader, ReadBuf};

use crate::enums::BufferChunkSize;

/// A `Stream` that reads a file in chunks of at most `chunk_size` bytes.
pub struct DiskByteStream {
    reader: BufReader<File>,
    /// Set once the file is exhausted or a read failed.
    eof: bool,
    /// Staging buffer reused across polls.
    buf: Vec<u8>,
}

impl DiskByteStream {
    /// Open a file as a `DiskByteStream`.
    ///
    /// ### Parameters:
    /// - `path`: Path to the file.
    /// - `size`: Chunk size strategy (`BufferChunkSize`).
    pub async fn open(path: impl AsRef<Path>, size: BufferChunkSize) -> io::Result<Self> {
        let file = File::open(path).await?;
        Ok(Self::from_file(file, size))
    }

    pub fn from_file(file: File, size: BufferChunkSize) -> Self {
        let chunk_size = size.chunk_size();
        Self {
            reader: BufReader::with_capacity(chunk_size, file),
            eof: false,
            buf: vec![0u8; chunk_size],
        }
    }
}

impl Stream for DiskByteStream {
    type Item = Result<Vec<u8>, io::Error>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let me = self.get_mut();
        if me.eof {
            return Poll::Ready(None);
        }

        let mut read_buf = ReadBuf::new(&mut me.buf);
        match Pin::new(&mut me.reader).poll_read(cx, &mut read_buf) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Ok(())) => {
                let filled = read_buf.filled();
                if filled.is_empty() {
                    me.eof = true;
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Ok(filled.to_vec())))
                }
            }
            Poll::Ready(Err(e)) => {
                me.eof = true;
                Poll::Ready(Some(Err(e)))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn test_file(size: usize, pattern: u8) -> NamedTempFile {
        let mut f = NamedTempFile::new().unwrap();
        f.write_all(&vec![pattern; size]).unwrap();
        f.flush().unwrap();
        f
    }

    #[tokio::test]
    async fn test_custom_chunks_cover_file() {
        const FILE_SIZE: usize = 1024 * 1024 + 17;
        const CHUNK: usize = 128 * 1024;
        let file = test_file(FILE_SIZE, 0x55);

        let mut stream = DiskByteStream::open(file.path(), BufferChunkSize::Custom(CHUNK)).await.unwrap();
        let mut total = 0usize;
        let mut count = 0usize;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.unwrap();
            assert!(chunk.len() <= CHUNK);
            assert!(chunk.iter().all(|b| *b == 0x55));
            total += chunk.len();
            count += 1;
        }
        assert!(count >= FILE_SIZE / CHUNK);
        assert_eq!(total, FILE_SIZE);
        assert!(stream.next().await.is_none());
    }

    #[tokio::test]
    async fn test_empty_file_ends_immediately() {
        let file = test_file(0, 0);
        let mut stream = DiskByteStream::open(file.path(), BufferChunkSize::FileIO).await.unwrap();
        assert!(stream.next().await.is_none());
    }
}
