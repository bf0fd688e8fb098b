//! # Random-access input sources
//!
//! Readers pull metadata and body bytes through [`RandomAccessSource`]. Implementations
//! backed by memory hand out zero-copy views; file-backed ones read into fresh buffers.

use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use crate::error::{IpcError, Result};
use crate::models::buffer::Buffer;

pub trait RandomAccessSource {
    /// Read exactly `length` bytes at `position`.
    ///
    /// A short read is an `Io` error of kind `UnexpectedEof`.
    fn read_at(&self, position: u64, length: usize) -> Result<Buffer>;

    /// Total size of the source in bytes.
    fn size(&self) -> Result<u64>;
}

impl<S: RandomAccessSource + ?Sized> RandomAccessSource for &S {
    fn read_at(&self, position: u64, length: usize) -> Result<Buffer> {
        (**self).read_at(position, length)
    }

    fn size(&self) -> Result<u64> {
        (**self).size()
    }
}

impl RandomAccessSource for Buffer {
    fn read_at(&self, position: u64, length: usize) -> Result<Buffer> {
        if length == 0 {
            return Ok(Buffer::empty());
        }
        let available = (self.len() as u64).saturating_sub(position) as usize;
        if available < length {
            return Err(IpcError::short_read(length, available));
        }
        self.slice(position as usize, length)
    }

    fn size(&self) -> Result<u64> {
        Ok(self.len() as u64)
    }
}

/// A file opened for positional reads.
///
/// The handle sits behind a mutex because seek-then-read needs exclusive access to the
/// cursor; `read_at` itself only needs `&self`.
#[derive(Debug)]
pub struct FileSource {
    file: Mutex<File>,
    len: u64,
}

impl FileSource {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path)?;
        Self::from_file(file)
    }

    pub fn from_file(file: File) -> Result<Self> {
        let len = file.metadata()?.len();
        Ok(Self { file: Mutex::new(file), len })
    }
}

impl RandomAccessSource for FileSource {
    fn read_at(&self, position: u64, length: usize) -> Result<Buffer> {
        if length == 0 {
            return Ok(Buffer::empty());
        }
        let available = self.len.saturating_sub(position) as usize;
        if available < length {
            return Err(IpcError::short_read(length, available));
        }
        let mut file = self
            .file
            .lock()
            .map_err(|_| IpcError::invalid("file source lock poisoned"))?;
        file.seek(SeekFrom::Start(position))?;
        let mut out = vec![0u8; length];
        file.read_exact(&mut out)?;
        Ok(Buffer::from_vec(out))
    }

    fn size(&self) -> Result<u64> {
        Ok(self.len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{ErrorKind, Write};

    #[test]
    fn test_buffer_source_short_read() {
        let src = Buffer::from_vec(vec![1, 2, 3, 4, 5]);
        assert_eq!(src.read_at(1, 3).unwrap().as_slice(), &[2, 3, 4]);
        assert!(src.read_at(9, 0).unwrap().is_empty());
        match src.read_at(3, 4) {
            Err(IpcError::Io(e)) => assert_eq!(e.kind(), ErrorKind::UnexpectedEof),
            other => panic!("expected short read, got {other:?}"),
        }
    }

    #[test]
    fn test_file_source_reads() {
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"columnar bytes").unwrap();
        tmp.flush().unwrap();

        let src = FileSource::open(tmp.path()).unwrap();
        assert_eq!(src.size().unwrap(), 14);
        assert_eq!(src.read_at(9, 5).unwrap().as_slice(), b"bytes");
        assert!(src.read_at(10, 5).is_err());
    }
}
