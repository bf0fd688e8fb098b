//! # Shared byte buffers
//!
//! [`Buffer`] is an immutable, reference-counted view over a byte region. Cloning and
//! slicing never copy: they bump the shared owner's count and adjust the view's
//! offset and length. Decoded arrays hold `Buffer`s that point straight into the
//! bytes the reader was given.

use std::fmt;
use std::ops::Deref;

use bytes::Bytes;

use crate::error::{IpcError, Result};
use crate::models::types::native::NativeType;

#[derive(Clone, Default)]
pub struct Buffer {
    data: Bytes,
}

impl Buffer {
    /// The shared zero-length buffer.
    pub fn empty() -> Self {
        Self { data: Bytes::new() }
    }

    /// Take ownership of `v` without copying.
    pub fn from_vec(v: Vec<u8>) -> Self {
        Self { data: Bytes::from(v) }
    }

    pub fn from_bytes(data: Bytes) -> Self {
        Self { data }
    }

    /// Copy `data` into a new buffer.
    pub fn from_slice(data: &[u8]) -> Self {
        Self { data: Bytes::copy_from_slice(data) }
    }

    /// Little-endian encode `values` into a new buffer.
    pub fn from_values<T: NativeType>(values: &[T]) -> Self {
        let mut out = Vec::with_capacity(values.len() * T::WIDTH);
        for v in values {
            v.extend_le(&mut out);
        }
        Self::from_vec(out)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Start address of the view, for zero-copy checks.
    #[inline]
    pub fn as_ptr(&self) -> *const u8 {
        self.data.as_ptr()
    }

    /// Zero-copy sub-view of `len` bytes starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<Buffer> {
        let end = offset
            .checked_add(len)
            .filter(|end| *end <= self.len())
            .ok_or_else(|| {
                IpcError::invalid(format!(
                    "buffer slice [{offset}, {offset}+{len}) out of bounds for buffer of {} bytes",
                    self.len()
                ))
            })?;
        Ok(Self { data: self.data.slice(offset..end) })
    }

    /// Read the `i`-th value of type `T`. Panics if out of bounds.
    #[inline]
    pub fn value<T: NativeType>(&self, i: usize) -> T {
        let start = i * T::WIDTH;
        T::from_le_slice(&self.data[start..start + T::WIDTH])
    }

    /// Number of whole `T` values the buffer holds.
    #[inline]
    pub fn typed_len<T: NativeType>(&self) -> usize {
        self.len() / T::WIDTH
    }

    /// Decode every whole `T` value in the buffer.
    pub fn to_values<T: NativeType>(&self) -> Vec<T> {
        self.data.chunks_exact(T::WIDTH).map(T::from_le_slice).collect()
    }

    pub fn into_bytes(self) -> Bytes {
        self.data
    }
}

impl Deref for Buffer {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.data
    }
}

impl AsRef<[u8]> for Buffer {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for Buffer {
    fn from(v: Vec<u8>) -> Self {
        Self::from_vec(v)
    }
}

impl From<Bytes> for Buffer {
    fn from(b: Bytes) -> Self {
        Self::from_bytes(b)
    }
}

/// Byte-wise equality, not identity.
impl PartialEq for Buffer {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl Eq for Buffer {}

impl fmt::Debug for Buffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        const PREVIEW: usize = 16;
        let head = &self.data[..self.len().min(PREVIEW)];
        write!(f, "Buffer(len={}, {:02x?}", self.len(), head)?;
        if self.len() > PREVIEW {
            write!(f, "..")?;
        }
        write!(f, ")")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_shares_memory() {
        let buf = Buffer::from_vec((0u8..32).collect());
        let view = buf.slice(8, 8).unwrap();
        assert_eq!(view.as_slice(), &[8, 9, 10, 11, 12, 13, 14, 15]);
        assert_eq!(view.as_ptr(), unsafe { buf.as_ptr().add(8) });
        assert!(buf.slice(30, 4).is_err());
        assert!(buf.slice(usize::MAX, 2).is_err());
    }

    #[test]
    fn test_typed_access() {
        let buf = Buffer::from_values(&[1i32, -2, 3]);
        assert_eq!(buf.len(), 12);
        assert_eq!(buf.value::<i32>(1), -2);
        assert_eq!(buf.typed_len::<i32>(), 3);
        assert_eq!(buf.to_values::<i32>(), vec![1, -2, 3]);
    }
}
