use bytes::BytesMut;

/// Abstraction over a growable byte buffer for frame-based streaming.
///
/// This trait defines the interface used by the in-memory sink and by the rolling buffer
/// inside the async framed reader. It is implemented for `Vec<u8>` and `bytes::BytesMut`,
/// and can be implemented for other byte containers where the byte-level IO stack is fixed
/// or externally controlled.
///
/// Implementors must support the following standard `Vec` operations:
/// - Draining consumed bytes
/// - Appending new bytes
/// - Querying the current buffer length
/// - Accessing the internal byte slice
pub trait StreamBuffer: AsRef<[u8]> + Default + Extend<u8> + 'static {
    /// Create with given capacity.
    fn with_capacity(n: usize) -> Self;

    // Reserves additional capacity in the buffer
    fn reserve(&mut self, additional: usize);

    /// Remove the specified range from the buffer.
    fn drain(&mut self, range: std::ops::Range<usize>);
    /// Current length (in bytes).
    fn len(&self) -> usize;
    /// Whether the buffer is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
    /// Append bytes from a slice.
    fn extend_from_slice(&mut self, data: &[u8]);
    /// Push a single byte to the end of the buffer.
    fn push(&mut self, byte: u8);
    /// Create a buffer from a slice (copies the bytes).
    fn from_slice(data: &[u8]) -> Self;
    /// Move the contents out, leaving an empty buffer behind.
    fn take(&mut self) -> Vec<u8>;
}

impl StreamBuffer for Vec<u8> {
    fn with_capacity(n: usize) -> Self {
        Vec::with_capacity(n)
    }

    fn reserve(&mut self, additional: usize) {
        Vec::<u8>::reserve(self, additional);
    }

    fn drain(&mut self, range: std::ops::Range<usize>) {
        // Call Vec::<T>::drain, ignore the returned Drain iterator
        Vec::<u8>::drain(self, range);
    }

    fn len(&self) -> usize {
        Vec::<u8>::len(self)
    }

    fn extend_from_slice(&mut self, data: &[u8]) {
        Vec::<u8>::extend_from_slice(self, data)
    }

    fn push(&mut self, byte: u8) {
        Vec::<u8>::push(self, byte)
    }

    fn from_slice(data: &[u8]) -> Self {
        data.to_vec()
    }

    fn take(&mut self) -> Vec<u8> {
        std::mem::take(self)
    }
}

impl StreamBuffer for BytesMut {
    fn with_capacity(n: usize) -> Self {
        BytesMut::with_capacity(n)
    }

    fn reserve(&mut self, additional: usize) {
        BytesMut::reserve(self, additional);
    }

    fn drain(&mut self, range: std::ops::Range<usize>) {
        // Front drains are O(1); interior ranges stitch the tail back on
        if range.start == 0 {
            let _ = self.split_to(range.end);
        } else {
            let tail = self.split_off(range.end);
            self.truncate(range.start);
            self.unsplit(tail);
        }
    }

    fn len(&self) -> usize {
        BytesMut::len(self)
    }

    fn extend_from_slice(&mut self, data: &[u8]) {
        BytesMut::extend_from_slice(self, data)
    }

    fn push(&mut self, byte: u8) {
        BytesMut::extend_from_slice(self, &[byte])
    }

    fn from_slice(data: &[u8]) -> Self {
        BytesMut::from(data)
    }

    fn take(&mut self) -> Vec<u8> {
        self.split().to_vec()
    }
}
