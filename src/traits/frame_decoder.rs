//! Incremental frame boundary detection.
//!
//! Async readers receive IPC bytes in arbitrary chunks: a chunk may end halfway through a
//! length prefix, a flatbuffer header or a message body. A [`FrameDecoder`] looks at the
//! bytes buffered so far and says either "here is one whole frame, `consumed` bytes long"
//! or "not yet". [`FramedByteStream`](crate::models::streams::framed_byte_stream::FramedByteStream)
//! owns the buffer and does the draining; the decoder only reads.

use crate::enums::DecodeResult;
use crate::error::Result;

/// Pull-based decoder that finds one frame at the start of a byte slice.
///
/// Implementations may keep protocol state between calls (for IPC, whether the
/// end-of-stream marker has been seen), but never keep or modify the bytes themselves.
pub trait FrameDecoder {
    type Frame;

    /// Decode the frame at the start of `buf`, if all of it has arrived.
    ///
    /// Returns `NeedMore` for a partial frame, in which case the caller keeps `buf` as it
    /// is and appends the next chunk. `Err` means the bytes can never form a valid frame.
    fn decode(&mut self, buf: &[u8]) -> Result<DecodeResult<Self::Frame>>;
}
