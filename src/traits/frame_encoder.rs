//! # Generic Frame Encoder
//!
//! Serialise protocol frames into on-the-wire bytes.
//!
//! A frame encoder is the one place that decides how a frame becomes bytes: length
//! prefixes, padding, markers. Buffer management stays with the caller, and the output
//! can go to any sink.
//!
//! Implement `FrameEncoder` for a format; call `encode()` to get the wire bytes.

use crate::error::Result;
use crate::traits::stream_buffer::StreamBuffer;

/// Implement this trait for any wire format requiring message framing.
///
/// The encoder must only write to the returned buffer and must not retain references
/// to data passed in.
///
/// ### Contract
/// - The encoder must not mutate the frame being encoded.
/// - The encoder must not retain references to input data after the call.
/// - `global_offset` is advanced by exactly the number of bytes returned.
pub trait FrameEncoder {
    /// The type of frame accepted by this encoder.
    type Frame<'a>;

    /// The type of metadata produced by this encoder.
    type Metadata;

    /// Encode a frame, producing both an output buffer and frame metadata.
    ///
    /// ### Args
    /// * `global_offset`: absolute stream position of the first byte produced
    /// * `frame`: the frame being encoded
    fn encode<'a, B: StreamBuffer>(
        global_offset: &mut usize,
        frame: &Self::Frame<'a>,
    ) -> Result<(B, Self::Metadata)>;
}
