//! # IPC message framing
//!
//! Turns metadata flatbuffers into framed bytes and writes whole messages to a sink.
//!
//! ```text
//! legacy:        <int32 size> <metadata> <pad>
//! continuation:  <0xFFFFFFFF> <int32 size> <metadata> <pad>
//! body:          <buffer 0> <pad to 8> <buffer 1> <pad to 8> ...
//! ```
//!
//! `size` counts the metadata plus its padding. The padding brings prefix plus metadata
//! to a multiple of the configured alignment, measured from the start of the message, so
//! a message that starts aligned leaves its body aligned too.
//!
//! See the [IPC format description](https://arrow.apache.org/docs/format/Columnar.html#serialization-and-interprocess-communication-ipc)
//! for further details.

use log::trace;

use crate::constants::{
    ARROW_MAGIC_NUMBER, ARROW_MAGIC_NUMBER_PADDED, CONTINUATION_MARKER_LEN, CONTINUATION_SENTINEL,
    FOOTER_SIZE_PREFIX, METADATA_SIZE_PREFIX, PADDING_BYTES,
};
use crate::error::{IpcError, Result};
use crate::models::frames::ipc_message::{IPCFrameMetadata, IpcPayload};
use crate::traits::frame_encoder::FrameEncoder;
use crate::traits::output_sink::OutputSink;
use crate::traits::stream_buffer::StreamBuffer;
use crate::utils::padded_len;

/// One framing unit of the stream or file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPCFrame<'a> {
    /// `"ARROW1"` plus padding to 8 bytes, opening a file.
    FileHeader,

    /// Length prefix, metadata and padding of one message. The body is written
    /// separately so column buffers never pass through an intermediate copy.
    Message {
        meta: &'a [u8],
        alignment: usize,
        legacy: bool,
    },

    /// End-of-stream: `int32(0)`, or `0xFFFFFFFF 0x00000000` in continuation form.
    EndOfStream { legacy: bool },

    /// Footer flatbuffer, its `int32` length and the closing magic.
    FileFooter { footer: &'a [u8] },
}

/// Encodes [`IPCFrame`]s.
pub struct IPCFrameEncoder;

impl FrameEncoder for IPCFrameEncoder {
    type Frame<'a> = IPCFrame<'a>;
    type Metadata = IPCFrameMetadata;

    fn encode<'a, B: StreamBuffer>(
        global_offset: &mut usize,
        frame: &Self::Frame<'a>,
    ) -> Result<(B, Self::Metadata)> {
        let mut out = B::default();
        let mut meta = IPCFrameMetadata::default();
        match *frame {
            IPCFrame::FileHeader => {
                out.extend_from_slice(ARROW_MAGIC_NUMBER_PADDED);
                meta.magic_len = ARROW_MAGIC_NUMBER_PADDED.len();
            }
            IPCFrame::Message { meta: bytes, alignment, legacy } => {
                debug_assert!(
                    *global_offset % 8 == 0,
                    "message starts at unaligned position {global_offset}"
                );
                Self::append_message_frame(&mut out, bytes, alignment, legacy, &mut meta)?;
            }
            IPCFrame::EndOfStream { legacy } => {
                Self::append_eos_marker(&mut out, legacy, &mut meta);
            }
            IPCFrame::FileFooter { footer } => {
                Self::append_file_footer(&mut out, footer, &mut meta)?;
            }
        }
        *global_offset += out.len();
        Ok((out, meta))
    }
}

impl IPCFrameEncoder {
    fn append_message_frame<B: StreamBuffer>(
        out: &mut B,
        bytes: &[u8],
        alignment: usize,
        legacy: bool,
        meta: &mut IPCFrameMetadata,
    ) -> Result<()> {
        meta.header_len = if legacy {
            METADATA_SIZE_PREFIX
        } else {
            CONTINUATION_MARKER_LEN + METADATA_SIZE_PREFIX
        };
        meta.meta_len = bytes.len();
        let framed = padded_len(meta.header_len + bytes.len(), alignment);
        meta.meta_pad = framed - meta.header_len - bytes.len();

        let size = i32::try_from(meta.metadata_total_len()).map_err(|_| {
            IpcError::Capacity(format!("metadata of {} bytes exceeds int32", bytes.len()))
        })?;

        out.reserve(framed);
        if !legacy {
            out.extend_from_slice(&CONTINUATION_SENTINEL.to_le_bytes());
        }
        out.extend_from_slice(&size.to_le_bytes());
        out.extend_from_slice(bytes);
        out.extend(std::iter::repeat(0u8).take(meta.meta_pad));
        Ok(())
    }

    fn append_eos_marker<B: StreamBuffer>(out: &mut B, legacy: bool, meta: &mut IPCFrameMetadata) {
        if !legacy {
            out.extend_from_slice(&CONTINUATION_SENTINEL.to_le_bytes());
        }
        out.extend_from_slice(&0i32.to_le_bytes());
        meta.eos_len = out.len();
    }

    /// The closing magic is not padded.
    fn append_file_footer<B: StreamBuffer>(
        out: &mut B,
        footer: &[u8],
        meta: &mut IPCFrameMetadata,
    ) -> Result<()> {
        let footer_len = i32::try_from(footer.len()).map_err(|_| {
            IpcError::Capacity(format!("footer of {} bytes exceeds int32", footer.len()))
        })?;
        out.extend_from_slice(footer);
        out.extend_from_slice(&footer_len.to_le_bytes());
        meta.footer_len = footer.len() + FOOTER_SIZE_PREFIX;
        out.extend_from_slice(ARROW_MAGIC_NUMBER);
        meta.magic_len = ARROW_MAGIC_NUMBER.len();
        Ok(())
    }
}

/// Encode `frame` at the sink's current position and write it.
pub fn write_frame<S: OutputSink + ?Sized>(sink: &mut S, frame: &IPCFrame<'_>) -> Result<IPCFrameMetadata> {
    let mut position = sink.tell()? as usize;
    let (bytes, meta) = IPCFrameEncoder::encode::<Vec<u8>>(&mut position, frame)?;
    sink.write(&bytes)?;
    Ok(meta)
}

/// Write one message: framed metadata, then each body buffer padded to 8 bytes.
///
/// # Returns
/// `(metadata_length, body_length)` where `metadata_length` includes the length prefix
/// and padding, matching what file blocks record.
///
/// # Errors
/// Sink failures, or metadata too large for an `int32` prefix.
pub fn write_payload<S: OutputSink + ?Sized>(
    sink: &mut S,
    payload: &IpcPayload,
    alignment: usize,
    legacy: bool,
) -> Result<(i32, i64)> {
    let frame = IPCFrame::Message {
        meta: &payload.metadata,
        alignment,
        legacy,
    };
    let meta = write_frame(sink, &frame)?;

    let mut written = 0i64;
    for buffer in &payload.body_buffers {
        if !buffer.is_empty() {
            sink.write(buffer.as_slice())?;
        }
        let pad = padded_len(buffer.len(), 8) - buffer.len();
        if pad > 0 {
            sink.write(&PADDING_BYTES[..pad])?;
        }
        written += (buffer.len() + pad) as i64;
    }
    debug_assert_eq!(written, payload.body_length);

    let metadata_length = meta.message_header_len() as i32;
    trace!(
        "wrote {:?} message: metadata {} bytes, body {} bytes",
        payload.message_type,
        metadata_length,
        written
    );
    Ok((metadata_length, written))
}
