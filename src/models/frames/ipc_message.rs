//! # IPC Frame Structures
//!
//! Core data structures for IPC message framing.
//!
//! - [`IpcPayload`] pairs a FlatBuffers metadata message with the ordered body buffers it
//!   describes. Buffers are shared views, so building a payload copies no column data.
//! - [`IPCFrameMetadata`] tracks byte lengths and padding for the sections of an encoded
//!   frame, used to compute total frame size and to keep messages 8-byte aligned.
//! - [`FileBlock`] is the footer index entry locating one message in a file.

use crate::enums::MessageType;
use crate::models::buffer::Buffer;
use crate::utils::padded_len;

/// One message ready to be framed: metadata flatbuffer plus body buffers.
#[derive(Debug, Clone)]
pub struct IpcPayload {
    pub message_type: MessageType,
    /// FlatBuffers-encoded `Message`, unpadded.
    pub metadata: Vec<u8>,
    /// Body buffers in descriptor order, each padded to 8 bytes when written.
    pub body_buffers: Vec<Buffer>,
    /// Sum of the padded buffer lengths.
    pub body_length: i64,
}

impl IpcPayload {
    /// Bytes the body occupies on the wire.
    pub fn padded_body_len(&self) -> usize {
        self.body_buffers
            .iter()
            .map(|b| padded_len(b.len(), 8))
            .sum()
    }
}

/// Per-frame accounting metadata for IPC encoding.
///
/// Tracks lengths of the logical sections of an encoded frame (prefix, metadata,
/// end-of-stream marker, footer, magic) including any padding.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IPCFrameMetadata {
    /// Length prefix size in bytes: 4, or 8 with the continuation marker.
    pub header_len: usize,
    /// Raw metadata length in bytes (excluding padding).
    pub meta_len: usize,
    /// Padding applied after metadata for alignment.
    pub meta_pad: usize,
    /// End-of-stream marker length in bytes, if present.
    pub eos_len: usize,
    /// File footer length in bytes (flatbuffer plus its int32 length), if present.
    pub footer_len: usize,
    /// Length of magic bytes written, opening (padded) or closing.
    pub magic_len: usize,
}

impl IPCFrameMetadata {
    /// Total encoded frame length.
    pub fn frame_len(&self) -> usize {
        self.header_len + self.metadata_total_len() + self.eos_len + self.footer_len + self.magic_len
    }

    /// Metadata section length including padding.
    pub fn metadata_total_len(&self) -> usize {
        self.meta_len + self.meta_pad
    }

    /// Prefix plus padded metadata: the `metadata_length` recorded in file blocks.
    pub fn message_header_len(&self) -> usize {
        self.header_len + self.metadata_total_len()
    }
}

/// Footer index entry: where a message starts, how long its framed metadata is, and how
/// long its body is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileBlock {
    pub offset: i64,
    pub metadata_length: i32,
    pub body_length: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ipc_frame_metadata_calculations() {
        let metadata = IPCFrameMetadata {
            header_len: 8,
            meta_len: 120,
            meta_pad: 0,
            ..Default::default()
        };
        assert_eq!(metadata.metadata_total_len(), 120);
        assert_eq!(metadata.message_header_len(), 128);
        assert_eq!(metadata.frame_len(), 128);
    }

    #[test]
    fn test_payload_body_len_pads_each_buffer() {
        let payload = IpcPayload {
            message_type: MessageType::RecordBatch,
            metadata: vec![],
            body_buffers: vec![Buffer::from_vec(vec![1; 3]), Buffer::empty(), Buffer::from_vec(vec![2; 9])],
            body_length: 24,
        };
        assert_eq!(payload.padded_body_len(), 24);
    }
}
