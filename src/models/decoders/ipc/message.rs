//! # IPC messages
//!
//! A [`Message`] is one verified metadata flatbuffer plus the body bytes it describes.
//! [`read_message`] walks a stream of framed messages from a random-access source;
//! [`read_message_at`] fetches one message a file footer block points at.

use arrow_ipc as fb;
use log::trace;

use crate::constants::{CONTINUATION_MARKER_LEN, CONTINUATION_SENTINEL, METADATA_SIZE_PREFIX};
use crate::enums::{MessageType, MetadataVersion};
use crate::error::{IpcError, Result};
use crate::models::buffer::Buffer;
use crate::models::encoders::ipc::protocol::{write_frame, IPCFrame};
use crate::traits::input_source::RandomAccessSource;
use crate::traits::output_sink::OutputSink;
use crate::utils::{parse_length_prefix, read_i32_le};

/// Verified metadata plus body.
///
/// `metadata` holds the flatbuffer without its length prefix; trailing alignment padding
/// may follow it. `body` holds exactly `body_length` bytes.
#[derive(Debug, Clone)]
pub struct Message {
    metadata: Buffer,
    body: Buffer,
    message_type: MessageType,
    version: MetadataVersion,
    body_length: i64,
}

impl Message {
    /// Verify `metadata` and pair it with `body`.
    ///
    /// # Errors
    /// - `Invalid` for a malformed flatbuffer or a metadata version older than V4.
    /// - `Invalid` when `body` does not hold exactly the declared body length.
    pub fn open(metadata: Buffer, body: Buffer) -> Result<Self> {
        let (message_type, version, body_length) = {
            let msg = fb::root_as_message(metadata.as_slice())?;
            let version = MetadataVersion::try_from(msg.version())?;
            (MessageType::from(msg.header_type()), version, msg.bodyLength())
        };
        if body_length < 0 || body.len() as i64 != body_length {
            return Err(IpcError::invalid(format!(
                "message declares a {body_length}-byte body but {} bytes were supplied",
                body.len()
            )));
        }
        Ok(Self {
            metadata,
            body,
            message_type,
            version,
            body_length,
        })
    }

    pub fn message_type(&self) -> MessageType {
        self.message_type
    }

    pub fn metadata_version(&self) -> MetadataVersion {
        self.version
    }

    pub fn body_length(&self) -> i64 {
        self.body_length
    }

    pub fn metadata(&self) -> &Buffer {
        &self.metadata
    }

    pub fn body(&self) -> &Buffer {
        &self.body
    }

    /// The parsed `Message` table. Verified once in [`Message::open`]; verified again here
    /// since the view borrows from `self`.
    pub fn header(&self) -> Result<fb::Message<'_>> {
        Ok(fb::root_as_message(self.metadata.as_slice())?)
    }

    /// Byte-wise equality of metadata and body.
    pub fn equals(&self, other: &Message) -> bool {
        self.metadata.as_slice() == other.metadata.as_slice()
            && self.body.as_slice() == other.body.as_slice()
    }

    /// Frame this message onto `sink`: prefix, metadata padded to `alignment`, body.
    ///
    /// # Returns
    /// The framed metadata length (prefix and padding included).
    pub fn serialize_to<S: OutputSink + ?Sized>(
        &self,
        sink: &mut S,
        alignment: usize,
        legacy: bool,
    ) -> Result<i32> {
        let frame = IPCFrame::Message {
            meta: self.metadata.as_slice(),
            alignment,
            legacy,
        };
        let meta = write_frame(sink, &frame)?;
        sink.write(self.body.as_slice())?;
        i32::try_from(meta.message_header_len())
            .map_err(|_| IpcError::Capacity("framed metadata exceeds int32".into()))
    }
}

/// Read the next framed message at `*position`, advancing past it.
///
/// Both prefix forms are accepted. Returns `None` at an end-of-stream marker (the
/// position moves past the marker) or when `*position` is exactly the end of the source.
///
/// # Errors
/// `Io` (`UnexpectedEof`) for a truncated prefix, metadata or body.
pub fn read_message<S: RandomAccessSource + ?Sized>(
    source: &S,
    position: &mut u64,
) -> Result<Option<Message>> {
    if *position >= source.size()? {
        return Ok(None);
    }
    let head = source.read_at(*position, METADATA_SIZE_PREFIX)?;
    let mut prefix_len = METADATA_SIZE_PREFIX;
    let mut size = read_i32_le(head.as_slice(), 0);
    if size as u32 == CONTINUATION_SENTINEL {
        let next = source.read_at(*position + CONTINUATION_MARKER_LEN as u64, METADATA_SIZE_PREFIX)?;
        prefix_len += CONTINUATION_MARKER_LEN;
        size = read_i32_le(next.as_slice(), 0);
    }
    if size < 0 {
        return Err(IpcError::invalid(format!("negative metadata size {size}")));
    }
    if size == 0 {
        *position += prefix_len as u64;
        trace!("end-of-stream marker at {}", *position - prefix_len as u64);
        return Ok(None);
    }

    let metadata_start = *position + prefix_len as u64;
    let metadata = source.read_at(metadata_start, size as usize)?;
    let message = read_body(source, metadata, metadata_start + size as u64)?;
    *position = metadata_start + size as u64 + message.body_length() as u64;
    Ok(Some(message))
}

/// Read the message a file block describes.
///
/// `metadata_length` covers prefix, flatbuffer and padding; the body follows it.
///
/// # Errors
/// `Invalid` when the prefix claims more bytes than the block holds.
pub fn read_message_at<S: RandomAccessSource + ?Sized>(
    source: &S,
    offset: i64,
    metadata_length: i32,
) -> Result<Message> {
    if offset < 0 || metadata_length <= METADATA_SIZE_PREFIX as i32 {
        return Err(IpcError::invalid(format!(
            "invalid message block: offset {offset}, metadata length {metadata_length}"
        )));
    }
    let framed = source.read_at(offset as u64, metadata_length as usize)?;
    let (prefix_len, size) = parse_length_prefix(framed.as_slice())?
        .ok_or_else(|| IpcError::invalid("message block too short for its length prefix"))?;
    if prefix_len + size > metadata_length as usize {
        return Err(IpcError::invalid(format!(
            "flatbuffer size {size} invalid at offset {offset}, metadata length {metadata_length}"
        )));
    }
    let metadata = framed.slice(prefix_len, metadata_length as usize - prefix_len)?;
    read_body(source, metadata, offset as u64 + metadata_length as u64)
}

fn read_body<S: RandomAccessSource + ?Sized>(
    source: &S,
    metadata: Buffer,
    body_start: u64,
) -> Result<Message> {
    let body_length = fb::root_as_message(metadata.as_slice())?.bodyLength();
    if body_length < 0 {
        return Err(IpcError::invalid(format!("negative body length {body_length}")));
    }
    let body = source.read_at(body_start, body_length as usize)?;
    let message = Message::open(metadata, body)?;
    trace!(
        "read {:?} message: metadata {} bytes, body {} bytes",
        message.message_type(),
        message.metadata().len(),
        message.body_length()
    );
    Ok(message)
}
