//! # IPC frame decoder
//!
//! Incremental decoder that finds message boundaries in a growing byte buffer, for
//! readers that receive the stream in arbitrary chunks.
//!
//! # Overview
//!
//! - Accepts both the legacy (`<int32 size>`) and continuation (`0xFFFFFFFF <int32 size>`)
//!   prefixes, message by message.
//! - An opening `"ARROW1\0\0"` is recognised and reported, so a whole file can be fed
//!   through the same decoder. After the end-of-stream marker, anything left (a file
//!   footer) is reported as trailer.
//! - A message is only emitted once its metadata and its whole body are buffered.

use arrow_ipc as fb;

use crate::constants::{ARROW_MAGIC_NUMBER_PADDED, FILE_OPENING_MAGIC_LEN};
use crate::enums::{DecodeResult, DecodeState};
use crate::error::{IpcError, Result};
use crate::models::buffer::Buffer;
use crate::models::decoders::ipc::message::Message;
use crate::traits::frame_decoder::FrameDecoder;
use crate::utils::parse_length_prefix;

/// One decoded unit of an IPC byte stream.
#[derive(Debug, Clone)]
pub enum IpcStreamFrame {
    /// Opening file magic.
    FileHeader,
    Message(Message),
    EndOfStream,
    /// Bytes after the end-of-stream marker.
    Trailer,
}

/// State machine over [`DecodeState`].
#[derive(Debug)]
pub struct IpcFrameDecoder {
    state: DecodeState,
}

impl Default for IpcFrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl IpcFrameDecoder {
    pub fn new() -> Self {
        Self { state: DecodeState::Initial }
    }

    pub fn state(&self) -> DecodeState {
        self.state
    }

    fn decode_initial(&mut self, buf: &[u8]) -> Option<DecodeResult<IpcStreamFrame>> {
        let seen = buf.len().min(FILE_OPENING_MAGIC_LEN);
        if buf[..seen] == ARROW_MAGIC_NUMBER_PADDED[..seen] {
            if seen < FILE_OPENING_MAGIC_LEN {
                return Some(DecodeResult::NeedMore);
            }
            self.state = DecodeState::ReadingMessage;
            return Some(DecodeResult::Frame {
                frame: IpcStreamFrame::FileHeader,
                consumed: FILE_OPENING_MAGIC_LEN,
            });
        }
        self.state = DecodeState::ReadingMessage;
        None
    }

    fn decode_prefix(&mut self, buf: &[u8]) -> Result<Option<DecodeResult<IpcStreamFrame>>> {
        let Some((prefix_len, meta_len)) = parse_length_prefix(buf)? else {
            return Ok(Some(DecodeResult::NeedMore));
        };
        if meta_len == 0 {
            self.state = DecodeState::Done;
            return Ok(Some(DecodeResult::Frame {
                frame: IpcStreamFrame::EndOfStream,
                consumed: prefix_len,
            }));
        }
        if buf.len() < prefix_len + meta_len {
            return Ok(Some(DecodeResult::NeedMore));
        }
        let msg = fb::root_as_message(&buf[prefix_len..prefix_len + meta_len])?;
        let body_len = usize::try_from(msg.bodyLength())
            .map_err(|_| IpcError::invalid(format!("negative body length {}", msg.bodyLength())))?;
        self.state = DecodeState::ReadingBody { prefix_len, meta_len, body_len };
        Ok(None)
    }

    fn decode_body(
        &mut self,
        buf: &[u8],
        prefix_len: usize,
        meta_len: usize,
        body_len: usize,
    ) -> Result<DecodeResult<IpcStreamFrame>> {
        let meta_end = prefix_len + meta_len;
        let total = meta_end + body_len;
        if buf.len() < total {
            return Ok(DecodeResult::NeedMore);
        }
        let message = Message::open(
            Buffer::from_slice(&buf[prefix_len..meta_end]),
            Buffer::from_slice(&buf[meta_end..total]),
        )?;
        self.state = DecodeState::ReadingMessage;
        Ok(DecodeResult::Frame {
            frame: IpcStreamFrame::Message(message),
            consumed: total,
        })
    }
}

impl FrameDecoder for IpcFrameDecoder {
    type Frame = IpcStreamFrame;

    fn decode(&mut self, buf: &[u8]) -> Result<DecodeResult<Self::Frame>> {
        loop {
            match self.state {
                DecodeState::Initial => {
                    if buf.is_empty() {
                        return Ok(DecodeResult::NeedMore);
                    }
                    if let Some(done) = self.decode_initial(buf) {
                        return Ok(done);
                    }
                }
                DecodeState::ReadingMessage => {
                    if let Some(done) = self.decode_prefix(buf)? {
                        return Ok(done);
                    }
                }
                DecodeState::ReadingBody { prefix_len, meta_len, body_len } => {
                    return self.decode_body(buf, prefix_len, meta_len, body_len);
                }
                DecodeState::Done => {
                    if buf.is_empty() {
                        return Ok(DecodeResult::NeedMore);
                    }
                    return Ok(DecodeResult::Frame {
                        frame: IpcStreamFrame::Trailer,
                        consumed: buf.len(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::int32_array;
    use crate::models::array::record_batch::RecordBatch;
    use crate::models::sinks::byte_sink::MemorySink;
    use crate::models::types::datatype::DataType;
    use crate::models::types::schema::{Field, Schema};
    use crate::models::writers::ipc::ipc_writer::{open_file_writer, write_stream};
    use crate::options::IpcWriteOptions;
    use std::sync::Arc;

    fn sample() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, true)]));
        RecordBatch::try_new(schema, vec![Arc::new(int32_array(&[Some(4), None]))]).unwrap()
    }

    /// Feed `bytes` one byte at a time, collecting every frame.
    fn drip(bytes: &[u8]) -> Vec<IpcStreamFrame> {
        let mut decoder = IpcFrameDecoder::new();
        let mut buf: Vec<u8> = Vec::new();
        let mut frames = Vec::new();
        for b in bytes {
            buf.push(*b);
            while let DecodeResult::Frame { frame, consumed } = decoder.decode(&buf).unwrap() {
                buf.drain(..consumed);
                frames.push(frame);
            }
        }
        assert!(buf.is_empty());
        frames
    }

    #[test]
    fn test_stream_frames_in_single_byte_chunks() {
        for legacy in [true, false] {
            let batch = sample();
            let options = IpcWriteOptions::default().with_legacy_format(legacy);
            let sink = write_stream(
                MemorySink::<Vec<u8>>::new(),
                Arc::clone(batch.schema()),
                &[batch.clone(), batch],
                options,
            )
            .unwrap();
            let frames = drip(sink.as_slice());
            assert_eq!(frames.len(), 4);
            assert!(matches!(&frames[0], IpcStreamFrame::Message(m) if m.message_type() == crate::enums::MessageType::Schema));
            assert!(matches!(frames[3], IpcStreamFrame::EndOfStream));
        }
    }

    #[test]
    fn test_file_bytes_report_header_and_trailer() {
        let batch = sample();
        let mut writer = open_file_writer(MemorySink::<Vec<u8>>::new(), Arc::clone(batch.schema())).unwrap();
        writer.write_batch(&batch).unwrap();
        writer.close().unwrap();
        let bytes = writer.into_inner().into_buffer();

        let frames = drip(bytes.as_slice());
        assert!(matches!(frames[0], IpcStreamFrame::FileHeader));
        assert!(matches!(frames.last(), Some(IpcStreamFrame::Trailer)));
        let messages = frames.iter().filter(|f| matches!(f, IpcStreamFrame::Message(_))).count();
        assert_eq!(messages, 2);
    }

    #[test]
    fn test_corrupt_metadata_is_invalid() {
        let mut decoder = IpcFrameDecoder::new();
        let mut bytes = 8i32.to_le_bytes().to_vec();
        bytes.extend_from_slice(&[0xAB; 8]);
        assert!(matches!(decoder.decode(&bytes), Err(IpcError::Invalid(_))));
    }
}
