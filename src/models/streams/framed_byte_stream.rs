//! # Framed byte stream
//!
//! Turns a chunked byte source into a stream of decoded frames. For IPC input the source
//! is usually a [`DiskByteStream`](crate::models::streams::disk::DiskByteStream), the
//! decoder an [`IpcFrameDecoder`](crate::models::decoders::ipc::protocol::IpcFrameDecoder),
//! and the consumer an [`IpcBatchStream`](crate::models::decoders::ipc::batch_stream::IpcBatchStream).
//!
//! Chunk boundaries are invisible downstream: bytes accumulate in a rolling buffer until
//! the decoder reports a whole message, which is then drained. Bytes still buffered when
//! the source ends belong to a message that never finished, and surface as
//! `UnexpectedEof`.

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use futures_core::Stream;

use crate::enums::DecodeResult;
use crate::error::{IpcError, Result};
use crate::traits::byte_stream::GenByteStream;
use crate::traits::frame_decoder::FrameDecoder;
use crate::traits::stream_buffer::StreamBuffer;

/// Async adapter from byte chunks to frames.
pub struct FramedByteStream<S, D, B>
where
    S: GenByteStream<B>,
    D: FrameDecoder,
    B: StreamBuffer,
{
    source: S,
    decoder: D,
    pending: B,
    exhausted: bool,
}

impl<S, D, B> FramedByteStream<S, D, B>
where
    S: GenByteStream<B>,
    D: FrameDecoder,
    B: StreamBuffer,
{
    /// `initial_capacity` sizes the rolling buffer; it grows to the largest message seen.
    pub fn new(source: S, decoder: D, initial_capacity: usize) -> Self {
        Self {
            source,
            decoder,
            pending: B::with_capacity(initial_capacity),
            exhausted: false,
        }
    }

    pub fn decoder(&self) -> &D {
        &self.decoder
    }

    /// Try to cut one frame off the front of the buffer.
    fn next_buffered(&mut self) -> Option<Result<D::Frame>> {
        match self.decoder.decode(self.pending.as_ref()) {
            Ok(DecodeResult::Frame { frame, consumed }) => {
                self.pending.drain(0..consumed);
                Some(Ok(frame))
            }
            Ok(DecodeResult::NeedMore) => None,
            Err(e) => {
                self.pending = B::default();
                self.exhausted = true;
                Some(Err(e))
            }
        }
    }

    /// Source is done: anything left over is a partial message.
    fn finish(&mut self) -> Option<Result<D::Frame>> {
        self.exhausted = true;
        if self.pending.is_empty() {
            return None;
        }
        let left = self.pending.len();
        self.pending = B::default();
        Some(Err(IpcError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("source ended inside a message, {left} bytes unread"),
        ))))
    }
}

impl<S, D, B> Stream for FramedByteStream<S, D, B>
where
    S: GenByteStream<B>,
    D: FrameDecoder + Unpin,
    B: StreamBuffer + Unpin,
{
    type Item = Result<D::Frame>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.exhausted {
            return Poll::Ready(None);
        }
        loop {
            if let Some(item) = this.next_buffered() {
                return Poll::Ready(Some(item));
            }
            match Pin::new(&mut this.source).poll_next(cx) {
                Poll::Ready(Some(Ok(chunk))) => this.pending.extend_from_slice(chunk.as_ref()),
                Poll::Ready(Some(Err(e))) => {
                    this.exhausted = true;
                    return Poll::Ready(Some(Err(IpcError::Io(e))));
                }
                Poll::Ready(None) => return Poll::Ready(this.finish()),
                Poll::Pending => return Poll::Pending,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream::{self, StreamExt};

    /// Frames are `<u8 len><payload>`.
    struct LenPrefixed;

    impl FrameDecoder for LenPrefixed {
        type Frame = Vec<u8>;

        fn decode(&mut self, buf: &[u8]) -> Result<DecodeResult<Vec<u8>>> {
            match buf.first() {
                Some(&n) if buf.len() > n as usize => Ok(DecodeResult::Frame {
                    frame: buf[1..=n as usize].to_vec(),
                    consumed: n as usize + 1,
                }),
                _ => Ok(DecodeResult::NeedMore),
            }
        }
    }

    #[tokio::test]
    async fn test_frames_across_chunks() {
        let chunks: Vec<io::Result<Vec<u8>>> = vec![Ok(vec![2, b'a']), Ok(vec![b'b', 1]), Ok(vec![b'c'])];
        let framed = FramedByteStream::new(stream::iter(chunks), LenPrefixed, 16);
        let frames: Vec<_> = framed.map(|f| f.unwrap()).collect().await;
        assert_eq!(frames, vec![b"ab".to_vec(), b"c".to_vec()]);
    }

    #[tokio::test]
    async fn test_truncated_tail_is_error() {
        let chunks: Vec<io::Result<Vec<u8>>> = vec![Ok(vec![3, b'a'])];
        let mut framed = FramedByteStream::new(stream::iter(chunks), LenPrefixed, 16);
        match framed.next().await {
            Some(Err(IpcError::Io(e))) => assert_eq!(e.kind(), io::ErrorKind::UnexpectedEof),
            other => panic!("expected truncation error, got {other:?}"),
        }
        assert!(framed.next().await.is_none());
    }
}
