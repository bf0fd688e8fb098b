//! # Async record batch stream
//!
//! Consumes a chunked IPC byte stream and yields [`RecordBatch`]es. Schema, dictionary
//! and record batch messages are handled in order; dictionaries replace earlier values
//! for the same id as they arrive.
//!
//! Works for both protocols: the opening file magic is skipped, and reading stops at the
//! end-of-stream marker, so a file's footer is never needed.

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use log::debug;

use crate::enums::{BatchState, MessageType};
use crate::error::{IpcError, Result};
use crate::models::array::record_batch::RecordBatch;
use crate::models::decoders::ipc::message::Message;
use crate::models::decoders::ipc::parser::{read_dictionary, read_record_batch};
use crate::models::decoders::ipc::protocol::{IpcFrameDecoder, IpcStreamFrame};
use crate::models::decoders::ipc::schema::schema_from_fb;
use crate::models::dictionary::DictionaryRegistry;
use crate::models::streams::framed_byte_stream::FramedByteStream;
use crate::models::types::schema::SchemaRef;
use crate::options::IpcReadOptions;
use crate::traits::byte_stream::GenByteStream;
use crate::traits::stream_buffer::StreamBuffer;

/// Stream of record batches decoded from a chunked byte source.
pub struct IpcBatchStream<S, B>
where
    S: GenByteStream<B>,
    B: StreamBuffer,
{
    inner: FramedByteStream<S, IpcFrameDecoder, B>,
    state: BatchState,
    schema: Option<SchemaRef>,
    dictionaries: DictionaryRegistry,
    options: IpcReadOptions,
}

impl<S, B> IpcBatchStream<S, B>
where
    S: GenByteStream<B>,
    B: StreamBuffer,
{
    /// - `stream`: source of IPC bytes in arbitrary chunks.
    /// - `initial_capacity`: initial rolling buffer allocation.
    pub fn new(stream: S, initial_capacity: usize, options: IpcReadOptions) -> Self {
        Self {
            inner: FramedByteStream::new(stream, IpcFrameDecoder::new(), initial_capacity),
            state: BatchState::NeedSchema,
            schema: None,
            dictionaries: DictionaryRegistry::new(),
            options,
        }
    }

    /// The schema, once its message has been read.
    pub fn schema(&self) -> Option<&SchemaRef> {
        self.schema.as_ref()
    }

    pub fn dictionaries(&self) -> &DictionaryRegistry {
        &self.dictionaries
    }

    pub fn is_finished(&self) -> bool {
        self.state == BatchState::Done
    }

    /// Apply one message. Returns a batch when the message was a record batch.
    fn handle_message(&mut self, message: Message) -> Result<Option<RecordBatch>> {
        match (self.state, message.message_type()) {
            (BatchState::NeedSchema, MessageType::Schema) => {
                let header = message.header()?;
                let schema = header
                    .header_as_schema()
                    .ok_or_else(|| IpcError::invalid("schema message without header"))?;
                let schema = Arc::new(schema_from_fb(schema)?);
                debug!("stream schema: {} fields", schema.num_fields());
                self.schema = Some(schema);
                self.state = BatchState::Ready;
                Ok(None)
            }
            (BatchState::NeedSchema, other) => Err(IpcError::invalid(format!(
                "first message must be a schema, got {other:?}"
            ))),
            (BatchState::Ready, MessageType::DictionaryBatch) => {
                let schema = self.current_schema()?;
                read_dictionary(&schema, &message, &mut self.dictionaries, &self.options)?;
                Ok(None)
            }
            (BatchState::Ready, MessageType::RecordBatch) => {
                let schema = self.current_schema()?;
                let batch = read_record_batch(&schema, &message, &self.options)?;
                Ok(Some(self.dictionaries.attach(&batch)?))
            }
            (_, other) => Err(IpcError::invalid(format!("unexpected {other:?} message"))),
        }
    }

    fn current_schema(&self) -> Result<SchemaRef> {
        self.schema
            .clone()
            .ok_or_else(|| IpcError::invalid("no schema read yet"))
    }
}

impl<S, B> Stream for IpcBatchStream<S, B>
where
    S: GenByteStream<B>,
    B: StreamBuffer + Unpin,
{
    type Item = Result<RecordBatch>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.state == BatchState::Done {
            return Poll::Ready(None);
        }

        loop {
            let frame = match Pin::new(&mut this.inner).poll_next(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(None) => {
                    this.state = BatchState::Done;
                    if this.schema.is_none() {
                        return Poll::Ready(Some(Err(IpcError::invalid(
                            "stream ended before a schema message",
                        ))));
                    }
                    return Poll::Ready(None);
                }
                Poll::Ready(Some(Err(e))) => {
                    this.state = BatchState::Done;
                    return Poll::Ready(Some(Err(e)));
                }
                Poll::Ready(Some(Ok(frame))) => frame,
            };

            match frame {
                IpcStreamFrame::FileHeader | IpcStreamFrame::Trailer => continue,
                IpcStreamFrame::EndOfStream => {
                    this.state = BatchState::Done;
                    return Poll::Ready(None);
                }
                IpcStreamFrame::Message(message) => match this.handle_message(message) {
                    Ok(Some(batch)) => return Poll::Ready(Some(Ok(batch))),
                    Ok(None) => continue,
                    Err(e) => {
                        this.state = BatchState::Done;
                        return Poll::Ready(Some(Err(e)));
                    }
                },
            }
        }
    }
}
