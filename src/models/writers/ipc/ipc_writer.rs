//! # Stream and file writers
//!
//! [`IpcWriter`] writes a schema, its dictionaries and any number of record batches to an
//! [`OutputSink`], in either the stream or the file protocol.
//!
//! ```text
//! stream:  <schema> <dictionary>* <record batch>* <eos>
//! file:    "ARROW1\0\0" <stream> <footer> <int32 footer_len> "ARROW1"
//! ```
//!
//! The writer is an explicit three-state machine. Nothing is written until the first
//! call that needs the stream opened (`start`, `write_batch`, `replace_dictionary` or
//! `close`). That call writes the opening magic in file mode, the schema, and every
//! dictionary registered so far. `close` writes the end-of-stream marker, and in file mode
//! the footer indexing every dictionary and record batch message. Nothing may follow it.

use std::sync::Arc;

use flatbuffers::FlatBufferBuilder;
use log::{debug, trace};

use crate::enums::{IPCMessageProtocol, MessageType, WriterState};
use crate::error::{IpcError, Result};
use crate::models::array::array_data::ArrayRef;
use crate::models::array::record_batch::RecordBatch;
use crate::models::buffer::Buffer;
use crate::models::dictionary::DictionaryRegistry;
use crate::models::encoders::ipc::protocol::{write_frame, write_payload, IPCFrame};
use crate::models::encoders::ipc::record_batch::{assemble_dictionary, assemble_record_batch};
use crate::models::encoders::ipc::schema::{build_footer, build_schema_message};
use crate::models::frames::ipc_message::{FileBlock, IpcPayload};
use crate::models::sinks::byte_sink::{CountingSink, MemorySink};
use crate::models::types::schema::{Schema, SchemaRef};
use crate::options::IpcWriteOptions;
use crate::traits::output_sink::OutputSink;

/// Writer for the stream and file protocols over any [`OutputSink`].
pub struct IpcWriter<S: OutputSink> {
    sink: S,
    schema: SchemaRef,
    protocol: IPCMessageProtocol,
    options: IpcWriteOptions,
    state: WriterState,
    dictionaries: DictionaryRegistry,
    fbb: FlatBufferBuilder<'static>,

    // ----- File format only -----
    dictionary_blocks: Vec<FileBlock>,
    record_batch_blocks: Vec<FileBlock>,
}

impl<S: OutputSink> IpcWriter<S> {
    /// Create a writer. Nothing is written yet.
    ///
    /// # Errors
    /// `Invalid` when `options` fail validation.
    pub fn new(
        sink: S,
        schema: SchemaRef,
        protocol: IPCMessageProtocol,
        options: IpcWriteOptions,
    ) -> Result<Self> {
        options.validate()?;
        Ok(Self {
            sink,
            schema,
            protocol,
            options,
            state: WriterState::NotStarted,
            dictionaries: DictionaryRegistry::new(),
            fbb: FlatBufferBuilder::with_capacity(4096),
            dictionary_blocks: Vec::new(),
            record_batch_blocks: Vec::new(),
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn protocol(&self) -> IPCMessageProtocol {
        self.protocol
    }

    pub fn state(&self) -> WriterState {
        self.state
    }

    pub fn dictionaries(&self) -> &DictionaryRegistry {
        &self.dictionaries
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    pub(crate) fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    /// Give back the sink. A writer that was never closed leaves an unterminated stream.
    pub fn into_inner(self) -> S {
        self.sink
    }

    /// Register the dictionary for `id` ahead of the first write.
    ///
    /// # Errors
    /// `Invalid` if the writer has started, `id` is not a dictionary id of the schema,
    /// the values do not match the declared value type, or `id` is already registered.
    pub fn register_dictionary(&mut self, id: i64, dictionary: ArrayRef) -> Result<()> {
        if self.state != WriterState::NotStarted {
            return Err(IpcError::invalid(format!(
                "cannot register dictionary {id} after the writer started; use replace_dictionary"
            )));
        }
        self.check_dictionary_type(id, &dictionary)?;
        self.dictionaries.insert(id, dictionary)
    }

    /// Swap the dictionary for `id` mid-stream, emitting a new dictionary message.
    ///
    /// # Errors
    /// `Invalid` in file mode (a file holds one dictionary per id), after `close`, or when
    /// the values do not match the schema.
    pub fn replace_dictionary(&mut self, id: i64, dictionary: ArrayRef) -> Result<()> {
        if self.protocol == IPCMessageProtocol::File {
            return Err(IpcError::invalid("the file format does not support dictionary replacement"));
        }
        self.check_open()?;
        self.check_dictionary_type(id, &dictionary)?;
        let started = self.state == WriterState::Started;
        if self.dictionaries.contains(id) {
            self.dictionaries.replace(id, dictionary)?;
        } else {
            self.dictionaries.insert(id, dictionary)?;
        }
        if started {
            debug!("replacing dictionary {id}");
            self.write_dictionary(id)
        } else {
            self.start()
        }
    }

    /// Open the stream: magic (file mode), schema, then registered dictionaries in id
    /// order. A no-op once started.
    pub fn start(&mut self) -> Result<()> {
        match self.state {
            WriterState::Started => return Ok(()),
            WriterState::Closed => return Err(IpcError::invalid("writer already closed")),
            WriterState::NotStarted => {}
        }
        if self.protocol == IPCMessageProtocol::File {
            write_frame(&mut self.sink, &IPCFrame::FileHeader)?;
        }

        let metadata = build_schema_message(&mut self.fbb, &self.schema, self.options.metadata_version);
        let schema_payload = IpcPayload {
            message_type: MessageType::Schema,
            metadata,
            body_buffers: Vec::new(),
            body_length: 0,
        };
        self.write_message(&schema_payload)?;

        let ids: Vec<i64> = self.dictionaries.iter().map(|(id, _)| id).collect();
        for id in &ids {
            self.write_dictionary(*id)?;
        }
        self.state = WriterState::Started;
        debug!(
            "{:?} writer started: {} fields, {} dictionaries",
            self.protocol,
            self.schema.num_fields(),
            ids.len()
        );
        Ok(())
    }

    /// Write one record batch, starting the stream first if needed.
    ///
    /// Dictionaries carried by the batch's columns are registered on first sight.
    ///
    /// # Errors
    /// - `Invalid` after `close`, for a batch built against a different schema, for a
    ///   dictionary that differs from the one registered under its id, or for a
    ///   dictionary field with nothing registered.
    /// - Serializer and sink errors.
    pub fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.check_open()?;
        if batch.schema().fields() != self.schema.fields() {
            return Err(IpcError::invalid("record batch schema does not match the writer schema"));
        }

        // Registration is staged so a rejected batch leaves the registry untouched.
        let known: Vec<i64> = self.dictionaries.iter().map(|(id, _)| id).collect();
        let mut staged = self.dictionaries.clone();
        let conflicts = staged.collect_from_batch(batch)?;
        if let Some(id) = conflicts.first() {
            return Err(IpcError::invalid(format!(
                "batch carries a different dictionary for id {id}; use replace_dictionary"
            )));
        }
        for (id, _) in self.schema.dictionary_types() {
            if !staged.contains(id) {
                return Err(IpcError::invalid(format!("no dictionary registered for id {id}")));
            }
        }
        self.dictionaries = staged;

        if self.state == WriterState::NotStarted {
            self.start()?;
        } else {
            let fresh: Vec<i64> = self
                .dictionaries
                .iter()
                .map(|(id, _)| id)
                .filter(|id| !known.contains(id))
                .collect();
            for id in fresh {
                self.write_dictionary(id)?;
            }
        }

        let payload = assemble_record_batch(&mut self.fbb, batch, &self.options)?;
        let block = self.write_message(&payload)?;
        if self.protocol == IPCMessageProtocol::File {
            self.record_batch_blocks.push(block);
        }
        Ok(())
    }

    /// Write `batch` as consecutive slices of at most `max_chunksize` rows.
    ///
    /// Slices share the batch's buffers; each one is truncated on the way out.
    pub fn write_batch_chunked(&mut self, batch: &RecordBatch, max_chunksize: usize) -> Result<()> {
        if max_chunksize == 0 {
            return Err(IpcError::invalid("max_chunksize must be positive"));
        }
        if batch.num_rows() <= max_chunksize {
            return self.write_batch(batch);
        }
        let mut offset = 0;
        while offset < batch.num_rows() {
            let len = max_chunksize.min(batch.num_rows() - offset);
            self.write_batch(&batch.slice(offset, len)?)?;
            offset += len;
        }
        Ok(())
    }

    /// Finish the stream: end-of-stream marker, plus the footer in file mode.
    ///
    /// A writer that never wrote anything still emits its schema first.
    ///
    /// # Errors
    /// `Invalid` if already closed.
    pub fn close(&mut self) -> Result<()> {
        self.check_open()?;
        self.start()?;

        let legacy = self.options.write_legacy_format;
        write_frame(&mut self.sink, &IPCFrame::EndOfStream { legacy })?;

        if self.protocol == IPCMessageProtocol::File {
            let footer = build_footer(
                &mut self.fbb,
                &self.schema,
                &self.dictionary_blocks,
                &self.record_batch_blocks,
                self.options.metadata_version,
            );
            write_frame(&mut self.sink, &IPCFrame::FileFooter { footer: &footer })?;
        }
        self.sink.flush()?;
        self.state = WriterState::Closed;
        debug!(
            "{:?} writer closed: {} record batches, {} dictionary messages",
            self.protocol,
            self.record_batch_blocks.len(),
            self.dictionary_blocks.len()
        );
        Ok(())
    }

    fn check_open(&self) -> Result<()> {
        if self.state == WriterState::Closed {
            return Err(IpcError::invalid("writer already closed"));
        }
        Ok(())
    }

    fn check_dictionary_type(&self, id: i64, dictionary: &ArrayRef) -> Result<()> {
        let (_, value_type) = self
            .schema
            .dictionary_types()
            .into_iter()
            .find(|(dict_id, _)| *dict_id == id)
            .ok_or_else(|| IpcError::invalid(format!("schema has no dictionary with id {id}")))?;
        if value_type != dictionary.data_type() {
            return Err(IpcError::invalid(format!(
                "dictionary {id} values are {} but the schema declares {value_type}",
                dictionary.data_type()
            )));
        }
        Ok(())
    }

    fn write_dictionary(&mut self, id: i64) -> Result<()> {
        let dictionary = Arc::clone(self.dictionaries.get(id)?);
        let payload = assemble_dictionary(&mut self.fbb, id, &dictionary, &self.options)?;
        let block = self.write_message(&payload)?;
        if self.protocol == IPCMessageProtocol::File {
            self.dictionary_blocks.push(block);
        }
        Ok(())
    }

    fn write_message(&mut self, payload: &IpcPayload) -> Result<FileBlock> {
        let offset = self.sink.tell()? as i64;
        let (metadata_length, body_length) = write_payload(
            &mut self.sink,
            payload,
            self.options.alignment,
            self.options.write_legacy_format,
        )?;
        Ok(FileBlock {
            offset,
            metadata_length,
            body_length,
        })
    }
}

/// Stream-protocol writer with default options.
pub fn open_stream_writer<S: OutputSink>(sink: S, schema: SchemaRef) -> Result<IpcWriter<S>> {
    IpcWriter::new(sink, schema, IPCMessageProtocol::Stream, IpcWriteOptions::default())
}

/// File-protocol writer with default options.
pub fn open_file_writer<S: OutputSink>(sink: S, schema: SchemaRef) -> Result<IpcWriter<S>> {
    IpcWriter::new(sink, schema, IPCMessageProtocol::File, IpcWriteOptions::default())
}

/// Write `batch` as a single record batch message at the sink's position.
///
/// Buffer offsets are relative to the start of the body, so the message is
/// self-contained. The sink position should be 8-byte aligned.
///
/// # Returns
/// `(metadata_length, body_length)`; `metadata_length` includes prefix and padding.
pub fn serialize_to_sink<S: OutputSink + ?Sized>(
    batch: &RecordBatch,
    sink: &mut S,
    options: &IpcWriteOptions,
) -> Result<(i32, i64)> {
    options.validate()?;
    let mut fbb = FlatBufferBuilder::new();
    let payload = assemble_record_batch(&mut fbb, batch, options)?;
    write_payload(sink, &payload, options.alignment, options.write_legacy_format)
}

/// Encode `batch` as one record batch message in memory. Lengths beyond `i32::MAX` are
/// permitted.
pub fn serialize_record_batch(batch: &RecordBatch, options: &IpcWriteOptions) -> Result<Buffer> {
    let options = options.with_allow_64bit(true);
    let mut sink = MemorySink::<Vec<u8>>::new();
    serialize_to_sink(batch, &mut sink, &options)?;
    Ok(sink.into_buffer())
}

/// Encode a schema message followed by one dictionary message per entry of
/// `dictionaries`, in id order.
pub fn serialize_schema(
    schema: &Schema,
    dictionaries: &DictionaryRegistry,
    options: &IpcWriteOptions,
) -> Result<Buffer> {
    options.validate()?;
    let mut fbb = FlatBufferBuilder::new();
    let mut sink = MemorySink::<Vec<u8>>::new();
    let payload = IpcPayload {
        message_type: MessageType::Schema,
        metadata: build_schema_message(&mut fbb, schema, options.metadata_version),
        body_buffers: Vec::new(),
        body_length: 0,
    };
    write_payload(&mut sink, &payload, options.alignment, options.write_legacy_format)?;
    for (id, dictionary) in dictionaries.iter() {
        let payload = assemble_dictionary(&mut fbb, id, dictionary, options)?;
        write_payload(&mut sink, &payload, options.alignment, options.write_legacy_format)?;
    }
    Ok(sink.into_buffer())
}

/// Exact framed size of `batch` as a record batch message, without keeping any bytes.
pub fn record_batch_size(batch: &RecordBatch, options: &IpcWriteOptions) -> Result<u64> {
    let mut counter = CountingSink::new();
    serialize_to_sink(batch, &mut counter, options)?;
    trace!("record batch of {} rows frames to {} bytes", batch.num_rows(), counter.written());
    Ok(counter.written())
}

/// Write a complete stream (schema, dictionaries, batches, end-of-stream) and hand the
/// sink back.
pub fn write_stream<S: OutputSink>(
    sink: S,
    schema: SchemaRef,
    batches: &[RecordBatch],
    options: IpcWriteOptions,
) -> Result<S> {
    let mut writer = IpcWriter::new(sink, schema, IPCMessageProtocol::Stream, options)?;
    for batch in batches {
        writer.write_batch(batch)?;
    }
    writer.close()?;
    Ok(writer.into_inner())
}
