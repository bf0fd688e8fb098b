//! # Async writer
//!
//! [`AsyncIpcWriter`] drives an [`IpcWriter`] over an in-memory sink and moves each
//! message out to a tokio [`AsyncWrite`] as soon as it is complete. Encoding stays
//! synchronous; only the transfer to the destination awaits.

use std::path::Path;

use tokio::fs::File;
use tokio::io::{AsyncWrite, AsyncWriteExt};

use crate::enums::{IPCMessageProtocol, WriterState};
use crate::error::Result;
use crate::models::array::array_data::ArrayRef;
use crate::models::array::record_batch::RecordBatch;
use crate::models::sinks::byte_sink::MemorySink;
use crate::models::types::schema::SchemaRef;
use crate::models::writers::ipc::ipc_writer::IpcWriter;
use crate::options::IpcWriteOptions;

/// Async stream or file writer.
///
/// The inner sink keeps counting drained bytes, so file block offsets stay absolute.
pub struct AsyncIpcWriter<W>
where
    W: AsyncWrite + Unpin,
{
    destination: W,
    inner: IpcWriter<MemorySink<Vec<u8>>>,
}

impl<W> AsyncIpcWriter<W>
where
    W: AsyncWrite + Unpin,
{
    pub fn new(
        destination: W,
        schema: SchemaRef,
        protocol: IPCMessageProtocol,
        options: IpcWriteOptions,
    ) -> Result<Self> {
        Ok(Self {
            destination,
            inner: IpcWriter::new(MemorySink::with_capacity(4096), schema, protocol, options)?,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        self.inner.schema()
    }

    pub fn protocol(&self) -> IPCMessageProtocol {
        self.inner.protocol()
    }

    pub fn state(&self) -> WriterState {
        self.inner.state()
    }

    /// Register a dictionary before the first write.
    pub fn register_dictionary(&mut self, id: i64, dictionary: ArrayRef) -> Result<()> {
        self.inner.register_dictionary(id, dictionary)
    }

    /// Replace a dictionary mid-stream and send the new dictionary message.
    pub async fn replace_dictionary(&mut self, id: i64, dictionary: ArrayRef) -> Result<()> {
        self.inner.replace_dictionary(id, dictionary)?;
        self.drain().await
    }

    /// Write a single record batch and flush it to the destination.
    pub async fn write_batch(&mut self, batch: &RecordBatch) -> Result<()> {
        self.inner.write_batch(batch)?;
        self.drain().await?;
        self.destination.flush().await?;
        Ok(())
    }

    /// Write all batches, then close.
    pub async fn write_all_batches<'a, I>(&mut self, batches: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a RecordBatch>,
    {
        for batch in batches {
            self.inner.write_batch(batch)?;
            self.drain().await?;
        }
        self.finish().await
    }

    /// Write the end-of-stream marker (and footer in file mode) and shut the
    /// destination down. Must be called after the last batch.
    pub async fn finish(&mut self) -> Result<()> {
        self.inner.close()?;
        self.drain().await?;
        self.destination.shutdown().await?;
        Ok(())
    }

    pub fn into_inner(self) -> W {
        self.destination
    }

    async fn drain(&mut self) -> Result<()> {
        let sink = self.inner.sink_mut();
        if sink.is_empty() {
            return Ok(());
        }
        let bytes = sink.take();
        self.destination.write_all(&bytes).await?;
        Ok(())
    }
}

/// Write `batches` to `path` in the file format.
pub async fn write_batches_to_file(
    path: impl AsRef<Path>,
    schema: SchemaRef,
    batches: &[RecordBatch],
    options: IpcWriteOptions,
) -> Result<()> {
    let file = File::create(path).await?;
    let mut writer = AsyncIpcWriter::new(file, schema, IPCMessageProtocol::File, options)?;
    writer.write_all_batches(batches).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::{ARROW_MAGIC_NUMBER, ARROW_MAGIC_NUMBER_PADDED};
    use crate::models::array::builders::{int64_array, utf8_array};
    use crate::models::types::datatype::DataType;
    use crate::models::types::schema::{Field, Schema};
    use crate::models::writers::ipc::ipc_writer::open_file_writer;
    use std::sync::Arc;
    use tempfile::NamedTempFile;
    use tokio::io::AsyncReadExt;

    fn batch() -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("id", DataType::Int64, false),
            Field::new("name", DataType::Utf8, true),
        ]));
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(int64_array(&[Some(1), Some(2), Some(3)])),
                Arc::new(utf8_array(&[Some("a"), None, Some("ccc")])),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_async_file_matches_sync_bytes() {
        let batch = batch();
        let tmp = NamedTempFile::new().unwrap();
        write_batches_to_file(
            tmp.path(),
            Arc::clone(batch.schema()),
            &[batch.clone(), batch.clone()],
            IpcWriteOptions::default(),
        )
        .await
        .unwrap();

        let mut written = Vec::new();
        File::open(tmp.path()).await.unwrap().read_to_end(&mut written).await.unwrap();

        let mut sync = open_file_writer(MemorySink::<Vec<u8>>::new(), Arc::clone(batch.schema())).unwrap();
        sync.write_batch(&batch).unwrap();
        sync.write_batch(&batch).unwrap();
        sync.close().unwrap();
        let expected = sync.into_inner().into_buffer();

        assert_eq!(written.as_slice(), expected.as_slice());
        assert_eq!(&written[..8], ARROW_MAGIC_NUMBER_PADDED);
        assert_eq!(&written[written.len() - 6..], ARROW_MAGIC_NUMBER);
    }

    #[tokio::test]
    async fn test_async_stream_to_memory() {
        let batch = batch();
        let mut writer = AsyncIpcWriter::new(
            Vec::<u8>::new(),
            Arc::clone(batch.schema()),
            IPCMessageProtocol::Stream,
            IpcWriteOptions::default().with_legacy_format(false),
        )
        .unwrap();
        writer.write_batch(&batch).await.unwrap();
        assert_eq!(writer.state(), WriterState::Started);
        writer.finish().await.unwrap();
        assert_eq!(writer.state(), WriterState::Closed);

        let out = writer.into_inner();
        assert_eq!(out.len() % 8, 0);
        assert_eq!(&out[out.len() - 8..], &[0xFF, 0xFF, 0xFF, 0xFF, 0, 0, 0, 0]);
    }
}
