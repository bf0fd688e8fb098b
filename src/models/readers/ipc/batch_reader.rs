//! # Async batch reader
//!
//! Convenience layer over [`IpcBatchStream`] for callers that want whole batches rather
//! than a `Stream`, plus [`open_file_stream`] for reading a file or stream off disk in
//! chunks without loading it whole.

use std::path::Path;

use futures_util::StreamExt;

use crate::constants::DEFAULT_FRAME_ALLOCATION_SIZE;
use crate::enums::BufferChunkSize;
use crate::error::Result;
use crate::models::array::record_batch::RecordBatch;
use crate::models::decoders::ipc::batch_stream::IpcBatchStream;
use crate::models::streams::disk::DiskByteStream;
use crate::models::types::schema::SchemaRef;
use crate::options::IpcReadOptions;
use crate::traits::byte_stream::GenByteStream;
use crate::traits::stream_buffer::StreamBuffer;

pub struct IpcBatchReader<S, B>
where
    S: GenByteStream<B>,
    B: StreamBuffer + Unpin,
{
    stream: IpcBatchStream<S, B>,
}

impl<S, B> IpcBatchReader<S, B>
where
    S: GenByteStream<B>,
    B: StreamBuffer + Unpin,
{
    pub fn new(stream: S, initial_capacity: usize, options: IpcReadOptions) -> Self {
        Self {
            stream: IpcBatchStream::new(stream, initial_capacity, options),
        }
    }

    /// Read all remaining batches.
    pub async fn read_all(self) -> Result<Vec<RecordBatch>> {
        self.read_batches(None).await
    }

    /// Read up to `n` batches, or all of them when `n` is `None`.
    ///
    /// An unbounded stream without an end-of-stream marker never finishes with `None`.
    pub async fn read_batches(mut self, n: Option<usize>) -> Result<Vec<RecordBatch>> {
        let mut batches = Vec::new();
        while n.map_or(true, |max| batches.len() < max) {
            match self.stream.next().await {
                Some(batch) => batches.push(batch?),
                None => break,
            }
        }
        Ok(batches)
    }

    /// The next batch, or `None` at end of stream.
    pub async fn read_next(&mut self) -> Result<Option<RecordBatch>> {
        self.stream.next().await.transpose()
    }

    /// Available once the schema message has been read.
    pub fn schema(&self) -> Option<&SchemaRef> {
        self.stream.schema()
    }

    pub fn into_stream(self) -> IpcBatchStream<S, B> {
        self.stream
    }
}

/// Open an IPC file or stream on disk as a chunked batch reader.
pub async fn open_file_stream(
    path: impl AsRef<Path>,
    chunk_size: BufferChunkSize,
    options: IpcReadOptions,
) -> Result<IpcBatchReader<DiskByteStream, Vec<u8>>> {
    let disk = DiskByteStream::open(path, chunk_size).await?;
    Ok(IpcBatchReader::new(disk, DEFAULT_FRAME_ALLOCATION_SIZE, options))
}
