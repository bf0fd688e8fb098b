#[cfg(test)]
mod integration {
    use std::io;
    use std::sync::Arc;

    use ::columnar_ipc::enums::BufferChunkSize;
    use ::columnar_ipc::models::array::builders::{boolean_array, int64_array, utf8_array};
    use ::columnar_ipc::models::readers::ipc::batch_reader::open_file_stream;
    use ::columnar_ipc::models::streams::disk::DiskByteStream;
    use ::columnar_ipc::models::writers::ipc::async_writer::write_batches_to_file;
    use ::columnar_ipc::{
        read_file_async, serialize_record_batch, AsyncIpcWriter, DataType, Field, IPCMessageProtocol,
        IpcBatchStream, IpcError, IpcReadOptions, IpcWriteOptions, RecordBatch, Schema,
    };
    use futures_util::stream::{self, StreamExt};
    use tempfile::NamedTempFile;

    fn events(n: i64) -> RecordBatch {
        let schema = Arc::new(Schema::new(vec![
            Field::new("seq", DataType::Int64, false),
            Field::new("ok", DataType::Boolean, true),
            Field::new("note", DataType::Utf8, true),
        ]));
        let seq: Vec<_> = (0..n).map(Some).collect();
        let ok: Vec<_> = (0..n).map(|i| if i % 3 == 0 { None } else { Some(i % 2 == 0) }).collect();
        let notes: Vec<String> = (0..n).map(|i| format!("event-{i}")).collect();
        let note: Vec<_> = notes.iter().map(|s| Some(s.as_str())).collect();
        RecordBatch::try_new(
            schema,
            vec![
                Arc::new(int64_array(&seq)),
                Arc::new(boolean_array(&ok)),
                Arc::new(utf8_array(&note)),
            ],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_async_file_roundtrip() {
        let expected = vec![events(5), events(130), events(1)];
        let file = NamedTempFile::new().unwrap();
        write_batches_to_file(file.path(), Arc::clone(expected[0].schema()), &expected, IpcWriteOptions::default())
            .await
            .unwrap();

        let reader = read_file_async(file.path(), IpcReadOptions::default()).await.unwrap();
        let read: Vec<_> = reader.batches().collect::<Result<_, _>>().unwrap();
        assert_eq!(read, expected);

        let chunked = open_file_stream(file.path(), BufferChunkSize::Custom(5), IpcReadOptions::default())
            .await
            .unwrap();
        assert_eq!(chunked.read_all().await.unwrap(), expected);
    }

    #[tokio::test]
    async fn test_async_stream_writer_to_disk_stream() {
        let expected = vec![events(17), events(2), events(64)];
        let file = NamedTempFile::new().unwrap();
        let destination = tokio::fs::File::create(file.path()).await.unwrap();
        let options = IpcWriteOptions::default().with_legacy_format(false);
        let mut writer =
            AsyncIpcWriter::new(destination, Arc::clone(expected[0].schema()), IPCMessageProtocol::Stream, options)
                .unwrap();
        for batch in &expected {
            writer.write_batch(batch).await.unwrap();
        }
        writer.finish().await.unwrap();

        let disk = DiskByteStream::open(file.path(), BufferChunkSize::Custom(3)).await.unwrap();
        let mut batches = IpcBatchStream::new(disk, 16, IpcReadOptions::default());
        let mut read = Vec::new();
        while let Some(batch) = batches.next().await {
            read.push(batch.unwrap());
        }
        assert_eq!(read, expected);
        assert_eq!(batches.schema(), Some(expected[0].schema()));
        assert!(batches.is_finished());
    }

    #[tokio::test]
    async fn test_stream_without_schema_is_invalid() {
        let bytes = serialize_record_batch(&events(3), &IpcWriteOptions::default()).unwrap();
        let chunks: Vec<io::Result<Vec<u8>>> = vec![Ok(bytes.as_slice().to_vec())];
        let mut batches = IpcBatchStream::new(stream::iter(chunks), 64, IpcReadOptions::default());
        assert!(matches!(batches.next().await, Some(Err(IpcError::Invalid(_)))));
        assert!(batches.next().await.is_none());
    }
}
