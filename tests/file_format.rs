#[cfg(test)]
mod integration {
    use std::sync::Arc;

    use ::columnar_ipc::constants::{ARROW_MAGIC_NUMBER, ARROW_MAGIC_NUMBER_PADDED};
    use ::columnar_ipc::models::array::builders::{
        dictionary_array, float64_array, int8_array, int32_array, utf8_array,
    };
    use ::columnar_ipc::models::sinks::byte_sink::MemorySink;
    use ::columnar_ipc::{
        open_file_writer, ArrayData, Buffer, FileReader, FileSource, IpcError, IpcReadOptions,
        RecordBatch, Schema, Field, StreamReader,
    };

    fn batch(prices: &[Option<f64>], keys: &[Option<i8>], dict: &Arc<ArrayData>) -> RecordBatch {
        let sym = dictionary_array(1, int8_array(keys), Arc::clone(dict), false).unwrap();
        let schema = Arc::new(Schema::new(vec![
            Field::new("price", ::columnar_ipc::DataType::Float64, true),
            Field::new("sym", sym.data_type().clone(), true),
        ]));
        RecordBatch::try_new(schema, vec![Arc::new(float64_array(prices)), Arc::new(sym)]).unwrap()
    }

    fn batches() -> Vec<RecordBatch> {
        let dict = Arc::new(utf8_array(&[Some("AAPL"), Some("MSFT"), Some("NVDA")]));
        vec![
            batch(&[Some(1.5), None], &[Some(0), Some(2)], &dict),
            batch(&[Some(3.0)], &[None], &dict),
            batch(&[Some(-1.0), Some(2.0), Some(0.0)], &[Some(1), Some(1), Some(0)], &dict),
        ]
    }

    fn write_file(batches: &[RecordBatch]) -> Buffer {
        let mut writer = open_file_writer(MemorySink::<Vec<u8>>::new(), Arc::clone(batches[0].schema())).unwrap();
        for b in batches {
            writer.write_batch(b).unwrap();
        }
        writer.close().unwrap();
        writer.into_inner().into_buffer()
    }

    #[test]
    fn test_file_layout_and_random_access() {
        let expected = batches();
        let bytes = write_file(&expected);
        let raw = bytes.as_slice();
        assert_eq!(&raw[..8], ARROW_MAGIC_NUMBER_PADDED);
        assert_eq!(&raw[raw.len() - 6..], ARROW_MAGIC_NUMBER);

        let reader = FileReader::open(bytes, IpcReadOptions::default()).unwrap();
        assert_eq!(reader.num_batches(), 3);
        assert_eq!(reader.num_dictionaries(), 1);
        for i in (0..3).rev() {
            assert_eq!(reader.read_batch(i).unwrap(), expected[i]);
        }
        let sym = reader.read_batch(0).unwrap();
        assert_eq!(sym.column(1).dictionary().unwrap().value_str(2), Some("NVDA"));
    }

    #[test]
    fn test_file_body_is_readable_as_stream() {
        let expected = batches();
        let bytes = write_file(&expected);
        let body = bytes.slice(8, bytes.len() - 8).unwrap();

        let read: Vec<_> = StreamReader::open(body, IpcReadOptions::default())
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(read, expected);
    }

    #[test]
    fn test_file_source_on_disk() {
        let expected = batches();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), write_file(&expected).as_slice()).unwrap();

        let reader = FileReader::open(FileSource::open(file.path()).unwrap(), IpcReadOptions::default()).unwrap();
        let read: Vec<_> = reader.batches().collect::<Result<_, _>>().unwrap();
        assert_eq!(read, expected);
    }

    #[test]
    fn test_file_writer_rejects_dictionary_replacement() {
        let expected = batches();
        let mut writer = open_file_writer(MemorySink::<Vec<u8>>::new(), Arc::clone(expected[0].schema())).unwrap();
        writer.write_batch(&expected[0]).unwrap();

        let other = Arc::new(utf8_array(&[Some("TSLA")]));
        assert!(matches!(writer.replace_dictionary(1, other), Err(IpcError::Invalid(_))));
    }

    #[test]
    fn test_truncated_file_rejected() {
        let bytes = write_file(&batches());
        let cut = Buffer::from_slice(&bytes.as_slice()[..bytes.len() - 3]);
        assert!(FileReader::open(cut, IpcReadOptions::default()).is_err());

        let plain = Buffer::from_vec(int32_array(&[Some(1)]).buffer(0).as_slice().to_vec());
        assert!(FileReader::open(plain, IpcReadOptions::default()).is_err());
    }
}
