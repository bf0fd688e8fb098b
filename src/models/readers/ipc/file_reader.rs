//! # File reader
//!
//! Random-access reader for the file protocol:
//!
//! ```text
//! "ARROW1\0\0" <stream messages> <EOS> <footer> <int32 footer_len> "ARROW1"
//! ```
//!
//! The footer lists every dictionary and record batch block, so batches can be read in
//! any order. Dictionaries are loaded once, when the file is opened.

use std::path::Path;
use std::sync::Arc;

use arrow_ipc as fb;
use flatbuffers::Vector;
use log::debug;

use crate::constants::{
    ARROW_MAGIC_NUMBER, ARROW_MAGIC_NUMBER_PADDED, FILE_CLOSING_MAGIC_LEN,
    FILE_OPENING_MAGIC_LEN, FOOTER_SIZE_PREFIX,
};
use crate::enums::{MessageType, MetadataVersion};
use crate::error::{IpcError, Result};
use crate::models::array::record_batch::RecordBatch;
use crate::models::buffer::Buffer;
use crate::models::decoders::ipc::message::read_message_at;
use crate::models::decoders::ipc::parser::{read_dictionary, read_record_batch};
use crate::models::decoders::ipc::schema::schema_from_fb;
use crate::models::dictionary::DictionaryRegistry;
use crate::models::frames::ipc_message::FileBlock;
use crate::models::types::schema::SchemaRef;
use crate::options::IpcReadOptions;
use crate::traits::input_source::RandomAccessSource;
use crate::utils::read_i32_le;

/// Reader over a complete IPC file held in a [`RandomAccessSource`].
#[derive(Debug)]
pub struct FileReader<S: RandomAccessSource> {
    source: S,
    schema: SchemaRef,
    version: MetadataVersion,
    dictionary_blocks: Vec<FileBlock>,
    record_batch_blocks: Vec<FileBlock>,
    dictionaries: DictionaryRegistry,
    options: IpcReadOptions,
}

impl<S: RandomAccessSource> FileReader<S> {
    /// Open a file that spans the whole source.
    pub fn open(source: S, options: IpcReadOptions) -> Result<Self> {
        let end = source.size()?;
        Self::open_with_footer_offset(source, end, options)
    }

    /// Open a file whose closing magic ends at `footer_offset`.
    ///
    /// Lets a file sit inside a larger source, followed by unrelated bytes.
    ///
    /// # Errors
    /// - `Invalid` on a missing magic, a footer that does not fit, or malformed footer
    ///   metadata.
    /// - `Io` on a short read.
    pub fn open_with_footer_offset(
        source: S,
        footer_offset: u64,
        options: IpcReadOptions,
    ) -> Result<Self> {
        let trailer_len = (FOOTER_SIZE_PREFIX + FILE_CLOSING_MAGIC_LEN) as u64;
        if footer_offset < FILE_OPENING_MAGIC_LEN as u64 + trailer_len {
            return Err(IpcError::invalid(format!(
                "{footer_offset} bytes is too small for an IPC file"
            )));
        }

        let opening = source.read_at(0, FILE_OPENING_MAGIC_LEN)?;
        if opening.as_slice() != ARROW_MAGIC_NUMBER_PADDED {
            return Err(IpcError::invalid("missing opening file magic"));
        }

        let trailer = source.read_at(footer_offset - trailer_len, trailer_len as usize)?;
        if &trailer.as_slice()[FOOTER_SIZE_PREFIX..] != ARROW_MAGIC_NUMBER {
            return Err(IpcError::invalid("missing closing file magic"));
        }
        let footer_len = read_i32_le(trailer.as_slice(), 0);
        let footer_room = footer_offset - trailer_len - FILE_OPENING_MAGIC_LEN as u64;
        if footer_len <= 0 || footer_len as u64 > footer_room {
            return Err(IpcError::invalid(format!("footer length {footer_len} out of bounds")));
        }
        let footer_start = footer_offset - trailer_len - footer_len as u64;
        let footer_bytes = source.read_at(footer_start, footer_len as usize)?;
        let footer = fb::root_as_footer(footer_bytes.as_slice())?;

        let version = MetadataVersion::try_from(footer.version())?;
        let schema = footer
            .schema()
            .ok_or_else(|| IpcError::invalid("file footer has no schema"))?;
        let schema = Arc::new(schema_from_fb(schema)?);
        let dictionary_blocks = blocks_from_fb(footer.dictionaries());
        let record_batch_blocks = blocks_from_fb(footer.recordBatches());

        let mut reader = Self {
            source,
            schema,
            version,
            dictionary_blocks,
            record_batch_blocks,
            dictionaries: DictionaryRegistry::new(),
            options,
        };
        reader.load_dictionaries()?;
        debug!(
            "opened IPC file: {} fields, {} dictionaries, {} record batches",
            reader.schema.num_fields(),
            reader.dictionary_blocks.len(),
            reader.record_batch_blocks.len()
        );
        Ok(reader)
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    /// Metadata version recorded in the footer.
    pub fn version(&self) -> MetadataVersion {
        self.version
    }

    pub fn num_batches(&self) -> usize {
        self.record_batch_blocks.len()
    }

    pub fn num_dictionaries(&self) -> usize {
        self.dictionary_blocks.len()
    }

    pub fn dictionaries(&self) -> &DictionaryRegistry {
        &self.dictionaries
    }

    /// Read the `index`-th record batch, with dictionaries attached.
    ///
    /// # Errors
    /// `Invalid` when `index` is out of range or the block does not hold a record batch.
    pub fn read_batch(&self, index: usize) -> Result<RecordBatch> {
        let block = self.record_batch_blocks.get(index).ok_or_else(|| {
            IpcError::invalid(format!(
                "record batch {index} out of range, file has {}",
                self.record_batch_blocks.len()
            ))
        })?;
        let message = read_message_at(&self.source, block.offset, block.metadata_length)?;
        if message.message_type() != MessageType::RecordBatch {
            return Err(IpcError::invalid(format!(
                "block {index} holds a {:?} message, expected a record batch",
                message.message_type()
            )));
        }
        let batch = read_record_batch(&self.schema, &message, &self.options)?;
        self.dictionaries.attach(&batch)
    }

    /// Iterate every record batch in footer order.
    pub fn batches(&self) -> impl Iterator<Item = Result<RecordBatch>> + '_ {
        (0..self.num_batches()).map(move |i| self.read_batch(i))
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn load_dictionaries(&mut self) -> Result<()> {
        for block in &self.dictionary_blocks {
            let message = read_message_at(&self.source, block.offset, block.metadata_length)?;
            if message.message_type() != MessageType::DictionaryBatch {
                return Err(IpcError::invalid(format!(
                    "dictionary block at {} holds a {:?} message",
                    block.offset,
                    message.message_type()
                )));
            }
            let id = read_dictionary(&self.schema, &message, &mut self.dictionaries, &self.options)?;
            debug!("loaded dictionary {id}");
        }
        Ok(())
    }
}

fn blocks_from_fb(blocks: Option<Vector<'_, fb::Block>>) -> Vec<FileBlock> {
    blocks
        .map(|v| {
            v.iter()
                .map(|b| FileBlock {
                    offset: b.offset(),
                    metadata_length: b.metaDataLength(),
                    body_length: b.bodyLength(),
                })
                .collect()
        })
        .unwrap_or_default()
}

/// Read a whole IPC file into memory and open it.
pub async fn read_file_async(
    path: impl AsRef<Path>,
    options: IpcReadOptions,
) -> Result<FileReader<Buffer>> {
    let bytes = tokio::fs::read(path).await?;
    FileReader::open(Buffer::from_vec(bytes), options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::{dictionary_array, int32_array, int64_array, utf8_array};
    use crate::models::sinks::byte_sink::MemorySink;
    use crate::models::types::datatype::DataType;
    use crate::models::types::schema::{Field, Schema};
    use crate::models::writers::ipc::ipc_writer::open_file_writer;

    fn batches() -> Vec<RecordBatch> {
        let dict = Arc::new(utf8_array(&[Some("lo"), Some("hi")]));
        let make = |ids: &[Option<i64>], keys: &[Option<i32>]| {
            let tags = dictionary_array(3, int32_array(keys), Arc::clone(&dict), false).unwrap();
            let schema = Arc::new(Schema::new(vec![
                Field::new("id", DataType::Int64, true),
                Field::new("tag", tags.data_type().clone(), true),
            ]));
            RecordBatch::try_new(schema, vec![Arc::new(int64_array(ids)), Arc::new(tags)]).unwrap()
        };
        vec![
            make(&[Some(1), Some(2)], &[Some(0), Some(1)]),
            make(&[None, Some(4), Some(5)], &[Some(1), None, Some(0)]),
        ]
    }

    fn file_bytes(batches: &[RecordBatch]) -> Buffer {
        let mut writer = open_file_writer(MemorySink::<Vec<u8>>::new(), Arc::clone(batches[0].schema())).unwrap();
        for b in batches {
            writer.write_batch(b).unwrap();
        }
        writer.close().unwrap();
        writer.into_inner().into_buffer()
    }

    #[test]
    fn test_random_access_batches() {
        let expected = batches();
        let reader = FileReader::open(file_bytes(&expected), IpcReadOptions::default()).unwrap();
        assert_eq!(reader.num_batches(), 2);
        assert_eq!(reader.num_dictionaries(), 1);
        assert_eq!(reader.version(), MetadataVersion::V4);
        assert_eq!(reader.schema(), expected[0].schema());
        assert_eq!(reader.read_batch(1).unwrap(), expected[1]);
        assert_eq!(reader.read_batch(0).unwrap(), expected[0]);
        assert!(matches!(reader.read_batch(2), Err(IpcError::Invalid(_))));
    }

    #[test]
    fn test_open_with_footer_offset_inside_larger_source() {
        let expected = batches();
        let file = file_bytes(&expected);
        let mut padded = file.as_slice().to_vec();
        padded.extend_from_slice(b"unrelated trailing bytes");

        let reader = FileReader::open_with_footer_offset(
            Buffer::from_vec(padded.clone()),
            file.len() as u64,
            IpcReadOptions::default(),
        )
        .unwrap();
        let read: Vec<_> = reader.batches().collect::<Result<_>>().unwrap();
        assert_eq!(read, expected);

        assert!(FileReader::open(Buffer::from_vec(padded), IpcReadOptions::default()).is_err());
    }

    #[test]
    fn test_bad_magic_rejected() {
        let file = file_bytes(&batches());
        let mut bytes = file.as_slice().to_vec();
        bytes[0] = b'X';
        assert!(matches!(
            FileReader::open(Buffer::from_vec(bytes), IpcReadOptions::default()),
            Err(IpcError::Invalid(_))
        ));

        let mut bytes = file.as_slice().to_vec();
        let last = bytes.len() - 1;
        bytes[last] = b'2';
        assert!(matches!(
            FileReader::open(Buffer::from_vec(bytes), IpcReadOptions::default()),
            Err(IpcError::Invalid(_))
        ));

        assert!(FileReader::open(Buffer::from_vec(b"ARROW1".to_vec()), IpcReadOptions::default()).is_err());
    }

    #[tokio::test]
    async fn test_read_file_async() {
        let expected = batches();
        let file = tempfile::NamedTempFile::new().unwrap();
        std::fs::write(file.path(), file_bytes(&expected).as_slice()).unwrap();

        let reader = read_file_async(file.path(), IpcReadOptions::default()).await.unwrap();
        assert_eq!(reader.read_batch(0).unwrap(), expected[0]);
        assert_eq!(reader.dictionaries().len(), 1);
    }
}
