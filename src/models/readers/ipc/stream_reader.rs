//! # Stream reader
//!
//! Reads the stream protocol from any [`RandomAccessSource`]: one schema message, then
//! dictionary and record batch messages in any interleaving, up to the end-of-stream
//! marker or the end of the source.
//!
//! Also home to the one-shot helpers [`deserialize_from_source`] and [`read_schema`].

use std::sync::Arc;

use log::debug;

use crate::enums::MessageType;
use crate::error::{IpcError, Result};
use crate::models::array::record_batch::RecordBatch;
use crate::models::decoders::ipc::message::{read_message, Message};
use crate::models::decoders::ipc::parser::{read_dictionary, read_record_batch};
use crate::models::decoders::ipc::schema::schema_from_fb;
use crate::models::dictionary::DictionaryRegistry;
use crate::models::types::schema::SchemaRef;
use crate::options::IpcReadOptions;
use crate::traits::input_source::RandomAccessSource;

/// Decode the record batch message at the start of `source` against a known schema.
///
/// Dictionary-encoded columns come back without values.
///
/// # Errors
/// `Invalid` when the first message is missing or is not a record batch.
pub fn deserialize_from_source<S: RandomAccessSource + ?Sized>(
    source: &S,
    schema: &SchemaRef,
    options: &IpcReadOptions,
) -> Result<RecordBatch> {
    let mut position = 0;
    let message = read_message(source, &mut position)?
        .ok_or_else(|| IpcError::invalid("source holds no record batch message"))?;
    read_record_batch(schema, &message, options)
}

/// Read a schema message at `*position` plus the dictionary messages directly after it.
///
/// `*position` is left at the first message that is not a dictionary.
pub fn read_schema<S: RandomAccessSource + ?Sized>(
    source: &S,
    position: &mut u64,
    options: &IpcReadOptions,
) -> Result<(SchemaRef, DictionaryRegistry)> {
    let message = read_message(source, position)?
        .ok_or_else(|| IpcError::invalid("expected a schema message, found end of stream"))?;
    let schema = schema_of(&message)?;

    let mut dictionaries = DictionaryRegistry::new();
    loop {
        let before = *position;
        match read_message(source, position)? {
            Some(m) if m.message_type() == MessageType::DictionaryBatch => {
                read_dictionary(&schema, &m, &mut dictionaries, options)?;
            }
            _ => {
                *position = before;
                break;
            }
        }
    }
    Ok((schema, dictionaries))
}

fn schema_of(message: &Message) -> Result<SchemaRef> {
    if message.message_type() != MessageType::Schema {
        return Err(IpcError::invalid(format!(
            "first message must be a schema, got {:?}",
            message.message_type()
        )));
    }
    let header = message.header()?;
    let schema = header
        .header_as_schema()
        .ok_or_else(|| IpcError::invalid("schema message without header"))?;
    Ok(Arc::new(schema_from_fb(schema)?))
}

/// Iterator of record batches over a stream held in a random-access source.
///
/// Batches come back with their dictionaries attached.
pub struct StreamReader<S: RandomAccessSource> {
    source: S,
    position: u64,
    schema: SchemaRef,
    dictionaries: DictionaryRegistry,
    options: IpcReadOptions,
    finished: bool,
}

impl<S: RandomAccessSource> StreamReader<S> {
    /// Read the schema message and get ready to iterate.
    ///
    /// # Errors
    /// `Invalid` when the stream does not open with a schema message.
    pub fn open(source: S, options: IpcReadOptions) -> Result<Self> {
        let mut position = 0;
        let message = read_message(&source, &mut position)?
            .ok_or_else(|| IpcError::invalid("expected a schema message, found end of stream"))?;
        let schema = schema_of(&message)?;
        debug!("stream reader opened: {} fields", schema.num_fields());
        Ok(Self {
            source,
            position,
            schema,
            dictionaries: DictionaryRegistry::new(),
            options,
            finished: false,
        })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn dictionaries(&self) -> &DictionaryRegistry {
        &self.dictionaries
    }

    /// Byte offset of the next unread message.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn into_inner(self) -> S {
        self.source
    }

    fn next_batch(&mut self) -> Result<Option<RecordBatch>> {
        while let Some(message) = read_message(&self.source, &mut self.position)? {
            match message.message_type() {
                MessageType::DictionaryBatch => {
                    read_dictionary(&self.schema, &message, &mut self.dictionaries, &self.options)?;
                }
                MessageType::RecordBatch => {
                    let batch = read_record_batch(&self.schema, &message, &self.options)?;
                    return self.dictionaries.attach(&batch).map(Some);
                }
                other => {
                    return Err(IpcError::invalid(format!("unexpected {other:?} message in stream")))
                }
            }
        }
        Ok(None)
    }
}

impl<S: RandomAccessSource> Iterator for StreamReader<S> {
    type Item = Result<RecordBatch>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_batch() {
            Ok(Some(batch)) => Some(Ok(batch)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(e) => {
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::{dictionary_array, int32_array, utf8_array};
    use crate::models::buffer::Buffer;
    use crate::models::sinks::byte_sink::MemorySink;
    use crate::models::types::datatype::DataType;
    use crate::models::types::schema::{Field, Schema};
    use crate::models::writers::ipc::ipc_writer::{
        open_stream_writer, serialize_record_batch, serialize_schema,
    };
    use crate::options::IpcWriteOptions;

    fn dict_batch(values: &[&str], keys: &[Option<i32>]) -> RecordBatch {
        let dict = Arc::new(utf8_array(&values.iter().map(|v| Some(*v)).collect::<Vec<_>>()));
        let col = dictionary_array(0, int32_array(keys), dict, false).unwrap();
        let schema = Arc::new(Schema::new(vec![Field::new("d", col.data_type().clone(), true)]));
        RecordBatch::try_new(schema, vec![Arc::new(col)]).unwrap()
    }

    #[test]
    fn test_replaced_dictionary_applies_in_order() {
        let first = dict_batch(&["a", "b"], &[Some(0), Some(1)]);
        let second = dict_batch(&["x", "y", "z"], &[Some(2), None]);

        let mut writer = open_stream_writer(MemorySink::<Vec<u8>>::new(), Arc::clone(first.schema())).unwrap();
        writer.write_batch(&first).unwrap();
        let replacement = Arc::clone(second.column(0).dictionary().unwrap());
        writer.replace_dictionary(0, replacement).unwrap();
        writer.write_batch(&second).unwrap();
        writer.close().unwrap();
        let bytes = writer.into_inner().into_buffer();

        let batches: Vec<_> = StreamReader::open(bytes, IpcReadOptions::default())
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(batches, vec![first, second]);
    }

    #[test]
    fn test_non_schema_first_message_rejected() {
        let batch = dict_batch(&["a"], &[Some(0)]);
        let plain = RecordBatch::try_new(
            Arc::new(Schema::new(vec![Field::new("v", DataType::Int32, true)])),
            vec![Arc::new(int32_array(&[Some(1)]))],
        )
        .unwrap();
        let bytes = serialize_record_batch(&plain, &IpcWriteOptions::default()).unwrap();
        assert!(matches!(
            StreamReader::open(bytes.clone(), IpcReadOptions::default()),
            Err(IpcError::Invalid(_))
        ));
        let decoded = deserialize_from_source(&bytes, plain.schema(), &IpcReadOptions::default()).unwrap();
        assert_eq!(decoded, plain);
        assert!(deserialize_from_source(&Buffer::empty(), batch.schema(), &IpcReadOptions::default()).is_err());
    }

    #[test]
    fn test_read_schema_with_dictionaries() {
        let batch = dict_batch(&["p", "q"], &[Some(1)]);
        let mut registry = DictionaryRegistry::new();
        registry.collect_from_batch(&batch).unwrap();
        let bytes = serialize_schema(batch.schema(), &registry, &IpcWriteOptions::default()).unwrap();

        let mut position = 0;
        let (schema, dictionaries) = read_schema(&bytes, &mut position, &IpcReadOptions::default()).unwrap();
        assert_eq!(&schema, batch.schema());
        assert_eq!(dictionaries.get(0).unwrap().as_ref(), registry.get(0).unwrap().as_ref());
        assert_eq!(position, bytes.len() as u64);
    }
}
