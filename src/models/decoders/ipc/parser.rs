//! # Record batch decoding
//!
//! [`ArrayLoader`] rebuilds arrays from a record batch header and its body, consuming
//! field nodes and buffer descriptors in the same depth-first order the serializer
//! produced them. Every buffer is a view into the body; nothing is copied.
//!
//! Each node consumes its validity slot first, even when its null count is zero and the
//! slot is empty. Dictionary-encoded fields come back as index arrays with no values
//! attached; pair them with a [`DictionaryRegistry`] at the call site.

use std::sync::Arc;

use arrow_ipc as fb;
use flatbuffers::Vector;
use log::trace;

use crate::enums::MessageType;
use crate::error::{IpcError, Result};
use crate::models::array::array_data::{ArrayData, ArrayRef};
use crate::models::array::record_batch::RecordBatch;
use crate::models::buffer::Buffer;
use crate::models::decoders::ipc::message::Message;
use crate::models::dictionary::DictionaryRegistry;
use crate::models::types::datatype::{DataType, UnionMode};
use crate::models::types::schema::{Field, Schema, SchemaRef};
use crate::options::IpcReadOptions;

/// Cursor over one record batch's nodes, buffer descriptors and body.
pub struct ArrayLoader<'a> {
    nodes: Vector<'a, fb::FieldNode>,
    buffers: Vector<'a, fb::Buffer>,
    body: &'a Buffer,
    node_index: usize,
    buffer_index: usize,
    max_recursion_depth: usize,
}

impl<'a> ArrayLoader<'a> {
    pub fn new(batch: fb::RecordBatch<'a>, body: &'a Buffer, options: &IpcReadOptions) -> Result<Self> {
        if batch.compression().is_some() {
            return Err(IpcError::not_implemented("compressed record batch bodies"));
        }
        let nodes = batch
            .nodes()
            .ok_or_else(|| IpcError::invalid("record batch has no field nodes"))?;
        let buffers = batch
            .buffers()
            .ok_or_else(|| IpcError::invalid("record batch has no buffer descriptors"))?;
        Ok(Self {
            nodes,
            buffers,
            body,
            node_index: 0,
            buffer_index: 0,
            max_recursion_depth: options.max_recursion_depth,
        })
    }

    /// Decode the next top-level column described by `field`.
    pub fn load(&mut self, field: &Field) -> Result<ArrayRef> {
        self.load_field(field, self.max_recursion_depth).map(Arc::new)
    }

    fn load_field(&mut self, field: &Field, depth: usize) -> Result<ArrayData> {
        if depth == 0 {
            return Err(IpcError::invalid("max recursion depth reached"));
        }
        let (len, null_count) = self.next_node()?;
        let data_type = field.data_type().clone();

        let validity = if null_count > 0 && data_type != DataType::Null {
            Some(self.next_buffer()?)
        } else {
            self.skip_buffers(1)?;
            None
        };

        let (buffers, children) = match &data_type {
            DataType::Null => {
                self.skip_buffers(1)?;
                (vec![], vec![])
            }
            DataType::Boolean
            | DataType::Int8
            | DataType::Int16
            | DataType::Int32
            | DataType::Int64
            | DataType::UInt8
            | DataType::UInt16
            | DataType::UInt32
            | DataType::UInt64
            | DataType::Float16
            | DataType::Float32
            | DataType::Float64
            | DataType::Date32
            | DataType::Date64
            | DataType::Decimal128 { .. }
            | DataType::FixedSizeBinary(_)
            | DataType::Dictionary { .. } => (vec![self.next_buffer()?], vec![]),
            DataType::Utf8 | DataType::Binary => {
                let offsets = self.next_buffer()?;
                let values = self.next_buffer()?;
                (vec![offsets, values], vec![])
            }
            DataType::List(item) => {
                let offsets = self.next_buffer()?;
                let child = self.load_field(item, depth - 1)?;
                (vec![offsets], vec![Arc::new(child)])
            }
            DataType::Struct(fields) => (vec![], self.load_children(fields, depth)?),
            DataType::Union { mode, fields, .. } => {
                let mut buffers = vec![self.next_buffer()?];
                if *mode == UnionMode::Dense {
                    buffers.push(self.next_buffer()?);
                }
                (buffers, self.load_children(fields, depth)?)
            }
        };

        ArrayData::try_new(data_type, len, 0, validity, buffers, children)
    }

    fn load_children(&mut self, fields: &[Field], depth: usize) -> Result<Vec<ArrayRef>> {
        fields
            .iter()
            .map(|f| self.load_field(f, depth - 1).map(Arc::new))
            .collect()
    }

    fn next_node(&mut self) -> Result<(usize, usize)> {
        if self.node_index >= self.nodes.len() {
            return Err(IpcError::invalid(format!(
                "ran out of field nodes after {}",
                self.node_index
            )));
        }
        let node = self.nodes.get(self.node_index);
        self.node_index += 1;
        let (len, nulls) = (node.length(), node.null_count());
        if len < 0 || nulls < 0 || nulls > len {
            return Err(IpcError::invalid(format!(
                "invalid field node: length {len}, null count {nulls}"
            )));
        }
        Ok((len as usize, nulls as usize))
    }

    fn next_buffer(&mut self) -> Result<Buffer> {
        if self.buffer_index >= self.buffers.len() {
            return Err(IpcError::invalid(format!(
                "ran out of buffer descriptors after {}",
                self.buffer_index
            )));
        }
        let desc = self.buffers.get(self.buffer_index);
        self.buffer_index += 1;
        let (offset, length) = (desc.offset(), desc.length());
        let in_bounds = offset >= 0
            && length >= 0
            && offset.checked_add(length).map_or(false, |end| end as u64 <= self.body.len() as u64);
        if !in_bounds {
            return Err(IpcError::invalid(format!(
                "buffer [{offset}, +{length}) lies outside a body of {} bytes",
                self.body.len()
            )));
        }
        if length == 0 {
            return Ok(Buffer::empty());
        }
        self.body.slice(offset as usize, length as usize)
    }

    fn skip_buffers(&mut self, n: usize) -> Result<()> {
        if self.buffer_index + n > self.buffers.len() {
            return Err(IpcError::invalid(format!(
                "ran out of buffer descriptors after {}",
                self.buffers.len()
            )));
        }
        self.buffer_index += n;
        Ok(())
    }
}

/// Decode a record batch message against `schema`.
///
/// Dictionary-encoded columns come back without their values.
///
/// # Errors
/// `Invalid` when the message is not a record batch, or when its nodes and buffers do not
/// describe arrays of the schema's types.
pub fn read_record_batch(
    schema: &SchemaRef,
    message: &Message,
    options: &IpcReadOptions,
) -> Result<RecordBatch> {
    if message.message_type() != MessageType::RecordBatch {
        return Err(IpcError::invalid(format!(
            "expected a RecordBatch message, got {:?}",
            message.message_type()
        )));
    }
    let header = message.header()?;
    let batch = header
        .header_as_record_batch()
        .ok_or_else(|| IpcError::invalid("record batch message without header"))?;
    let num_rows = usize::try_from(batch.length())
        .map_err(|_| IpcError::invalid(format!("negative row count {}", batch.length())))?;

    let mut loader = ArrayLoader::new(batch, message.body(), options)?;
    let columns = schema
        .fields()
        .iter()
        .map(|f| loader.load(f))
        .collect::<Result<Vec<_>>>()?;
    trace!("decoded record batch: {num_rows} rows, {} columns", columns.len());
    RecordBatch::try_new_with_rows(Arc::clone(schema), columns, num_rows)
}

/// Decode a dictionary message and store its values in `registry`, replacing any
/// dictionary already registered under the same id.
///
/// # Returns
/// The dictionary id.
///
/// # Errors
/// - `Invalid` for a message of another kind, or an id `schema` does not declare.
/// - `NotImplemented` for delta dictionaries.
pub fn read_dictionary(
    schema: &Schema,
    message: &Message,
    registry: &mut DictionaryRegistry,
    options: &IpcReadOptions,
) -> Result<i64> {
    if message.message_type() != MessageType::DictionaryBatch {
        return Err(IpcError::invalid(format!(
            "expected a DictionaryBatch message, got {:?}",
            message.message_type()
        )));
    }
    let header = message.header()?;
    let dict_batch = header
        .header_as_dictionary_batch()
        .ok_or_else(|| IpcError::invalid("dictionary message without header"))?;
    let id = dict_batch.id();
    if dict_batch.isDelta() {
        return Err(IpcError::not_implemented(format!("delta dictionary batch for id {id}")));
    }
    let (_, value_type) = schema
        .dictionary_types()
        .into_iter()
        .find(|(dict_id, _)| *dict_id == id)
        .ok_or_else(|| IpcError::invalid(format!("dictionary id {id} is not in the schema")))?;
    let data = dict_batch
        .data()
        .ok_or_else(|| IpcError::invalid(format!("dictionary {id} has no data")))?;

    let field = Field::new("dictionary", value_type.clone(), true);
    let mut loader = ArrayLoader::new(data, message.body(), options)?;
    let values = loader.load(&field)?;

    trace!("decoded dictionary {id}: {} values", values.len());
    if registry.contains(id) {
        registry.replace(id, values)?;
    } else {
        registry.insert(id, values)?;
    }
    Ok(id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::{
        boolean_array, int32_array, list_array, null_array, struct_array, utf8_array,
    };
    use crate::models::encoders::ipc::record_batch::{assemble_dictionary, assemble_record_batch};
    use crate::options::IpcWriteOptions;
    use flatbuffers::FlatBufferBuilder;

    fn encode(batch: &RecordBatch) -> Message {
        let mut fbb = FlatBufferBuilder::new();
        let payload = assemble_record_batch(&mut fbb, batch, &IpcWriteOptions::default()).unwrap();
        let mut body = Vec::new();
        for b in &payload.body_buffers {
            body.extend_from_slice(b.as_slice());
            body.resize(crate::utils::padded_len(body.len(), 8), 0);
        }
        Message::open(Buffer::from_vec(payload.metadata), Buffer::from_vec(body)).unwrap()
    }

    fn batch_of(columns: Vec<(&str, ArrayData)>) -> RecordBatch {
        let fields = columns
            .iter()
            .map(|(n, a)| Field::new(*n, a.data_type().clone(), true))
            .collect();
        let arrays = columns.into_iter().map(|(_, a)| Arc::new(a)).collect();
        RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).unwrap()
    }

    #[test]
    fn test_flat_columns_round_trip() {
        let batch = batch_of(vec![
            ("i", int32_array(&[Some(1), None, Some(3)])),
            ("b", boolean_array(&[Some(true), Some(false), None])),
            ("s", utf8_array(&[None, Some("hello"), Some("")])),
            ("n", null_array(3)),
        ]);
        let message = encode(&batch);
        let decoded = read_record_batch(batch.schema(), &message, &IpcReadOptions::default()).unwrap();
        assert_eq!(decoded, batch);
        assert_eq!(decoded.column(3).null_count(), 3);
    }

    #[test]
    fn test_nested_round_trip() {
        let item = Field::new("item", DataType::Int32, true);
        let list = list_array(item, vec![0, 2, 2, 3], Some(&[true, false, true]), int32_array(&[Some(7), None, Some(9)])).unwrap();
        let strukt = struct_array(
            vec![
                (Field::new("x", DataType::Int32, true), int32_array(&[Some(1), Some(2), Some(3)])),
                (Field::new("y", DataType::Utf8, true), utf8_array(&[Some("a"), None, Some("c")])),
            ],
            None,
        )
        .unwrap();
        let batch = batch_of(vec![("l", list), ("s", strukt)]);
        let message = encode(&batch);
        let decoded = read_record_batch(batch.schema(), &message, &IpcReadOptions::default()).unwrap();
        assert_eq!(decoded, batch);
    }

    #[test]
    fn test_depth_limit_on_read() {
        let strukt = struct_array(
            vec![(Field::new("x", DataType::Int32, true), int32_array(&[Some(1)]))],
            None,
        )
        .unwrap();
        let batch = batch_of(vec![("s", strukt)]);
        let message = encode(&batch);
        let shallow = IpcReadOptions::default().with_max_recursion_depth(1);
        assert!(matches!(
            read_record_batch(batch.schema(), &message, &shallow),
            Err(IpcError::Invalid(_))
        ));
    }

    #[test]
    fn test_wrong_message_kind_rejected() {
        let batch = batch_of(vec![("i", int32_array(&[Some(1)]))]);
        let dict_schema = Schema::new(vec![Field::new(
            "d",
            DataType::try_dictionary(0, DataType::Int8, DataType::Int32, false).unwrap(),
            true,
        )]);
        let message = encode(&batch);
        let mut registry = DictionaryRegistry::new();
        assert!(read_dictionary(&dict_schema, &message, &mut registry, &IpcReadOptions::default()).is_err());
    }

    #[test]
    fn test_dictionary_message_fills_registry() {
        let values: ArrayRef = Arc::new(utf8_array(&[Some("lo"), Some("hi")]));
        let mut fbb = FlatBufferBuilder::new();
        let payload = assemble_dictionary(&mut fbb, 5, &values, &IpcWriteOptions::default()).unwrap();
        let mut body = Vec::new();
        for b in &payload.body_buffers {
            body.extend_from_slice(b.as_slice());
            body.resize(crate::utils::padded_len(body.len(), 8), 0);
        }
        let message = Message::open(Buffer::from_vec(payload.metadata), Buffer::from_vec(body)).unwrap();

        let schema = Schema::new(vec![Field::new(
            "d",
            DataType::try_dictionary(5, DataType::Int8, DataType::Utf8, false).unwrap(),
            true,
        )]);
        let mut registry = DictionaryRegistry::new();
        let id = read_dictionary(&schema, &message, &mut registry, &IpcReadOptions::default()).unwrap();
        assert_eq!(id, 5);
        assert_eq!(registry.get(5).unwrap().as_ref(), values.as_ref());

        // a second message for the same id replaces the values
        read_dictionary(&schema, &message, &mut registry, &IpcReadOptions::default()).unwrap();
        assert_eq!(registry.len(), 1);
    }
}
