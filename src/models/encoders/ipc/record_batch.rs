//! # Record batch serializer
//!
//! Walks the columns of a batch depth-first and collects, per array node, one field node
//! and the node's physical buffers, cut down to exactly what the node's slice covers.
//! The buffer list is then laid out back to back, each padded to 8 bytes, which fixes
//! the `{offset, length}` pairs written into the message metadata.
//!
//! Every node contributes a validity slot first. Nodes without nulls contribute an empty
//! placeholder there, so readers can count buffers without looking at the data.
//!
//! | Type                        | Buffers after validity          | Children            |
//! |-----------------------------|---------------------------------|---------------------|
//! | Null                        | one empty buffer                | none                |
//! | Boolean                     | bits                            | none                |
//! | Fixed width / dictionary    | values (dictionary: indices)    | none                |
//! | Utf8 / Binary               | rebased offsets, values         | none                |
//! | List                        | rebased offsets                 | value range         |
//! | Struct                      | none                            | congruent slices    |
//! | Sparse union                | type ids                        | congruent slices    |
//! | Dense union                 | type ids, rebased offsets       | referenced ranges   |
//!
//! Dense unions sliced to a non-zero offset are rebased by scanning every slot of the
//! slice twice: once for the lowest offset per child, once to shift the offsets and
//! measure how far into each child the slice reaches. That costs O(len) per union node
//! on every call.

use std::borrow::Cow;
use std::sync::Arc;

use arrow_ipc as fb;
use log::trace;

use crate::enums::MessageType;
use crate::error::{IpcError, Result};
use crate::models::array::array_data::{ArrayData, ArrayRef};
use crate::models::array::record_batch::RecordBatch;
use crate::models::buffer::Buffer;
use crate::models::encoders::ipc::bitmap::truncated_bitmap;
use crate::models::encoders::ipc::schema::{build_dictionary_message, build_record_batch_message};
use crate::models::encoders::ipc::slicer::{
    rebase_offsets, truncate_fixed, truncate_values, value_bounds,
};
use crate::models::frames::ipc_message::IpcPayload;
use crate::models::types::datatype::{DataType, UnionMode};
use crate::models::types::schema::{Field, Schema};
use crate::options::IpcWriteOptions;
use crate::utils::padded_len;

/// `{length, null_count, offset}` for one visited array node.
///
/// `offset` is always 0 on the write side: every buffer is truncated to start at the
/// node's first slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldNodeMeta {
    pub length: i64,
    pub null_count: i64,
    pub offset: i64,
}

/// `{offset, length}` of one body buffer, length including its padding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferMeta {
    pub offset: i64,
    pub length: i64,
}

/// Everything the serializer learned about a batch body.
#[derive(Debug, Clone, Default)]
pub struct EncodedBody {
    pub field_nodes: Vec<FieldNodeMeta>,
    pub buffers: Vec<BufferMeta>,
    pub body_buffers: Vec<Buffer>,
    pub body_length: i64,
}

impl EncodedBody {
    pub(crate) fn fb_nodes(&self) -> Vec<fb::FieldNode> {
        self.field_nodes
            .iter()
            .map(|n| fb::FieldNode::new(n.length, n.null_count))
            .collect()
    }

    pub(crate) fn fb_buffers(&self) -> Vec<fb::Buffer> {
        self.buffers
            .iter()
            .map(|b| fb::Buffer::new(b.offset, b.length))
            .collect()
    }
}

/// Depth-first buffer collector for one batch.
pub struct RecordBatchSerializer {
    max_recursion_depth: usize,
    allow_64bit: bool,
    /// Frame of reference for buffer offsets; 0 for self-contained messages.
    buffer_start_offset: i64,
    body: EncodedBody,
}

impl RecordBatchSerializer {
    pub fn new(options: &IpcWriteOptions, buffer_start_offset: i64) -> Self {
        Self {
            max_recursion_depth: options.max_recursion_depth,
            allow_64bit: options.allow_64bit,
            buffer_start_offset,
            body: EncodedBody::default(),
        }
    }

    /// Visit every column in order and lay out the collected buffers.
    ///
    /// # Errors
    /// - `Invalid` when nesting exceeds the configured depth or a union slot carries a
    ///   type id with no matching child.
    /// - `Capacity` for arrays longer than `i32::MAX` without 64-bit mode.
    pub fn assemble(mut self, columns: &[ArrayRef]) -> Result<EncodedBody> {
        for column in columns {
            self.visit_array(column, self.max_recursion_depth)?;
        }

        let mut offset = self.buffer_start_offset;
        self.body.buffers.reserve(self.body.body_buffers.len());
        for buffer in &self.body.body_buffers {
            let length = padded_len(buffer.len(), 8) as i64;
            self.body.buffers.push(BufferMeta { offset, length });
            offset += length;
        }
        self.body.body_length = offset - self.buffer_start_offset;
        debug_assert!(self.body.body_length % 8 == 0);
        Ok(self.body)
    }

    fn visit_array(&mut self, array: &ArrayData, depth: usize) -> Result<()> {
        if depth == 0 {
            return Err(IpcError::invalid("max recursion depth reached"));
        }
        if !self.allow_64bit && array.len() > i32::MAX as usize {
            return Err(IpcError::Capacity(format!(
                "cannot write arrays longer than 2^31 - 1 slots without 64-bit mode, got {}",
                array.len()
            )));
        }

        self.body.field_nodes.push(FieldNodeMeta {
            length: array.len() as i64,
            null_count: array.null_count() as i64,
            offset: 0,
        });
        let validity = match array.validity() {
            Some(bitmap) if array.null_count() > 0 => {
                truncated_bitmap(bitmap, array.offset(), array.len())
            }
            _ => Buffer::empty(),
        };
        self.body.body_buffers.push(validity);

        self.visit_values(array, depth)
    }

    fn visit_values(&mut self, array: &ArrayData, depth: usize) -> Result<()> {
        use DataType::*;
        let offset = array.offset();
        let len = array.len();
        match array.data_type() {
            Null => self.body.body_buffers.push(Buffer::empty()),
            Boolean => {
                let bits = if len == 0 {
                    Buffer::empty()
                } else {
                    truncated_bitmap(array.buffer(0), offset, len)
                };
                self.body.body_buffers.push(bits);
            }
            Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64 | Float16
            | Float32 | Float64 | Date32 | Date64 | Decimal128 { .. } | FixedSizeBinary(_)
            | Dictionary { .. } => {
                // dictionary values travel in their own message; only indices go here
                let width = array.data_type().byte_width().unwrap_or(0);
                let values = truncate_fixed(array.buffer(0), offset, len, width)?;
                self.body.body_buffers.push(values);
            }
            Utf8 | Binary => {
                let offsets = array.buffer(0);
                let (first, last) = value_bounds(offsets, offset, len);
                self.body.body_buffers.push(rebase_offsets(offsets, offset, len)?);
                self.body
                    .body_buffers
                    .push(truncate_values(array.buffer(1), first, last)?);
            }
            List(_) => {
                let offsets = array.buffer(0);
                let (first, last) = value_bounds(offsets, offset, len);
                self.body.body_buffers.push(rebase_offsets(offsets, offset, len)?);

                let values = array.child(0);
                let values_len = last - first;
                if offset != 0 || values_len < values.len() {
                    let sliced = values.slice(first, values_len)?;
                    self.visit_array(&sliced, depth - 1)?;
                } else {
                    self.visit_array(values, depth - 1)?;
                }
            }
            Struct(_) => {
                for child in array.children() {
                    let child = congruent_child(child, offset, len)?;
                    self.visit_array(&child, depth - 1)?;
                }
            }
            Union { mode: UnionMode::Sparse, .. } => {
                self.body
                    .body_buffers
                    .push(truncate_fixed(array.buffer(0), offset, len, 1)?);
                for child in array.children() {
                    let child = congruent_child(child, offset, len)?;
                    self.visit_array(&child, depth - 1)?;
                }
            }
            Union { mode: UnionMode::Dense, .. } => {
                self.body
                    .body_buffers
                    .push(truncate_fixed(array.buffer(0), offset, len, 1)?);
                self.visit_dense_union(array, depth)?;
            }
        }
        Ok(())
    }

    fn visit_dense_union(&mut self, array: &ArrayData, depth: usize) -> Result<()> {
        let offset = array.offset();
        let len = array.len();
        let value_offsets = array.buffer(1);

        if offset == 0 {
            self.body
                .body_buffers
                .push(truncate_fixed(value_offsets, 0, len, 4)?);
            for child in array.children() {
                self.visit_array(child, depth - 1)?;
            }
            return Ok(());
        }

        let num_children = array.children().len();
        let mut child_offsets = vec![-1i64; num_children];
        let mut child_lengths = vec![0i64; num_children];
        let mut slots = Vec::with_capacity(len);

        for i in 0..len {
            let child = array.union_child_index(i).ok_or_else(|| {
                IpcError::invalid(format!("union type id {} has no child", array.type_id(i)))
            })?;
            let value_offset = value_offsets.value::<i32>(offset + i) as i64;
            if child_offsets[child] == -1 || value_offset < child_offsets[child] {
                child_offsets[child] = value_offset;
            }
            slots.push((child, value_offset));
        }

        let mut shifted = Vec::with_capacity(len);
        for (child, value_offset) in slots {
            let rebased = value_offset - child_offsets[child];
            child_lengths[child] = child_lengths[child].max(rebased + 1);
            shifted.push(rebased as i32);
        }
        self.body.body_buffers.push(Buffer::from_values(&shifted));

        for (i, child) in array.children().iter().enumerate() {
            let child_offset = child_offsets[i];
            let child_length = child_lengths[i] as usize;
            if child_offset > 0 {
                let sliced = child.slice(child_offset as usize, child_length)?;
                self.visit_array(&sliced, depth - 1)?;
            } else if child_length < child.len() {
                let sliced = child.slice(0, child_length)?;
                self.visit_array(&sliced, depth - 1)?;
            } else {
                self.visit_array(child, depth - 1)?;
            }
        }
        Ok(())
    }
}

/// Child of a struct or sparse union restricted to the parent's slot range.
fn congruent_child(child: &ArrayRef, offset: usize, len: usize) -> Result<Cow<'_, ArrayData>> {
    if offset != 0 || child.len() != len {
        Ok(Cow::Owned(child.slice(offset, len)?))
    } else {
        Ok(Cow::Borrowed(child.as_ref()))
    }
}

/// Serialize a batch into a record batch payload: metadata flatbuffer plus the ordered
/// body buffers.
///
/// # Arguments
/// - `fbb`: Reusable builder; reset before use.
/// - `batch`: Batch to encode. Sliced batches are truncated, never copied wholesale.
/// - `options`: Depth limit, 64-bit mode and metadata version.
///
/// # Errors
/// Propagates serializer errors; see [`RecordBatchSerializer::assemble`].
pub fn assemble_record_batch(
    fbb: &mut flatbuffers::FlatBufferBuilder<'static>,
    batch: &RecordBatch,
    options: &IpcWriteOptions,
) -> Result<IpcPayload> {
    let body = RecordBatchSerializer::new(options, 0).assemble(batch.columns())?;
    let metadata = build_record_batch_message(
        fbb,
        batch.num_rows(),
        &body.fb_nodes(),
        &body.fb_buffers(),
        body.body_length,
        options.metadata_version,
    );
    trace!(
        "assembled record batch: {} rows, {} nodes, {} buffers, body {} bytes",
        batch.num_rows(),
        body.field_nodes.len(),
        body.body_buffers.len(),
        body.body_length
    );
    Ok(IpcPayload {
        message_type: MessageType::RecordBatch,
        metadata,
        body_buffers: body.body_buffers,
        body_length: body.body_length,
    })
}

/// Serialize dictionary values as a dictionary batch payload.
///
/// The values are encoded as a one-column batch and wrapped with the dictionary id.
/// Replacement messages are never deltas.
pub fn assemble_dictionary(
    fbb: &mut flatbuffers::FlatBufferBuilder<'static>,
    id: i64,
    dictionary: &ArrayRef,
    options: &IpcWriteOptions,
) -> Result<IpcPayload> {
    let schema = Schema::new(vec![Field::new(
        "dictionary",
        dictionary.data_type().clone(),
        true,
    )]);
    let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::clone(dictionary)])?;
    let body = RecordBatchSerializer::new(options, 0).assemble(batch.columns())?;
    let metadata = build_dictionary_message(
        fbb,
        id,
        batch.num_rows(),
        &body.fb_nodes(),
        &body.fb_buffers(),
        body.body_length,
        options.metadata_version,
    );
    trace!("assembled dictionary {id}: {} values", dictionary.len());
    Ok(IpcPayload {
        message_type: MessageType::DictionaryBatch,
        metadata,
        body_buffers: body.body_buffers,
        body_length: body.body_length,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::{
        boolean_array, int32_array, int64_array, list_array, null_array, struct_array,
        union_array, utf8_array,
    };

    fn serialize(columns: Vec<ArrayData>) -> EncodedBody {
        let columns: Vec<ArrayRef> = columns.into_iter().map(Arc::new).collect();
        RecordBatchSerializer::new(&IpcWriteOptions::default(), 0)
            .assemble(&columns)
            .unwrap()
    }

    #[test]
    fn test_primitive_without_nulls_uses_placeholder() {
        let body = serialize(vec![int32_array(&[Some(1), Some(2), Some(3)])]);
        assert_eq!(body.field_nodes, vec![FieldNodeMeta { length: 3, null_count: 0, offset: 0 }]);
        assert_eq!(body.body_buffers.len(), 2);
        assert!(body.body_buffers[0].is_empty());
        assert_eq!(body.buffers[0], BufferMeta { offset: 0, length: 0 });
        assert_eq!(body.buffers[1], BufferMeta { offset: 0, length: 16 });
        assert_eq!(body.body_length, 16);
    }

    #[test]
    fn test_buffer_offsets_are_padded_and_monotone() {
        let body = serialize(vec![
            int32_array(&[Some(1), None, Some(3)]),
            utf8_array(&[Some("abc"), Some("de")]),
            boolean_array(&[Some(true), Some(false)]),
        ]);
        let mut expected = 0;
        for meta in &body.buffers {
            assert_eq!(meta.offset, expected);
            assert_eq!(meta.offset % 8, 0);
            assert_eq!(meta.length % 8, 0);
            expected += meta.length;
        }
        assert_eq!(body.body_length, expected);
    }

    #[test]
    fn test_null_column_layout() {
        let body = serialize(vec![null_array(4)]);
        assert_eq!(body.field_nodes[0].null_count, 4);
        assert_eq!(body.body_buffers.len(), 2);
        assert!(body.body_buffers.iter().all(|b| b.is_empty()));
    }

    #[test]
    fn test_sliced_utf8_is_rebased() {
        let arr = utf8_array(&[Some("aa"), Some("bbb"), Some("c"), Some("dddd")]);
        let body = serialize(vec![arr.slice(1, 2).unwrap()]);
        assert_eq!(body.body_buffers[1].to_values::<i32>(), vec![0, 3, 4]);
        assert_eq!(&body.body_buffers[2][..4], b"bbbc");
    }

    #[test]
    fn test_sliced_list_slices_child_to_value_range() {
        let values = int64_array(&(0..10).map(Some).collect::<Vec<_>>());
        let list = list_array(
            Field::new("item", DataType::Int64, true),
            vec![0, 2, 5, 7, 10],
            None,
            values,
        )
        .unwrap();
        let body = serialize(vec![list.slice(1, 2).unwrap()]);
        assert_eq!(body.field_nodes[1].length, 5);
        assert_eq!(body.body_buffers[1].to_values::<i32>(), vec![0, 3, 5]);
        assert_eq!(body.body_buffers[3].value::<i64>(0), 2);
    }

    #[test]
    fn test_struct_children_follow_parent_slice() {
        let s = struct_array(
            vec![
                (Field::new("a", DataType::Int32, true), int32_array(&[Some(1), Some(2), Some(3)])),
                (Field::new("b", DataType::Utf8, true), utf8_array(&[Some("x"), None, Some("z")])),
            ],
            None,
        )
        .unwrap();
        let body = serialize(vec![s.slice(1, 2).unwrap()]);
        assert_eq!(body.field_nodes.len(), 3);
        assert_eq!(body.field_nodes[1].length, 2);
        assert_eq!(body.field_nodes[2], FieldNodeMeta { length: 2, null_count: 1, offset: 0 });
        assert_eq!(body.body_buffers[2].value::<i32>(0), 2);
    }

    #[test]
    fn test_sliced_dense_union_rebases_children() {
        let fields = vec![
            Field::new("i", DataType::Int32, true),
            Field::new("s", DataType::Utf8, true),
        ];
        let ints = int32_array(&[Some(10), Some(11), Some(12)]);
        let strs = utf8_array(&[Some("a"), Some("b")]);
        // slots: i0 s0 i1 s1 i2
        let union = union_array(
            UnionMode::Dense,
            fields,
            vec![0, 1],
            vec![0, 1, 0, 1, 0],
            Some(vec![0, 0, 1, 1, 2]),
            vec![ints, strs],
        )
        .unwrap();
        // keep i1 s1 i2
        let body = serialize(vec![union.slice(2, 3).unwrap()]);
        assert_eq!(body.body_buffers[2].to_values::<i32>(), vec![0, 0, 1]);
        assert_eq!(body.field_nodes[1].length, 2);
        assert_eq!(body.field_nodes[2].length, 1);
        assert_eq!(body.body_buffers[4].value::<i32>(0), 11);
    }

    #[test]
    fn test_depth_and_capacity_limits() {
        let inner = list_array(
            Field::new("item", DataType::Int32, true),
            vec![0, 1],
            None,
            int32_array(&[Some(1)]),
        )
        .unwrap();
        let columns = vec![Arc::new(inner)];
        let shallow = IpcWriteOptions::default().with_max_recursion_depth(1);
        let err = RecordBatchSerializer::new(&shallow, 0).assemble(&columns).unwrap_err();
        assert!(matches!(err, IpcError::Invalid(_)));

        let ok = IpcWriteOptions::default().with_max_recursion_depth(2);
        assert!(RecordBatchSerializer::new(&ok, 0).assemble(&columns).is_ok());
    }

    #[test]
    fn test_start_offset_shifts_buffer_positions() {
        let columns = vec![Arc::new(int32_array(&[Some(1), None]))];
        let body = RecordBatchSerializer::new(&IpcWriteOptions::default(), 64)
            .assemble(&columns)
            .unwrap();
        assert_eq!(body.buffers[0].offset, 64);
        assert_eq!(body.buffers[1].offset, 72);
        assert_eq!(body.body_length, 16);
    }
}
