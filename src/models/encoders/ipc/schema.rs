//! # IPC FlatBuffers Builders (internal)
//!
//! Helpers that construct FlatBuffer-encoded IPC artefacts: schema messages, record batch
//! and dictionary batch headers, and the file footer with its block index.
//!
//! Follows the IPC protocol as outlined
//! [here](https://arrow.apache.org/docs/format/Columnar.html#serialization-and-interprocess-communication-ipc).
//!
//! Each public builder resets the passed builder, so one `FlatBufferBuilder` can be reused
//! across every message of a session.

use std::collections::BTreeMap;

use arrow_ipc as fb;
use flatbuffers::{FlatBufferBuilder, ForwardsUOffset, UnionWIPOffset, Vector, WIPOffset};

use crate::enums::MetadataVersion;
use crate::models::frames::ipc_message::FileBlock;
use crate::models::types::datatype::{DataType, UnionMode};
use crate::models::types::schema::{Field, Schema};

/// Build a schema message.
///
/// # Arguments
/// - `fbb`: Reusable builder.
/// - `schema`: Fields, nested children, dictionary encodings and custom metadata.
/// - `version`: Metadata version stamped on the message.
///
/// # Returns
/// The finished `Message` flatbuffer, unpadded. Schema messages have no body.
pub fn build_schema_message(
    fbb: &mut FlatBufferBuilder<'static>,
    schema: &Schema,
    version: MetadataVersion,
) -> Vec<u8> {
    fbb.reset();
    let schema_obj = build_schema(fbb, schema);
    finish_message(fbb, fb::MessageHeader::Schema, schema_obj.as_union_value(), 0, version)
}

/// Build a record batch message header.
///
/// # Arguments
/// - `n_rows`: Batch row count.
/// - `nodes`: One field node per visited array, depth-first.
/// - `buffers`: One descriptor per body buffer.
/// - `body_len`: Padded body length in bytes.
pub(crate) fn build_record_batch_message(
    fbb: &mut FlatBufferBuilder<'static>,
    n_rows: usize,
    nodes: &[fb::FieldNode],
    buffers: &[fb::Buffer],
    body_len: i64,
    version: MetadataVersion,
) -> Vec<u8> {
    fbb.reset();
    let rb = build_record_batch(fbb, n_rows, nodes, buffers);
    finish_message(fbb, fb::MessageHeader::RecordBatch, rb.as_union_value(), body_len, version)
}

/// Build a dictionary batch message header: a record batch of the dictionary values
/// wrapped with the dictionary id. Never a delta.
pub(crate) fn build_dictionary_message(
    fbb: &mut FlatBufferBuilder<'static>,
    id: i64,
    n_values: usize,
    nodes: &[fb::FieldNode],
    buffers: &[fb::Buffer],
    body_len: i64,
    version: MetadataVersion,
) -> Vec<u8> {
    fbb.reset();
    let rb = build_record_batch(fbb, n_values, nodes, buffers);
    let dict_batch = fb::DictionaryBatch::create(
        fbb,
        &fb::DictionaryBatchArgs {
            id,
            data: Some(rb),
            isDelta: false,
        },
    );
    finish_message(
        fbb,
        fb::MessageHeader::DictionaryBatch,
        dict_batch.as_union_value(),
        body_len,
        version,
    )
}

/// Build the file footer.
///
/// # Arguments
/// - `schema`: Schema repeated in the footer so readers can open a file from its tail.
/// - `dictionaries`: Blocks of the dictionary messages, in write order.
/// - `record_batches`: Blocks of the record batch messages, in write order.
///
/// # Returns
/// The finished `Footer` flatbuffer. It is written without a length prefix; the
/// trailing `int32` footer length follows it.
pub fn build_footer(
    fbb: &mut FlatBufferBuilder<'static>,
    schema: &Schema,
    dictionaries: &[FileBlock],
    record_batches: &[FileBlock],
    version: MetadataVersion,
) -> Vec<u8> {
    fbb.reset();
    let to_fb = |b: &FileBlock| fb::Block::new(b.offset, b.metadata_length, b.body_length);
    let dict_blocks: Vec<fb::Block> = dictionaries.iter().map(to_fb).collect();
    let batch_blocks: Vec<fb::Block> = record_batches.iter().map(to_fb).collect();
    let dict_vec = fbb.create_vector(&dict_blocks);
    let batch_vec = fbb.create_vector(&batch_blocks);
    let schema_obj = build_schema(fbb, schema);
    let footer = fb::Footer::create(
        fbb,
        &fb::FooterArgs {
            version: version.into(),
            schema: Some(schema_obj),
            dictionaries: Some(dict_vec),
            recordBatches: Some(batch_vec),
            custom_metadata: None,
        },
    );
    fbb.finish(footer, None);
    fbb.finished_data().to_vec()
}

fn finish_message(
    fbb: &mut FlatBufferBuilder<'static>,
    header_type: fb::MessageHeader,
    header: WIPOffset<UnionWIPOffset>,
    body_len: i64,
    version: MetadataVersion,
) -> Vec<u8> {
    let msg = fb::Message::create(
        fbb,
        &fb::MessageArgs {
            version: version.into(),
            header_type,
            header: Some(header),
            bodyLength: body_len,
            custom_metadata: None,
        },
    );
    fbb.finish(msg, None);
    fbb.finished_data().to_vec()
}

fn build_record_batch<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    n_rows: usize,
    nodes: &[fb::FieldNode],
    buffers: &[fb::Buffer],
) -> WIPOffset<fb::RecordBatch<'fbb>> {
    let nodes_vec = fbb.create_vector(nodes);
    let buffers_vec = fbb.create_vector(buffers);
    fb::RecordBatch::create(
        fbb,
        &fb::RecordBatchArgs {
            length: n_rows as i64,
            nodes: Some(nodes_vec),
            buffers: Some(buffers_vec),
            compression: None,
            variadicBufferCounts: None,
        },
    )
}

fn build_schema<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    schema: &Schema,
) -> WIPOffset<fb::Schema<'fbb>> {
    let fields: Vec<_> = schema.fields().iter().map(|f| build_field(fbb, f)).collect();
    let fields_vec = fbb.create_vector(&fields);
    let custom_metadata = build_metadata(fbb, schema.metadata());
    fb::Schema::create(
        fbb,
        &fb::SchemaArgs {
            endianness: fb::Endianness::Little,
            fields: Some(fields_vec),
            custom_metadata,
            features: None,
        },
    )
}

/// Build one field, recursing into children.
///
/// A dictionary-encoded field is written with its value type as the field type and the
/// index type inside the `DictionaryEncoding` table. Children belong to the value type.
fn build_field<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    field: &Field,
) -> WIPOffset<fb::Field<'fbb>> {
    let name = fbb.create_string(field.name());

    let (value_type, dictionary) = match field.data_type() {
        DataType::Dictionary { id, index_type, value_type, ordered } => {
            let index = build_int(fbb, index_type);
            let encoding = fb::DictionaryEncoding::create(
                fbb,
                &fb::DictionaryEncodingArgs {
                    id: *id,
                    indexType: Some(index),
                    isOrdered: *ordered,
                    dictionaryKind: fb::DictionaryKind::DenseArray,
                },
            );
            (value_type.as_ref(), Some(encoding))
        }
        other => (other, None),
    };

    let children: Vec<_> = value_type
        .children()
        .iter()
        .map(|child| build_field(fbb, child))
        .collect();
    let children = fbb.create_vector(&children);
    let (type_type, type_) = build_type(fbb, value_type);
    let custom_metadata = build_metadata(fbb, field.metadata());

    fb::Field::create(
        fbb,
        &fb::FieldArgs {
            name: Some(name),
            nullable: field.is_nullable(),
            type_type,
            type_: Some(type_),
            dictionary,
            children: Some(children),
            custom_metadata,
        },
    )
}

fn build_int<'fbb>(fbb: &mut FlatBufferBuilder<'fbb>, int_type: &DataType) -> WIPOffset<fb::Int<'fbb>> {
    let bit_width = int_type.byte_width().unwrap_or(0) as i32 * 8;
    fb::Int::create(
        fbb,
        &fb::IntArgs {
            bitWidth: bit_width,
            is_signed: int_type.is_signed_integer(),
        },
    )
}

fn build_floating_point(
    fbb: &mut FlatBufferBuilder<'_>,
    precision: fb::Precision,
) -> WIPOffset<UnionWIPOffset> {
    fb::FloatingPoint::create(fbb, &fb::FloatingPointArgs { precision }).as_union_value()
}

fn build_type(
    fbb: &mut FlatBufferBuilder<'_>,
    data_type: &DataType,
) -> (fb::Type, WIPOffset<UnionWIPOffset>) {
    use DataType::*;
    match data_type {
        Null => (fb::Type::Null, fb::Null::create(fbb, &fb::NullArgs {}).as_union_value()),
        Boolean => (fb::Type::Bool, fb::Bool::create(fbb, &fb::BoolArgs {}).as_union_value()),
        Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64 => {
            (fb::Type::Int, build_int(fbb, data_type).as_union_value())
        }
        Float16 => (fb::Type::FloatingPoint, build_floating_point(fbb, fb::Precision::HALF)),
        Float32 => (fb::Type::FloatingPoint, build_floating_point(fbb, fb::Precision::SINGLE)),
        Float64 => (fb::Type::FloatingPoint, build_floating_point(fbb, fb::Precision::DOUBLE)),
        Date32 | Date64 => {
            let unit = if *data_type == Date32 {
                fb::DateUnit::DAY
            } else {
                fb::DateUnit::MILLISECOND
            };
            let date = fb::Date::create(fbb, &fb::DateArgs { unit });
            (fb::Type::Date, date.as_union_value())
        }
        Decimal128 { precision, scale } => {
            let decimal = fb::Decimal::create(
                fbb,
                &fb::DecimalArgs {
                    precision: *precision,
                    scale: *scale,
                    bitWidth: 128,
                },
            );
            (fb::Type::Decimal, decimal.as_union_value())
        }
        Utf8 => (fb::Type::Utf8, fb::Utf8::create(fbb, &fb::Utf8Args {}).as_union_value()),
        Binary => (fb::Type::Binary, fb::Binary::create(fbb, &fb::BinaryArgs {}).as_union_value()),
        FixedSizeBinary(width) => {
            let fsb = fb::FixedSizeBinary::create(fbb, &fb::FixedSizeBinaryArgs { byteWidth: *width });
            (fb::Type::FixedSizeBinary, fsb.as_union_value())
        }
        List(_) => (fb::Type::List, fb::List::create(fbb, &fb::ListArgs {}).as_union_value()),
        Struct(_) => (
            fb::Type::Struct_,
            fb::Struct_::create(fbb, &fb::Struct_Args {}).as_union_value(),
        ),
        Union { mode, type_codes, .. } => {
            let ids: Vec<i32> = type_codes.iter().map(|c| *c as i32).collect();
            let ids = fbb.create_vector(&ids);
            let mode = match mode {
                UnionMode::Sparse => fb::UnionMode::Sparse,
                UnionMode::Dense => fb::UnionMode::Dense,
            };
            let union = fb::Union::create(fbb, &fb::UnionArgs { mode, typeIds: Some(ids) });
            (fb::Type::Union, union.as_union_value())
        }
        // Only reachable for a dictionary nested as another dictionary's value type
        Dictionary { value_type, .. } => build_type(fbb, value_type),
    }
}

fn build_metadata<'fbb>(
    fbb: &mut FlatBufferBuilder<'fbb>,
    metadata: &BTreeMap<String, String>,
) -> Option<WIPOffset<Vector<'fbb, ForwardsUOffset<fb::KeyValue<'fbb>>>>> {
    if metadata.is_empty() {
        return None;
    }
    let entries: Vec<_> = metadata
        .iter()
        .map(|(k, v)| {
            let key = fbb.create_string(k);
            let value = fbb.create_string(v);
            fb::KeyValue::create(
                fbb,
                &fb::KeyValueArgs {
                    key: Some(key),
                    value: Some(value),
                },
            )
        })
        .collect();
    Some(fbb.create_vector(&entries))
}
