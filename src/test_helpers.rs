//! # Test Helpers - *Column and Batch Generators*
//!
//! Deterministic 4-row fixtures spanning the supported logical types, plus writers that
//! put them on disk or into an in-memory stream.

use std::sync::Arc;

use tempfile::NamedTempFile;

use crate::enums::IPCMessageProtocol;
use crate::models::array::array_data::ArrayData;
use crate::models::array::builders::{
    binary_array, boolean_array, dictionary_array, float64_array, int32_array, int64_array,
    list_array, struct_array, uint8_array, utf8_array,
};
use crate::models::array::record_batch::RecordBatch;
use crate::models::sinks::byte_sink::MemorySink;
use crate::models::types::datatype::DataType;
use crate::models::types::schema::{Field, Schema, SchemaRef};
use crate::models::writers::ipc::async_writer::write_batches_to_file;
use crate::models::writers::ipc::ipc_writer::IpcWriter;
use crate::options::IpcWriteOptions;

pub(crate) fn int32_col() -> ArrayData {
    int32_array(&[Some(1), Some(2), None, Some(4)])
}

pub(crate) fn int64_col() -> ArrayData {
    int64_array(&[Some(10), None, Some(30), Some(-40)])
}

pub(crate) fn float64_col() -> ArrayData {
    float64_array(&[Some(0.5), Some(1.5), Some(-2.25), None])
}

pub(crate) fn bool_col() -> ArrayData {
    boolean_array(&[Some(true), Some(false), None, Some(true)])
}

pub(crate) fn utf8_col() -> ArrayData {
    utf8_array(&[Some("alpha"), None, Some(""), Some("delta")])
}

pub(crate) fn binary_col() -> ArrayData {
    binary_array(&[Some(&[0u8, 1][..]), Some(&[][..]), None, Some(&[0xFF][..])])
}

/// `[[1, 2], null, [], [3]]`
pub(crate) fn list_col() -> ArrayData {
    list_array(
        Field::new("item", DataType::Int32, true),
        vec![0, 2, 2, 2, 3],
        Some(&[true, false, true, true]),
        int32_array(&[Some(1), Some(2), Some(3)]),
    )
    .expect("valid list fixture")
}

pub(crate) fn struct_col() -> ArrayData {
    struct_array(
        vec![
            (Field::new("a", DataType::Int32, true), int32_array(&[Some(7), None, Some(9), Some(0)])),
            (Field::new("b", DataType::UInt8, false), uint8_array(&[Some(1), Some(2), Some(3), Some(4)])),
        ],
        Some(&[true, true, false, true]),
    )
    .expect("valid struct fixture")
}

pub(crate) fn dict32_col() -> ArrayData {
    let values = Arc::new(utf8_array(&[Some("red"), Some("green"), Some("blue")]));
    dictionary_array(0, int32_array(&[Some(2), Some(0), None, Some(2)]), values, false)
        .expect("valid dictionary fixture")
}

pub(crate) fn make_all_types_batch() -> RecordBatch {
    let columns = vec![
        ("int32", int32_col()),
        ("int64", int64_col()),
        ("float64", float64_col()),
        ("bool", bool_col()),
        ("utf8", utf8_col()),
        ("binary", binary_col()),
        ("list", list_col()),
        ("struct", struct_col()),
        ("dict32", dict32_col()),
    ];
    let fields = columns
        .iter()
        .map(|(name, col)| Field::new(*name, col.data_type().clone(), true))
        .collect();
    let arrays = columns.into_iter().map(|(_, col)| Arc::new(col)).collect();
    RecordBatch::try_new(Arc::new(Schema::new(fields)), arrays).expect("valid batch fixture")
}

pub(crate) fn make_schema_all_types() -> SchemaRef {
    Arc::clone(make_all_types_batch().schema())
}

/// Write `batches` as an IPC file into a fresh temp file.
pub(crate) async fn write_test_batches_to_file(batches: &[RecordBatch]) -> NamedTempFile {
    let temp = NamedTempFile::new().expect("temp file");
    write_batches_to_file(temp.path(), Arc::clone(batches[0].schema()), batches, IpcWriteOptions::default())
        .await
        .expect("write IPC file");
    temp
}

/// Serialise `batches` with the stream protocol into memory.
pub(crate) fn write_test_batches_to_stream(batches: &[RecordBatch], options: IpcWriteOptions) -> Vec<u8> {
    let mut writer = IpcWriter::new(
        MemorySink::<Vec<u8>>::new(),
        Arc::clone(batches[0].schema()),
        IPCMessageProtocol::Stream,
        options,
    )
    .expect("stream writer");
    for batch in batches {
        writer.write_batch(batch).expect("write batch");
    }
    writer.close().expect("close stream");
    writer.into_inner().into_inner()
}
