//! # columnar-ipc
//!
//! Zero-copy serialisation of in-memory columnar record batches to the Arrow IPC stream
//! and file formats, and the matching readers.
//!
//! - Writers: [`IpcWriter`] over any [`OutputSink`], [`AsyncIpcWriter`] over Tokio
//!   `AsyncWrite`, plus one-shot helpers such as [`serialize_record_batch`].
//! - Readers: [`StreamReader`] and [`FileReader`] over any [`RandomAccessSource`], and
//!   [`IpcBatchStream`] for chunked async byte sources.

pub mod traits {
    pub mod byte_stream;
    pub mod frame_decoder;
    pub mod frame_encoder;
    pub mod input_source;
    pub mod output_sink;
    pub mod stream_buffer;
}

pub mod models {
    pub mod array {
        pub mod array_data;
        pub mod builders;
        pub mod equal;
        pub mod record_batch;
    }
    pub mod types {
        pub mod datatype;
        pub mod native;
        pub mod schema;
    }
    pub mod sinks {
        pub mod byte_sink;
    }
    pub mod encoders {
        pub mod ipc {
            pub mod bitmap;
            pub mod protocol;
            pub mod record_batch;
            pub mod schema;
            pub mod slicer;
        }
    }
    pub mod decoders {
        pub mod ipc {
            pub mod batch_stream;
            pub mod message;
            pub mod parser;
            pub mod protocol;
            pub mod schema;
        }
    }
    pub mod frames {
        pub mod ipc_message;
    }
    pub mod readers {
        pub mod ipc {
            pub mod batch_reader;
            pub mod file_reader;
            pub mod stream_reader;
        }
    }
    pub mod writers {
        pub mod ipc {
            pub mod async_writer;
            pub mod ipc_writer;
        }
    }
    pub mod streams {
        pub mod disk;
        pub mod framed_byte_stream;
    }
    pub mod buffer;
    pub mod dictionary;
}

pub mod constants;
pub mod enums;
pub mod error;
pub mod options;
pub mod utils;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use crate::enums::{IPCMessageProtocol, MessageType, MetadataVersion, WriterState};
pub use crate::error::{IpcError, Result};
pub use crate::models::array::array_data::{ArrayData, ArrayRef};
pub use crate::models::array::record_batch::RecordBatch;
pub use crate::models::buffer::Buffer;
pub use crate::models::decoders::ipc::batch_stream::IpcBatchStream;
pub use crate::models::decoders::ipc::message::{read_message, read_message_at, Message};
pub use crate::models::dictionary::DictionaryRegistry;
pub use crate::models::readers::ipc::file_reader::{read_file_async, FileReader};
pub use crate::models::readers::ipc::stream_reader::{
    deserialize_from_source, read_schema, StreamReader,
};
pub use crate::models::types::datatype::{DataType, UnionMode};
pub use crate::models::types::schema::{Field, Schema, SchemaRef};
pub use crate::models::writers::ipc::async_writer::AsyncIpcWriter;
pub use crate::models::writers::ipc::ipc_writer::{
    open_file_writer, open_stream_writer, record_batch_size, serialize_record_batch,
    serialize_schema, serialize_to_sink, write_stream, IpcWriter,
};
pub use crate::options::{IpcReadOptions, IpcWriteOptions};
pub use crate::traits::input_source::{FileSource, RandomAccessSource};
pub use crate::traits::output_sink::OutputSink;
