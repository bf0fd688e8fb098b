use arrow_ipc as fb;

use crate::error::IpcError;

/// The outcome of a single frame decoder step.
///
/// Communicates whether a full frame has been detected or whether more bytes are
/// required. Protocol errors travel on the `Err` side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeResult<F> {
    /// A complete logical frame was detected.
    ///
    /// - `frame`: The decoded frame of the target type.
    /// - `consumed`: The number of bytes from the buffer that should be discarded.
    Frame { frame: F, consumed: usize },

    /// The decoder requires more bytes to detect a full frame.
    ///
    /// No bytes should be removed from the buffer.
    NeedMore,
}

/// Incremental IPC frame decoding state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecodeState {
    /// Nothing read yet. File magic, if present, is consumed here.
    Initial,

    /// Ready to read the next length prefix.
    ReadingMessage,

    /// Prefix and metadata parsed; waiting for the whole body.
    ReadingBody {
        prefix_len: usize,
        meta_len: usize,
        body_len: usize,
    },

    /// End-of-stream seen; anything after it (a file footer) is trailer.
    Done,
}

/// Specifies chunk sizing strategies for `DiskByteStream` and other stream sources.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BufferChunkSize {
    /// File I/O: Default is 1 MiB chunks.
    FileIO,

    /// In-memory streams: Default is 512 KiB.
    InMemory,

    /// Custom chunk size.
    Custom(usize),
}

impl BufferChunkSize {
    /// Returns the configured chunk size in bytes.
    pub fn chunk_size(self) -> usize {
        match self {
            BufferChunkSize::FileIO => 1024 * 1024, // 1 MiB
            BufferChunkSize::InMemory => 512 * 1024, // 512 KiB
            BufferChunkSize::Custom(n) => n.max(1),
        }
    }
}

/// IPC framing protocol.
///
/// There are two variants: one for bounded files and one for unbounded streams.
/// Each defines its own termination markers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IPCMessageProtocol {
    /// **Unbounded**: length-prefixed messages terminated by an end-of-stream marker.
    Stream,

    /// **Bounded**: magic-wrapped stream followed by a footer with a block index.
    File,
}

/// Message header kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    /// Schema definition message.
    Schema,

    /// Record batch payload.
    RecordBatch,

    /// Dictionary batch payload.
    DictionaryBatch,

    /// Unrecognised or unsupported message type (tensors, sparse tensors).
    Unknown,
}

impl From<fb::MessageHeader> for MessageType {
    fn from(header: fb::MessageHeader) -> Self {
        match header {
            fb::MessageHeader::Schema => MessageType::Schema,
            fb::MessageHeader::RecordBatch => MessageType::RecordBatch,
            fb::MessageHeader::DictionaryBatch => MessageType::DictionaryBatch,
            _ => MessageType::Unknown,
        }
    }
}

/// State machine for stream message batching on the read side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BatchState {
    /// Schema has not yet been received.
    NeedSchema,

    /// Ready to emit batches.
    Ready,

    /// End of stream reached.
    Done,
}

/// State machine for stream and file writers.
///
/// Any write from `NotStarted` moves the writer to `Started` first. `Closed` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriterState {
    /// Nothing written yet.
    NotStarted,

    /// Magic (file mode), schema and registered dictionaries have been written.
    Started,

    /// End-of-stream (and footer in file mode) written; no further messages may be written.
    Closed,
}

/// Metadata version stamped on written messages.
///
/// Readers accept both; anything older is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MetadataVersion {
    #[default]
    V4,
    V5,
}

impl From<MetadataVersion> for fb::MetadataVersion {
    fn from(v: MetadataVersion) -> Self {
        match v {
            MetadataVersion::V4 => fb::MetadataVersion::V4,
            MetadataVersion::V5 => fb::MetadataVersion::V5,
        }
    }
}

impl TryFrom<fb::MetadataVersion> for MetadataVersion {
    type Error = IpcError;

    fn try_from(v: fb::MetadataVersion) -> Result<Self, IpcError> {
        match v {
            fb::MetadataVersion::V4 => Ok(MetadataVersion::V4),
            fb::MetadataVersion::V5 => Ok(MetadataVersion::V5),
            other => Err(IpcError::invalid(format!(
                "unsupported metadata version {other:?}; expected V4 or V5"
            ))),
        }
    }
}
