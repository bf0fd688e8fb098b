//! # IPC Errors
//!
//! Unified error type for all serialisation, framing and reading operations.
//!
//! Four kinds are distinguished: malformed input (`Invalid`), sink/source failures including
//! short reads (`Io`), format-imposed size limits (`Capacity`), and type kinds this codec does
//! not handle (`NotImplemented`). Conversions are provided for the common error sources so
//! encoders and decoders can propagate with `?`.

use std::io;

/// Unified error type for all IPC operations.
#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    /// Malformed input: bad magic, wrong message in a required position, inconsistent
    /// array layout, writer misuse.
    #[error("Invalid: {0}")]
    Invalid(String),

    /// Underlying sink or source failure, including short reads.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Array length exceeds the 32-bit limit of the format in non-64-bit mode.
    #[error("Capacity error: {0}")]
    Capacity(String),

    /// Type kind or message feature this codec does not handle.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl IpcError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        IpcError::Invalid(msg.into())
    }

    pub fn not_implemented(msg: impl Into<String>) -> Self {
        IpcError::NotImplemented(msg.into())
    }

    /// Short read on an input source.
    pub fn short_read(requested: usize, got: usize) -> Self {
        IpcError::Io(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            format!("expected to read {requested} bytes, got {got}"),
        ))
    }
}

impl From<flatbuffers::InvalidFlatbuffer> for IpcError {
    fn from(e: flatbuffers::InvalidFlatbuffer) -> Self {
        IpcError::Invalid(format!("malformed flatbuffer metadata: {e}"))
    }
}

// Async adapters speak io::Error
impl From<IpcError> for io::Error {
    fn from(e: IpcError) -> Self {
        match e {
            IpcError::Io(e) => e,
            other => io::Error::new(io::ErrorKind::InvalidData, other),
        }
    }
}

pub type Result<T> = std::result::Result<T, IpcError>;
