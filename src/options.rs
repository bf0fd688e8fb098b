//! # Reader and writer configuration
//!
//! Plain option structs with defaults matching the wire format's conventions. Builder-style
//! `with_*` methods return `Self` so options can be set inline:
//!
//! ```
//! use columnar_ipc::options::IpcWriteOptions;
//!
//! let opts = IpcWriteOptions::default().with_alignment(64).with_legacy_format(false);
//! assert!(opts.validate().is_ok());
//! ```

use crate::constants::{DEFAULT_ALIGNMENT, MAX_NESTING_DEPTH};
use crate::enums::MetadataVersion;
use crate::error::{IpcError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcWriteOptions {
    /// Message metadata is padded to a multiple of this. Must be a non-zero multiple of 8.
    pub alignment: usize,

    /// Deepest type nesting the serializer walks before failing with `Invalid`.
    pub max_recursion_depth: usize,

    /// Permit arrays longer than `i32::MAX` slots.
    pub allow_64bit: bool,

    /// `true`: `<int32 size>` prefixes and an `int32(0)` end marker.
    /// `false`: each prefix is preceded by the `0xFFFFFFFF` continuation marker.
    pub write_legacy_format: bool,

    pub metadata_version: MetadataVersion,
}

impl Default for IpcWriteOptions {
    fn default() -> Self {
        Self {
            alignment: DEFAULT_ALIGNMENT,
            max_recursion_depth: MAX_NESTING_DEPTH,
            allow_64bit: false,
            write_legacy_format: true,
            metadata_version: MetadataVersion::V4,
        }
    }
}

impl IpcWriteOptions {
    pub fn with_alignment(mut self, alignment: usize) -> Self {
        self.alignment = alignment;
        self
    }

    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    pub fn with_allow_64bit(mut self, allow: bool) -> Self {
        self.allow_64bit = allow;
        self
    }

    pub fn with_legacy_format(mut self, legacy: bool) -> Self {
        self.write_legacy_format = legacy;
        self
    }

    pub fn with_metadata_version(mut self, version: MetadataVersion) -> Self {
        self.metadata_version = version;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.alignment == 0 || self.alignment % 8 != 0 {
            return Err(IpcError::invalid(format!(
                "alignment must be a non-zero multiple of 8, got {}",
                self.alignment
            )));
        }
        if self.max_recursion_depth == 0 {
            return Err(IpcError::invalid("max_recursion_depth must be positive"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpcReadOptions {
    /// Deepest type nesting the array loader walks before failing with `Invalid`.
    pub max_recursion_depth: usize,
}

impl Default for IpcReadOptions {
    fn default() -> Self {
        Self { max_recursion_depth: MAX_NESTING_DEPTH }
    }
}

impl IpcReadOptions {
    pub fn with_max_recursion_depth(mut self, depth: usize) -> Self {
        self.max_recursion_depth = depth;
        self
    }
}
