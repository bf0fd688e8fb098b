// --- Constants for IPC format ---

pub const ARROW_MAGIC_NUMBER_PADDED: &[u8] = b"ARROW1\0\0"; // opening magic
pub const ARROW_MAGIC_NUMBER: &[u8] = b"ARROW1"; // closing magic
pub const FILE_OPENING_MAGIC_LEN: usize = 8;
pub const FILE_CLOSING_MAGIC_LEN: usize = 6;
pub const FOOTER_SIZE_PREFIX: usize = 4; // 4 bytes - <footer_size: int32>, precedes closing magic
pub const CONTINUATION_MARKER_LEN: usize = 4; // 4 bytes - <continuation: 0xFFFFFFFF>
pub const CONTINUATION_SENTINEL: u32 = 0xFFFF_FFFF;
pub const METADATA_SIZE_PREFIX: usize = 4; // 4 bytes - <metadata_size: int32>

/// Default alignment for message metadata and body buffers.
pub const DEFAULT_ALIGNMENT: usize = 8;

/// Maximum depth of nested types walked when serialising or loading arrays.
pub const MAX_NESTING_DEPTH: usize = 64;

pub const DEFAULT_FRAME_ALLOCATION_SIZE: usize = 64 * 1024; // 64 KiB

pub(crate) const PADDING_BYTES: [u8; 64] = [0u8; 64];
