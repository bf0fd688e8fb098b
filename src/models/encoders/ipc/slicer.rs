//! # Buffer truncation for sliced arrays
//!
//! A sliced array still points at its parent's full buffers. Before a buffer goes on the
//! wire it is cut down to the byte range the slice actually covers, so the message body
//! carries no dead bytes and every buffer starts at element zero.
//!
//! The rule is the same for every fixed layout: truncate when the slice does not start at
//! element zero, or when the source is longer than the padded length the slice needs.
//! Otherwise the source buffer is passed through untouched. Truncation is a zero-copy
//! view; only rebased offsets need fresh memory.

use crate::constants::DEFAULT_ALIGNMENT;
use crate::error::Result;
use crate::models::buffer::Buffer;
use crate::utils::padded_len;

/// Whether a buffer must be cut down for a slice starting at `offset` that needs
/// `min_length` padded bytes.
#[inline]
pub fn needs_truncation(offset: usize, buffer: &Buffer, min_length: usize) -> bool {
    offset != 0 || min_length < buffer.len()
}

/// Restrict a fixed-width buffer to elements `[offset, offset + len)`.
///
/// Trailing padding is kept when the source has it, up to the next 8-byte boundary.
pub fn truncate_fixed(buffer: &Buffer, offset: usize, len: usize, byte_width: usize) -> Result<Buffer> {
    let min_length = padded_len(len * byte_width, DEFAULT_ALIGNMENT);
    if !needs_truncation(offset, buffer, min_length) {
        return Ok(buffer.clone());
    }
    let byte_offset = offset * byte_width;
    let available = buffer.len().saturating_sub(byte_offset);
    buffer.slice(byte_offset, min_length.min(available))
}

/// First and last int32 offset of a variable-width slice, `(0, 0)` for an absent
/// offsets buffer.
pub fn value_bounds(offsets: &Buffer, offset: usize, len: usize) -> (usize, usize) {
    if offsets.is_empty() {
        return (0, 0);
    }
    let first = offsets.value::<i32>(offset) as usize;
    let last = offsets.value::<i32>(offset + len) as usize;
    (first, last)
}

/// Produce zero-based offsets for `len` slots starting at `offset`.
///
/// Offsets that do not start at zero (any sliced array, or one whose values begin
/// mid-buffer) get a fresh `(len + 1) * 4` byte buffer with the first offset subtracted
/// from every entry. Zero-based ones are only trimmed if oversized.
pub fn rebase_offsets(offsets: &Buffer, offset: usize, len: usize) -> Result<Buffer> {
    if offsets.is_empty() {
        return Ok(Buffer::empty());
    }
    let start = offsets.value::<i32>(offset);
    if offset == 0 && start == 0 {
        return truncate_fixed(offsets, 0, len + 1, 4);
    }
    let shifted: Vec<i32> = (0..=len)
        .map(|i| offsets.value::<i32>(offset + i) - start)
        .collect();
    Ok(Buffer::from_values(&shifted))
}

/// Restrict a values buffer to the byte range `[start, end)` referenced by a slice's
/// offsets, keeping padding up to the next 8-byte boundary where the source has it.
pub fn truncate_values(values: &Buffer, start: usize, end: usize) -> Result<Buffer> {
    let total = end - start;
    if !needs_truncation(start, values, total) {
        return Ok(values.clone());
    }
    let available = values.len().saturating_sub(start);
    values.slice(start, padded_len(total, DEFAULT_ALIGNMENT).min(available))
}
