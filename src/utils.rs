use crate::constants::{CONTINUATION_MARKER_LEN, CONTINUATION_SENTINEL, METADATA_SIZE_PREFIX};
use crate::error::{IpcError, Result};

/// Round `n` up to the next multiple of `alignment`.
#[inline]
pub fn padded_len(n: usize, alignment: usize) -> usize {
    debug_assert!(alignment > 0);
    n.div_ceil(alignment) * alignment
}

/// Number of bytes needed to hold `bits` bits.
#[inline]
pub fn bytes_for_bits(bits: usize) -> usize {
    bits.div_ceil(8)
}

#[inline]
pub fn get_bit(bytes: &[u8], i: usize) -> bool {
    (bytes[i / 8] >> (i % 8)) & 1 != 0
}

#[inline]
pub fn set_bit(bytes: &mut [u8], i: usize) {
    bytes[i / 8] |= 1 << (i % 8);
}

/// Count the set bits in the bit range `[offset, offset + len)`.
pub fn count_set_bits(bytes: &[u8], offset: usize, len: usize) -> usize {
    let mut count = 0;
    let mut i = offset;
    let end = offset + len;
    // leading partial byte
    while i < end && i % 8 != 0 {
        count += get_bit(bytes, i) as usize;
        i += 1;
    }
    // whole bytes
    while i + 8 <= end {
        count += bytes[i / 8].count_ones() as usize;
        i += 8;
    }
    while i < end {
        count += get_bit(bytes, i) as usize;
        i += 1;
    }
    count
}

/// Packs a sequence of bools into a bit-packed buffer (LSB0).
/// Returns a new Vec<u8>.
pub fn pack_bits<I>(iter: I, len: usize) -> Vec<u8>
where
    I: Iterator<Item = bool>,
{
    let mut buf = vec![0u8; bytes_for_bits(len)];
    for (i, v) in iter.enumerate().take(len) {
        if v {
            set_bit(&mut buf, i);
        }
    }
    buf
}

/// Unpacks a bit-packed buffer into a Vec<bool>, up to given length.
pub fn unpack_bits(buf: &[u8], len: usize) -> Vec<bool> {
    (0..len).map(|i| get_bit(buf, i)).collect()
}

/// Read a little-endian i32 at `pos`. Callers guarantee the bounds.
#[inline]
pub fn read_i32_le(buf: &[u8], pos: usize) -> i32 {
    i32::from_le_bytes([buf[pos], buf[pos + 1], buf[pos + 2], buf[pos + 3]])
}

/// Parse a message length prefix at the head of `buf`.
///
/// Accepts both the legacy form (`<int32 size>`) and the continuation form
/// (`0xFFFFFFFF <int32 size>`). Returns `(prefix_len, metadata_size)`, or `None`
/// when `buf` is too short to tell.
///
/// ```text
///   legacy:        [size: i32]
///   continuation:  [0xFFFF_FFFF][size: i32]
/// ```
pub fn parse_length_prefix(buf: &[u8]) -> Result<Option<(usize, usize)>> {
    if buf.len() < METADATA_SIZE_PREFIX {
        return Ok(None);
    }
    let first = read_i32_le(buf, 0);
    let (prefix_len, size) = if first as u32 == CONTINUATION_SENTINEL {
        if buf.len() < CONTINUATION_MARKER_LEN + METADATA_SIZE_PREFIX {
            return Ok(None);
        }
        (
            CONTINUATION_MARKER_LEN + METADATA_SIZE_PREFIX,
            read_i32_le(buf, CONTINUATION_MARKER_LEN),
        )
    } else {
        (METADATA_SIZE_PREFIX, first)
    };
    if size < 0 {
        return Err(IpcError::invalid(format!("negative metadata size {size}")));
    }
    Ok(Some((prefix_len, size as usize)))
}
