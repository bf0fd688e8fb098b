use crate::constants::DEFAULT_ALIGNMENT;
use crate::models::buffer::Buffer;
use crate::utils::{bytes_for_bits, get_bit, padded_len, set_bit};

/// Copy bits `[offset, offset + len)` of `bitmap` into a fresh zero-origin bitmap,
/// padded with zero bytes to an 8-byte boundary.
pub fn copy_bitmap(bitmap: &[u8], offset: usize, len: usize) -> Buffer {
    let nbytes = bytes_for_bits(len);
    let mut out = vec![0u8; padded_len(nbytes, DEFAULT_ALIGNMENT)];
    if offset % 8 == 0 {
        let start = offset / 8;
        out[..nbytes].copy_from_slice(&bitmap[start..start + nbytes]);
        // clear bits past the end of the slice
        let tail_bits = len % 8;
        if tail_bits != 0 {
            out[nbytes - 1] &= (1u8 << tail_bits) - 1;
        }
    } else {
        for i in 0..len {
            if get_bit(bitmap, offset + i) {
                set_bit(&mut out, i);
            }
        }
    }
    Buffer::from_vec(out)
}

/// Bitmap for `len` bits starting at bit `offset`, ready to go on the wire.
///
/// Passes `bitmap` through unchanged when it already starts at bit zero and is no longer
/// than its padded minimum; copies otherwise.
pub fn truncated_bitmap(bitmap: &Buffer, offset: usize, len: usize) -> Buffer {
    let min_length = padded_len(bytes_for_bits(len), DEFAULT_ALIGNMENT);
    if offset != 0 || min_length < bitmap.len() {
        copy_bitmap(bitmap, offset, len)
    } else {
        bitmap.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::unpack_bits;

    #[test]
    fn test_unaligned_copy() {
        // bits 0..16: 1,0,1,1,0,1,1,1, 0,0,0,0,1,1,1,1
        let src = [0b1110_1101u8, 0b1111_0000];
        let out = copy_bitmap(&src, 3, 10);
        assert_eq!(out.len(), 8);
        assert_eq!(
            unpack_bits(&out, 10),
            vec![true, false, true, true, true, false, false, false, false, true]
        );
        assert!(out[2..].iter().all(|b| *b == 0));
    }

    #[test]
    fn test_byte_aligned_copy_masks_tail() {
        let src = [0xFFu8, 0xFF, 0xFF];
        let out = copy_bitmap(&src, 8, 5);
        assert_eq!(out[0], 0b0001_1111);
        assert_eq!(out[1], 0);
    }

    #[test]
    fn test_passthrough_and_oversize() {
        let exact = Buffer::from_vec(vec![0b101u8, 0, 0, 0, 0, 0, 0, 0]);
        let same = truncated_bitmap(&exact, 0, 3);
        assert_eq!(same.as_ptr(), exact.as_ptr());

        let big = Buffer::from_vec(vec![0xFFu8; 32]);
        let trimmed = truncated_bitmap(&big, 0, 3);
        assert_eq!(trimmed.len(), 8);
        assert_eq!(trimmed[0], 0b111);
    }
}
