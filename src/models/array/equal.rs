//! Logical array equality.
//!
//! Two arrays are equal when they have the same type and length and agree slot by slot on
//! validity and, for valid slots, on value. Offsets, slack capacity, the bytes under null
//! slots and whether a bitmap is materialised do not matter, so a sliced array equals a
//! freshly built one with the same contents.

use crate::models::array::array_data::ArrayData;
use crate::models::types::datatype::DataType;
use crate::utils::get_bit;

impl PartialEq for ArrayData {
    fn eq(&self, other: &Self) -> bool {
        self.data_type() == other.data_type()
            && self.len() == other.len()
            && dictionaries_equal(self, other)
            && equal_range(self, 0, other, 0, self.len())
    }
}

fn dictionaries_equal(lhs: &ArrayData, rhs: &ArrayData) -> bool {
    match (lhs.dictionary(), rhs.dictionary()) {
        (None, None) => true,
        (Some(l), Some(r)) => l == r,
        _ => false,
    }
}

/// Compare `len` slots of `lhs` starting at `lstart` with `rhs` starting at `rstart`.
/// Starts are relative to each array's own slice.
pub(crate) fn equal_range(
    lhs: &ArrayData,
    lstart: usize,
    rhs: &ArrayData,
    rstart: usize,
    len: usize,
) -> bool {
    (0..len).all(|i| {
        let (l, r) = (lstart + i, rstart + i);
        match (lhs.is_valid(l), rhs.is_valid(r)) {
            (true, true) => slot_equal(lhs, l, rhs, r),
            (false, false) => true,
            _ => false,
        }
    })
}

fn slot_equal(lhs: &ArrayData, l: usize, rhs: &ArrayData, r: usize) -> bool {
    match lhs.data_type() {
        DataType::Null => true,
        DataType::Boolean => {
            get_bit(lhs.buffer(0), lhs.offset() + l) == get_bit(rhs.buffer(0), rhs.offset() + r)
        }
        DataType::Utf8 | DataType::Binary | DataType::FixedSizeBinary(_) => {
            lhs.value_bytes(l) == rhs.value_bytes(r)
        }
        DataType::List(_) => {
            let (ls, le) = lhs.value_range(l);
            let (rs, re) = rhs.value_range(r);
            le - ls == re - rs && equal_range(lhs.child(0), ls, rhs.child(0), rs, le - ls)
        }
        DataType::Struct(_) => lhs
            .children()
            .iter()
            .zip(rhs.children())
            .all(|(lc, rc)| {
                // children share the parent's offset
                equal_range(lc, lhs.offset() + l, rc, rhs.offset() + r, 1)
            }),
        DataType::Union { .. } => {
            if lhs.type_id(l) != rhs.type_id(r) {
                return false;
            }
            let (Some(lc), Some(rc)) = (lhs.union_child_index(l), rhs.union_child_index(r)) else {
                return false;
            };
            // sparse positions already include the parent offset
            let (lpos, rpos) = (lhs.union_value_offset(l), rhs.union_value_offset(r));
            equal_range(lhs.child(lc), lpos, rhs.child(rc), rpos, 1)
        }
        DataType::Dictionary { .. } => lhs.dictionary_key(l) == rhs.dictionary_key(r),
        fixed => {
            let w = fixed.byte_width().unwrap_or(0);
            let lb = &lhs.buffer(0)[(lhs.offset() + l) * w..(lhs.offset() + l + 1) * w];
            let rb = &rhs.buffer(0)[(rhs.offset() + r) * w..(rhs.offset() + r + 1) * w];
            lb == rb
        }
    }
}
