//! # Typed array values
//!
//! [`ArrayData`] is the single, type-tagged representation of a column. Its physical
//! buffers follow the layout dictated by the [`DataType`]:
//!
//! | Type kind                     | `buffers`               | `children`        |
//! |-------------------------------|-------------------------|-------------------|
//! | Null                          | none                    | none              |
//! | fixed width, dictionary index | `[values]`              | none              |
//! | Boolean                       | `[bit-packed values]`   | none              |
//! | Utf8, Binary                  | `[offsets, values]`     | none              |
//! | List                          | `[offsets]`             | one               |
//! | Struct                        | none                    | one per field     |
//! | Sparse union                  | `[type_ids]`            | one per field     |
//! | Dense union                   | `[type_ids, offsets]`   | one per field     |
//!
//! The validity bitmap is held separately and is `None` when no slot is null.
//! All element positions inside the buffers are relative to `offset`, so slicing only
//! moves `offset` and `len`; children of structs and sparse unions share the parent's
//! offset.

use std::sync::Arc;

use crate::error::{IpcError, Result};
use crate::models::buffer::Buffer;
use crate::models::types::datatype::{DataType, UnionMode};
use crate::models::types::native::NativeType;
use crate::utils::{bytes_for_bits, count_set_bits, get_bit};

pub type ArrayRef = Arc<ArrayData>;

#[derive(Debug, Clone)]
pub struct ArrayData {
    data_type: DataType,
    len: usize,
    offset: usize,
    null_count: usize,
    validity: Option<Buffer>,
    buffers: Vec<Buffer>,
    children: Vec<ArrayRef>,
    dictionary: Option<ArrayRef>,
}

impl ArrayData {
    /// Assemble and validate an array. The null count is derived from `validity`.
    pub fn try_new(
        data_type: DataType,
        len: usize,
        offset: usize,
        validity: Option<Buffer>,
        buffers: Vec<Buffer>,
        children: Vec<ArrayRef>,
    ) -> Result<Self> {
        let null_count = match (&data_type, &validity) {
            (DataType::Null, _) => len,
            (_, Some(bitmap)) => {
                if bitmap.len() < bytes_for_bits(offset + len) {
                    return Err(IpcError::invalid(format!(
                        "validity bitmap of {} bytes too short for {} slots at offset {}",
                        bitmap.len(),
                        len,
                        offset
                    )));
                }
                len - count_set_bits(bitmap, offset, len)
            }
            (_, None) => 0,
        };
        // An all-valid bitmap carries no information; Null arrays never have one
        let validity = if null_count == 0 || data_type == DataType::Null {
            None
        } else {
            validity
        };
        let data = Self {
            data_type,
            len,
            offset,
            null_count,
            validity,
            buffers,
            children,
            dictionary: None,
        };
        data.validate()?;
        Ok(data)
    }

    /// Assemble a zero-offset array from buffers the caller has sized correctly.
    pub(crate) fn new_unchecked(
        data_type: DataType,
        len: usize,
        validity: Option<Buffer>,
        buffers: Vec<Buffer>,
        children: Vec<ArrayRef>,
    ) -> Self {
        let null_count = match (&data_type, &validity) {
            (DataType::Null, _) => len,
            (_, Some(bitmap)) => len - count_set_bits(bitmap, 0, len),
            (_, None) => 0,
        };
        let data = Self {
            validity: if null_count == 0 || data_type == DataType::Null { None } else { validity },
            data_type,
            len,
            offset: 0,
            null_count,
            buffers,
            children,
            dictionary: None,
        };
        debug_assert!(data.validate().is_ok());
        data
    }

    /// Attach the dictionary a dictionary-encoded array's indices point into.
    pub fn with_dictionary(mut self, dictionary: ArrayRef) -> Result<Self> {
        let DataType::Dictionary { value_type, .. } = &self.data_type else {
            return Err(IpcError::invalid(format!(
                "cannot attach a dictionary to a {} array",
                self.data_type
            )));
        };
        if dictionary.data_type() != value_type.as_ref() {
            return Err(IpcError::invalid(format!(
                "dictionary of type {} does not match value type {}",
                dictionary.data_type(),
                value_type
            )));
        }
        for i in 0..self.len {
            if self.is_valid(i) {
                let key = self.dictionary_key(i);
                if key < 0 || key as usize >= dictionary.len() {
                    return Err(IpcError::invalid(format!(
                        "dictionary index {key} out of range for dictionary of {} values",
                        dictionary.len()
                    )));
                }
            }
        }
        self.dictionary = Some(dictionary);
        Ok(self)
    }

    /// Swap in children of identical type and length (dictionary attachment).
    pub(crate) fn with_children(mut self, children: Vec<ArrayRef>) -> Self {
        debug_assert_eq!(children.len(), self.children.len());
        self.children = children;
        self
    }

    /// Zero-copy view of `len` slots starting at `offset`.
    pub fn slice(&self, offset: usize, len: usize) -> Result<ArrayData> {
        if offset.checked_add(len).map_or(true, |end| end > self.len) {
            return Err(IpcError::invalid(format!(
                "slice [{offset}, {offset}+{len}) out of bounds for array of length {}",
                self.len
            )));
        }
        let new_offset = self.offset + offset;
        let null_count = match (&self.data_type, &self.validity) {
            (DataType::Null, _) => len,
            (_, Some(bitmap)) => len - count_set_bits(bitmap, new_offset, len),
            (_, None) => 0,
        };
        Ok(Self {
            data_type: self.data_type.clone(),
            len,
            offset: new_offset,
            null_count,
            validity: if null_count == 0 || self.data_type == DataType::Null {
                None
            } else {
                self.validity.clone()
            },
            buffers: self.buffers.clone(),
            children: self.children.clone(),
            dictionary: self.dictionary.clone(),
        })
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn offset(&self) -> usize {
        self.offset
    }

    pub fn null_count(&self) -> usize {
        self.null_count
    }

    pub fn validity(&self) -> Option<&Buffer> {
        self.validity.as_ref()
    }

    pub fn buffers(&self) -> &[Buffer] {
        &self.buffers
    }

    pub fn buffer(&self, i: usize) -> &Buffer {
        &self.buffers[i]
    }

    pub fn children(&self) -> &[ArrayRef] {
        &self.children
    }

    pub fn child(&self, i: usize) -> &ArrayRef {
        &self.children[i]
    }

    pub fn dictionary(&self) -> Option<&ArrayRef> {
        self.dictionary.as_ref()
    }

    /// Whether slot `i` (relative to the slice) is null.
    pub fn is_null(&self, i: usize) -> bool {
        match (&self.data_type, &self.validity) {
            (DataType::Null, _) => true,
            (_, Some(bitmap)) => !get_bit(bitmap, self.offset + i),
            (_, None) => false,
        }
    }

    pub fn is_valid(&self, i: usize) -> bool {
        !self.is_null(i)
    }

    /// Fixed-width value at slot `i`.
    pub fn value<T: NativeType>(&self, i: usize) -> T {
        self.buffers[0].value::<T>(self.offset + i)
    }

    /// Collect a fixed-width column, nulls as `None`.
    pub fn values<T: NativeType>(&self) -> Vec<Option<T>> {
        (0..self.len)
            .map(|i| self.is_valid(i).then(|| self.value::<T>(i)))
            .collect()
    }

    pub fn bool_value(&self, i: usize) -> bool {
        get_bit(&self.buffers[0], self.offset + i)
    }

    /// `[start, end)` bounds of slot `i` in the values buffer (variable width) or
    /// child array (list).
    pub fn value_range(&self, i: usize) -> (usize, usize) {
        let offsets = &self.buffers[0];
        let start = offsets.value::<i32>(self.offset + i) as usize;
        let end = offsets.value::<i32>(self.offset + i + 1) as usize;
        (start, end)
    }

    /// Raw bytes of slot `i` for Utf8, Binary and FixedSizeBinary.
    pub fn value_bytes(&self, i: usize) -> &[u8] {
        match &self.data_type {
            DataType::FixedSizeBinary(w) => {
                let w = *w as usize;
                let start = (self.offset + i) * w;
                &self.buffers[0][start..start + w]
            }
            _ => {
                let (start, end) = self.value_range(i);
                &self.buffers[1][start..end]
            }
        }
    }

    /// String at slot `i`, `None` when null.
    pub fn value_str(&self, i: usize) -> Option<&str> {
        if self.is_null(i) {
            return None;
        }
        std::str::from_utf8(self.value_bytes(i)).ok()
    }

    /// Dictionary index at slot `i`, widened to i64.
    pub fn dictionary_key(&self, i: usize) -> i64 {
        let DataType::Dictionary { index_type, .. } = &self.data_type else {
            return 0;
        };
        read_integer(&self.buffers[0], index_type, self.offset + i)
    }

    /// Union type id at slot `i`.
    pub fn type_id(&self, i: usize) -> i8 {
        self.buffers[0].value::<i8>(self.offset + i)
    }

    /// Index of the union child holding slot `i`.
    pub fn union_child_index(&self, i: usize) -> Option<usize> {
        let DataType::Union { type_codes, .. } = &self.data_type else {
            return None;
        };
        let code = self.type_id(i);
        type_codes.iter().position(|c| *c == code)
    }

    /// Position inside the union child for slot `i`.
    pub fn union_value_offset(&self, i: usize) -> usize {
        match &self.data_type {
            DataType::Union { mode: UnionMode::Dense, .. } => {
                self.buffers[1].value::<i32>(self.offset + i) as usize
            }
            _ => self.offset + i,
        }
    }

    /// Check buffer counts, sizes and offsets so accessors cannot run out of bounds.
    pub fn validate(&self) -> Result<()> {
        let end = self.offset + self.len;
        match &self.data_type {
            DataType::Null => {
                self.expect_layout(0, 0)?;
            }
            DataType::Boolean => {
                self.expect_layout(1, 0)?;
                self.expect_min_len(0, bytes_for_bits(end), "values")?;
            }
            DataType::Utf8 | DataType::Binary => {
                self.expect_layout(2, 0)?;
                let (_, last) = self.check_offsets()?;
                if last > self.buffers[1].len() {
                    return Err(IpcError::invalid(format!(
                        "{} offsets reach byte {last} but values buffer holds {}",
                        self.data_type,
                        self.buffers[1].len()
                    )));
                }
            }
            DataType::List(item) => {
                self.expect_layout(1, 1)?;
                let (_, last) = self.check_offsets()?;
                let child = &self.children[0];
                if child.data_type() != item.data_type() {
                    return Err(IpcError::invalid(format!(
                        "list child is {} but the item field is {}",
                        child.data_type(),
                        item.data_type()
                    )));
                }
                if last > child.len() {
                    return Err(IpcError::invalid(format!(
                        "list offsets reach {last} but child has {} values",
                        child.len()
                    )));
                }
            }
            DataType::Struct(fields) => {
                self.expect_layout(0, fields.len())?;
                for (field, child) in fields.iter().zip(&self.children) {
                    self.check_congruent_child(field.data_type(), child, end)?;
                }
            }
            DataType::Union { mode, fields, type_codes } => {
                let nbuf = if *mode == UnionMode::Dense { 2 } else { 1 };
                self.expect_layout(nbuf, fields.len())?;
                self.expect_min_len(0, end, "type ids")?;
                if *mode == UnionMode::Dense {
                    self.expect_min_len(1, end * 4, "union offsets")?;
                }
                for (field, child) in fields.iter().zip(&self.children) {
                    if child.data_type() != field.data_type() {
                        return Err(IpcError::invalid(format!(
                            "union child is {} but field {} is {}",
                            child.data_type(),
                            field.name(),
                            field.data_type()
                        )));
                    }
                    if *mode == UnionMode::Sparse && child.len() < end {
                        return Err(IpcError::invalid(format!(
                            "sparse union child {} has {} values, expected at least {end}",
                            field.name(),
                            child.len()
                        )));
                    }
                }
                for i in 0..self.len {
                    let code = self.type_id(i);
                    let Some(child) = type_codes.iter().position(|c| *c == code) else {
                        return Err(IpcError::invalid(format!(
                            "union type id {code} at slot {i} is not a declared type code"
                        )));
                    };
                    if *mode == UnionMode::Dense {
                        let off = self.buffers[1].value::<i32>(self.offset + i);
                        if off < 0 || off as usize >= self.children[child].len() {
                            return Err(IpcError::invalid(format!(
                                "dense union offset {off} at slot {i} out of range for child of {} values",
                                self.children[child].len()
                            )));
                        }
                    }
                }
            }
            DataType::Dictionary { index_type, .. } => {
                if !index_type.is_integer() {
                    return Err(IpcError::invalid(format!(
                        "dictionary index type must be an integer, got {index_type}"
                    )));
                }
                self.expect_layout(1, 0)?;
                let width = index_type.byte_width().unwrap_or(0);
                self.expect_min_len(0, end * width, "dictionary indices")?;
            }
            fixed => {
                let width = fixed.byte_width().ok_or_else(|| {
                    IpcError::not_implemented(format!("no physical layout for {fixed}"))
                })?;
                if let DataType::FixedSizeBinary(w) = fixed {
                    if *w < 0 {
                        return Err(IpcError::invalid(format!(
                            "negative fixed size binary width {w}"
                        )));
                    }
                }
                self.expect_layout(1, 0)?;
                self.expect_min_len(0, end * width, "values")?;
            }
        }
        Ok(())
    }

    fn expect_layout(&self, buffers: usize, children: usize) -> Result<()> {
        if self.buffers.len() != buffers {
            return Err(IpcError::invalid(format!(
                "{} array expects {buffers} buffers, got {}",
                self.data_type,
                self.buffers.len()
            )));
        }
        if self.children.len() != children {
            return Err(IpcError::invalid(format!(
                "{} array expects {children} children, got {}",
                self.data_type,
                self.children.len()
            )));
        }
        Ok(())
    }

    fn expect_min_len(&self, buffer: usize, min: usize, what: &str) -> Result<()> {
        let got = self.buffers[buffer].len();
        if got < min {
            return Err(IpcError::invalid(format!(
                "{} {what} buffer holds {got} bytes, needs {min}",
                self.data_type
            )));
        }
        Ok(())
    }

    /// Offsets must exist for every slot plus one, start non-negative and never decrease.
    /// Returns the first and last offset of the slice.
    fn check_offsets(&self) -> Result<(usize, usize)> {
        let offsets = &self.buffers[0];
        if self.len == 0 && offsets.is_empty() {
            return Ok((0, 0));
        }
        self.expect_min_len(0, (self.offset + self.len + 1) * 4, "offsets")?;
        let mut prev = offsets.value::<i32>(self.offset);
        if prev < 0 {
            return Err(IpcError::invalid(format!("negative offset {prev}")));
        }
        let first = prev as usize;
        for i in 1..=self.len {
            let cur = offsets.value::<i32>(self.offset + i);
            if cur < prev {
                return Err(IpcError::invalid(format!(
                    "offsets decrease from {prev} to {cur} at slot {i}"
                )));
            }
            prev = cur;
        }
        Ok((first, prev as usize))
    }

    fn check_congruent_child(&self, expected: &DataType, child: &ArrayRef, end: usize) -> Result<()> {
        if child.data_type() != expected {
            return Err(IpcError::invalid(format!(
                "struct child is {} but field type is {expected}",
                child.data_type()
            )));
        }
        if child.len() < end {
            return Err(IpcError::invalid(format!(
                "struct child has {} values, expected at least {end}",
                child.len()
            )));
        }
        Ok(())
    }
}

/// Read an integer of type `int_type` at element position `i`, widened to i64.
pub(crate) fn read_integer(buf: &Buffer, int_type: &DataType, i: usize) -> i64 {
    match int_type {
        DataType::Int8 => buf.value::<i8>(i) as i64,
        DataType::Int16 => buf.value::<i16>(i) as i64,
        DataType::Int32 => buf.value::<i32>(i) as i64,
        DataType::Int64 => buf.value::<i64>(i),
        DataType::UInt8 => buf.value::<u8>(i) as i64,
        DataType::UInt16 => buf.value::<u16>(i) as i64,
        DataType::UInt32 => buf.value::<u32>(i) as i64,
        DataType::UInt64 => buf.value::<u64>(i) as i64,
        _ => 0,
    }
}
