//! Constructors for arrays from plain Rust values.
//!
//! Every builder produces a zero-offset [`ArrayData`] whose buffers are exactly as long as
//! the values need. Slots given as `None` are null; if nothing is null no validity bitmap
//! is allocated.

use std::sync::Arc;

use crate::error::{IpcError, Result};
use crate::models::array::array_data::{ArrayData, ArrayRef};
use crate::models::buffer::Buffer;
use crate::models::types::datatype::{DataType, UnionMode};
use crate::models::types::native::NativeType;
use crate::models::types::schema::Field;
use crate::utils::pack_bits;

fn validity_from<I: Iterator<Item = bool>>(valid: I, len: usize) -> Option<Buffer> {
    let bits: Vec<bool> = valid.take(len).collect();
    if bits.iter().all(|v| *v) {
        None
    } else {
        Some(Buffer::from_vec(pack_bits(bits.into_iter(), len)))
    }
}

pub fn null_array(len: usize) -> ArrayData {
    ArrayData::new_unchecked(DataType::Null, len, None, vec![], vec![])
}

/// Fixed-width array of `data_type` from native values. The width of `T` must match.
pub fn primitive_array<T: NativeType>(data_type: DataType, values: &[Option<T>]) -> Result<ArrayData> {
    if data_type.byte_width() != Some(T::WIDTH) || matches!(data_type, DataType::Dictionary { .. }) {
        return Err(IpcError::invalid(format!(
            "{data_type} cannot be built from {}-byte native values",
            T::WIDTH
        )));
    }
    Ok(fixed_width(data_type, values))
}

fn fixed_width<T: NativeType>(data_type: DataType, values: &[Option<T>]) -> ArrayData {
    let mut raw = Vec::with_capacity(values.len() * T::WIDTH);
    for v in values {
        match v {
            Some(v) => v.extend_le(&mut raw),
            None => raw.extend(std::iter::repeat(0u8).take(T::WIDTH)),
        }
    }
    let validity = validity_from(values.iter().map(Option::is_some), values.len());
    ArrayData::new_unchecked(data_type, values.len(), validity, vec![Buffer::from_vec(raw)], vec![])
}

macro_rules! typed_builder {
    ($name:ident, $t:ty, $dt:expr) => {
        pub fn $name(values: &[Option<$t>]) -> ArrayData {
            fixed_width::<$t>($dt, values)
        }
    };
}

typed_builder!(int8_array, i8, DataType::Int8);
typed_builder!(int16_array, i16, DataType::Int16);
typed_builder!(int32_array, i32, DataType::Int32);
typed_builder!(int64_array, i64, DataType::Int64);
typed_builder!(uint8_array, u8, DataType::UInt8);
typed_builder!(uint32_array, u32, DataType::UInt32);
typed_builder!(float32_array, f32, DataType::Float32);
typed_builder!(float64_array, f64, DataType::Float64);

pub fn boolean_array(values: &[Option<bool>]) -> ArrayData {
    let bits = pack_bits(values.iter().map(|v| v.unwrap_or(false)), values.len());
    let validity = validity_from(values.iter().map(Option::is_some), values.len());
    ArrayData::new_unchecked(DataType::Boolean, values.len(), validity, vec![Buffer::from_vec(bits)], vec![])
}

// Offsets are int32; total value bytes must stay below 2 GiB.
fn variable_width(data_type: DataType, values: &[Option<&[u8]>]) -> ArrayData {
    let mut offsets = Vec::with_capacity(values.len() + 1);
    let mut data = Vec::new();
    offsets.push(0i32);
    for v in values {
        if let Some(bytes) = v {
            data.extend_from_slice(bytes);
        }
        debug_assert!(data.len() <= i32::MAX as usize);
        offsets.push(data.len() as i32);
    }
    let validity = validity_from(values.iter().map(Option::is_some), values.len());
    ArrayData::new_unchecked(
        data_type,
        values.len(),
        validity,
        vec![Buffer::from_values(&offsets), Buffer::from_vec(data)],
        vec![],
    )
}

pub fn utf8_array(values: &[Option<&str>]) -> ArrayData {
    let raw: Vec<Option<&[u8]>> = values.iter().map(|v| v.map(str::as_bytes)).collect();
    variable_width(DataType::Utf8, &raw)
}

pub fn binary_array(values: &[Option<&[u8]>]) -> ArrayData {
    variable_width(DataType::Binary, values)
}

pub fn fixed_size_binary_array(width: i32, values: &[Option<&[u8]>]) -> Result<ArrayData> {
    let w = usize::try_from(width)
        .map_err(|_| IpcError::invalid(format!("negative fixed size binary width {width}")))?;
    let mut data = Vec::with_capacity(values.len() * w);
    for v in values {
        match v {
            Some(bytes) if bytes.len() == w => data.extend_from_slice(bytes),
            Some(bytes) => {
                return Err(IpcError::invalid(format!(
                    "value of {} bytes in a FixedSizeBinary({width}) array",
                    bytes.len()
                )));
            }
            None => data.extend(std::iter::repeat(0u8).take(w)),
        }
    }
    let validity = validity_from(values.iter().map(Option::is_some), values.len());
    ArrayData::try_new(
        DataType::FixedSizeBinary(width),
        values.len(),
        0,
        validity,
        vec![Buffer::from_vec(data)],
        vec![],
    )
}

/// List array over `values`. `offsets` has one entry per slot plus one.
pub fn list_array(
    item: Field,
    offsets: Vec<i32>,
    valid: Option<&[bool]>,
    values: ArrayData,
) -> Result<ArrayData> {
    let len = offsets.len().checked_sub(1).ok_or_else(|| IpcError::invalid("list offsets are empty"))?;
    let validity = valid.and_then(|v| validity_from(v.iter().copied(), len));
    ArrayData::try_new(
        DataType::List(Box::new(item)),
        len,
        0,
        validity,
        vec![Buffer::from_values(&offsets)],
        vec![Arc::new(values)],
    )
}

/// Struct array; every column must have the same length.
pub fn struct_array(columns: Vec<(Field, ArrayData)>, valid: Option<&[bool]>) -> Result<ArrayData> {
    let len = columns.first().map(|(_, a)| a.len()).unwrap_or(0);
    if let Some((field, _)) = columns.iter().find(|(_, a)| a.len() != len) {
        return Err(IpcError::invalid(format!(
            "struct column {} length differs from the first column ({len})",
            field.name()
        )));
    }
    let (fields, children): (Vec<Field>, Vec<ArrayRef>) =
        columns.into_iter().map(|(f, a)| (f, Arc::new(a))).unzip();
    let validity = valid.and_then(|v| validity_from(v.iter().copied(), len));
    ArrayData::try_new(DataType::Struct(fields), len, 0, validity, vec![], children)
}

/// Union array. `value_offsets` is required for dense mode and must be `None` for sparse.
pub fn union_array(
    mode: UnionMode,
    fields: Vec<Field>,
    type_codes: Vec<i8>,
    type_ids: Vec<i8>,
    value_offsets: Option<Vec<i32>>,
    children: Vec<ArrayData>,
) -> Result<ArrayData> {
    let data_type = DataType::try_union(mode, fields, type_codes)?;
    let len = type_ids.len();
    let mut buffers = vec![Buffer::from_values(&type_ids)];
    match (mode, value_offsets) {
        (UnionMode::Dense, Some(offsets)) => {
            if offsets.len() != len {
                return Err(IpcError::invalid(format!(
                    "dense union has {len} type ids but {} offsets",
                    offsets.len()
                )));
            }
            buffers.push(Buffer::from_values(&offsets));
        }
        (UnionMode::Dense, None) => {
            return Err(IpcError::invalid("dense union requires value offsets"));
        }
        (UnionMode::Sparse, Some(_)) => {
            return Err(IpcError::invalid("sparse union cannot carry value offsets"));
        }
        (UnionMode::Sparse, None) => {}
    }
    let children = children.into_iter().map(Arc::new).collect();
    ArrayData::try_new(data_type, len, 0, None, buffers, children)
}

/// Dictionary-encoded array: integer `indices` into `dictionary`, registered under `id`.
pub fn dictionary_array(
    id: i64,
    indices: ArrayData,
    dictionary: ArrayRef,
    ordered: bool,
) -> Result<ArrayData> {
    if indices.offset() != 0 {
        return Err(IpcError::invalid("dictionary indices must not be sliced"));
    }
    let data_type = DataType::try_dictionary(
        id,
        indices.data_type().clone(),
        dictionary.data_type().clone(),
        ordered,
    )?;
    ArrayData::try_new(
        data_type,
        indices.len(),
        0,
        indices.validity().cloned(),
        indices.buffers().to_vec(),
        vec![],
    )?
    .with_dictionary(dictionary)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builders_lay_out_buffers() {
        let s = utf8_array(&[Some("x"), None, Some("yz")]);
        assert_eq!(s.buffer(0).to_values::<i32>(), vec![0, 1, 1, 3]);
        assert_eq!(s.buffer(1).as_slice(), b"xyz");
        assert_eq!(s.null_count(), 1);
        assert_eq!(s.value_str(2), Some("yz"));

        let b = boolean_array(&[Some(true), Some(false), Some(true)]);
        assert!(b.validity().is_none());
        assert_eq!(b.buffer(0).as_slice(), &[0b101]);
    }

    #[test]
    fn test_builder_rejections() {
        assert!(primitive_array::<i32>(DataType::Int64, &[Some(1)]).is_err());
        assert!(fixed_size_binary_array(3, &[Some(b"ab")]).is_err());
        assert!(struct_array(
            vec![
                (Field::new("a", DataType::Int32, true), int32_array(&[Some(1)])),
                (Field::new("b", DataType::Int32, true), int32_array(&[Some(1), Some(2)])),
            ],
            None,
        )
        .is_err());
        let fields = vec![Field::new("i", DataType::Int32, true)];
        assert!(union_array(UnionMode::Dense, fields, vec![0], vec![0], None, vec![int32_array(&[Some(1)])]).is_err());
    }

    #[test]
    fn test_dictionary_rejects_out_of_range_keys() {
        let dict = Arc::new(utf8_array(&[Some("a"), Some("b")]));
        assert!(dictionary_array(0, int32_array(&[Some(0), Some(1), None]), dict.clone(), false).is_ok());
        assert!(dictionary_array(0, int32_array(&[Some(2)]), dict, false).is_err());
    }
}
