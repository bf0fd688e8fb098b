//! # Schema decoding
//!
//! Converts the FlatBuffers `Schema` table (from a schema message or a file footer) back
//! into a [`Schema`]. The inverse of the builders in the encoder's schema module.

use std::collections::BTreeMap;

use arrow_ipc as fb;
use flatbuffers::{ForwardsUOffset, Vector};

use crate::error::{IpcError, Result};
use crate::models::types::datatype::{DataType, UnionMode};
use crate::models::types::schema::{Field, Schema};

/// Decode a schema table.
///
/// # Errors
/// `Invalid` for a big-endian schema, a malformed field, or a list without exactly one
/// child. `NotImplemented` for type kinds outside the supported set.
pub fn schema_from_fb(schema: fb::Schema<'_>) -> Result<Schema> {
    if schema.endianness() != fb::Endianness::Little {
        return Err(IpcError::invalid("big-endian schemas are not supported"));
    }
    let fields = match schema.fields() {
        Some(fields) => fields.iter().map(field_from_fb).collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    Ok(Schema::new(fields).with_metadata(metadata_from_fb(schema.custom_metadata())))
}

/// Decode one field and its children.
///
/// A field carrying a `DictionaryEncoding` becomes a `Dictionary` type wrapping the
/// declared value type; a missing index type means `Int32`.
pub fn field_from_fb(field: fb::Field<'_>) -> Result<Field> {
    let name = field.name().unwrap_or_default().to_string();
    let children = match field.children() {
        Some(children) => children.iter().map(field_from_fb).collect::<Result<Vec<_>>>()?,
        None => Vec::new(),
    };
    let value_type = type_from_fb(&field, children)?;

    let data_type = match field.dictionary() {
        Some(encoding) => {
            let index_type = match encoding.indexType() {
                Some(int) => int_from_fb(int.bitWidth(), int.is_signed())?,
                None => DataType::Int32,
            };
            if encoding.dictionaryKind() != fb::DictionaryKind::DenseArray {
                return Err(IpcError::not_implemented("non-dense dictionary encoding"));
            }
            DataType::try_dictionary(encoding.id(), index_type, value_type, encoding.isOrdered())?
        }
        None => value_type,
    };

    Ok(Field::new(name, data_type, field.nullable())
        .with_metadata(metadata_from_fb(field.custom_metadata())))
}

fn type_from_fb(field: &fb::Field<'_>, mut children: Vec<Field>) -> Result<DataType> {
    let data_type = match field.type_type() {
        fb::Type::Null => DataType::Null,
        fb::Type::Bool => DataType::Boolean,
        fb::Type::Int => {
            let int = field
                .type_as_int()
                .ok_or_else(|| IpcError::invalid("Int field without type table"))?;
            int_from_fb(int.bitWidth(), int.is_signed())?
        }
        fb::Type::FloatingPoint => {
            let fp = field
                .type_as_floating_point()
                .ok_or_else(|| IpcError::invalid("FloatingPoint field without type table"))?;
            match fp.precision() {
                fb::Precision::HALF => DataType::Float16,
                fb::Precision::SINGLE => DataType::Float32,
                fb::Precision::DOUBLE => DataType::Float64,
                other => return Err(IpcError::invalid(format!("unknown float precision {other:?}"))),
            }
        }
        fb::Type::Date => {
            let date = field
                .type_as_date()
                .ok_or_else(|| IpcError::invalid("Date field without type table"))?;
            match date.unit() {
                fb::DateUnit::DAY => DataType::Date32,
                fb::DateUnit::MILLISECOND => DataType::Date64,
                other => return Err(IpcError::invalid(format!("unknown date unit {other:?}"))),
            }
        }
        fb::Type::Decimal => {
            let decimal = field
                .type_as_decimal()
                .ok_or_else(|| IpcError::invalid("Decimal field without type table"))?;
            if decimal.bitWidth() != 128 {
                return Err(IpcError::not_implemented(format!(
                    "{}-bit decimals",
                    decimal.bitWidth()
                )));
            }
            DataType::Decimal128 {
                precision: decimal.precision(),
                scale: decimal.scale(),
            }
        }
        fb::Type::Utf8 => DataType::Utf8,
        fb::Type::Binary => DataType::Binary,
        fb::Type::FixedSizeBinary => {
            let fsb = field
                .type_as_fixed_size_binary()
                .ok_or_else(|| IpcError::invalid("FixedSizeBinary field without type table"))?;
            if fsb.byteWidth() < 0 {
                return Err(IpcError::invalid(format!(
                    "negative fixed size binary width {}",
                    fsb.byteWidth()
                )));
            }
            DataType::FixedSizeBinary(fsb.byteWidth())
        }
        fb::Type::List => {
            if children.len() != 1 {
                return Err(IpcError::invalid(format!(
                    "list field must have exactly one child, got {}",
                    children.len()
                )));
            }
            DataType::List(Box::new(children.remove(0)))
        }
        fb::Type::Struct_ => DataType::Struct(children),
        fb::Type::Union => {
            let union = field
                .type_as_union()
                .ok_or_else(|| IpcError::invalid("Union field without type table"))?;
            let mode = match union.mode() {
                fb::UnionMode::Sparse => UnionMode::Sparse,
                fb::UnionMode::Dense => UnionMode::Dense,
                other => return Err(IpcError::invalid(format!("unknown union mode {other:?}"))),
            };
            let type_codes = match union.typeIds() {
                Some(ids) => ids
                    .iter()
                    .map(|id| {
                        i8::try_from(id).map_err(|_| {
                            IpcError::invalid(format!("union type id {id} does not fit in one byte"))
                        })
                    })
                    .collect::<Result<Vec<_>>>()?,
                None => (0..children.len())
                    .map(|i| {
                        i8::try_from(i).map_err(|_| IpcError::invalid("too many union children"))
                    })
                    .collect::<Result<Vec<_>>>()?,
            };
            DataType::try_union(mode, children, type_codes)?
        }
        other => {
            return Err(IpcError::not_implemented(format!(
                "field type {}",
                other.variant_name().unwrap_or("unknown")
            )))
        }
    };
    Ok(data_type)
}

fn int_from_fb(bit_width: i32, signed: bool) -> Result<DataType> {
    Ok(match (bit_width, signed) {
        (8, true) => DataType::Int8,
        (16, true) => DataType::Int16,
        (32, true) => DataType::Int32,
        (64, true) => DataType::Int64,
        (8, false) => DataType::UInt8,
        (16, false) => DataType::UInt16,
        (32, false) => DataType::UInt32,
        (64, false) => DataType::UInt64,
        _ => return Err(IpcError::invalid(format!("invalid integer bit width {bit_width}"))),
    })
}

fn metadata_from_fb(
    entries: Option<Vector<'_, ForwardsUOffset<fb::KeyValue<'_>>>>,
) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    if let Some(entries) = entries {
        for kv in entries.iter() {
            if let Some(key) = kv.key() {
                out.insert(key.to_string(), kv.value().unwrap_or_default().to_string());
            }
        }
    }
    out
}
