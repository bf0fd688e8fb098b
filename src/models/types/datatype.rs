//! # Logical data types
//!
//! The closed set of type kinds this codec reads and writes. Each kind fixes a physical
//! layout (how many buffers, their element widths, how many children), which is what the
//! serializer and the array loader dispatch on.

use std::fmt;

use crate::error::{IpcError, Result};
use crate::models::types::schema::Field;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnionMode {
    /// Every child has the union's length; no offsets buffer.
    Sparse,
    /// Each slot carries an int32 offset into its child.
    Dense,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Null,
    Boolean,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    /// Stored as raw 16-bit values; no arithmetic is performed.
    Float16,
    Float32,
    Float64,
    /// Days since the UNIX epoch, int32.
    Date32,
    /// Milliseconds since the UNIX epoch, int64.
    Date64,
    /// Opaque 16-byte little-endian payload.
    Decimal128 { precision: i32, scale: i32 },
    Utf8,
    Binary,
    FixedSizeBinary(i32),
    List(Box<Field>),
    Struct(Vec<Field>),
    Union {
        mode: UnionMode,
        fields: Vec<Field>,
        /// Type code for each child, in child order. Codes are non-negative and
        /// fit in the one-byte type id buffer.
        type_codes: Vec<i8>,
    },
    Dictionary {
        id: i64,
        index_type: Box<DataType>,
        value_type: Box<DataType>,
        ordered: bool,
    },
}

impl DataType {
    /// Bytes per element for fixed-width layouts; dictionaries report their index width.
    /// `None` for bit-packed, variable-length and nested layouts.
    pub fn byte_width(&self) -> Option<usize> {
        use DataType::*;
        match self {
            Int8 | UInt8 => Some(1),
            Int16 | UInt16 | Float16 => Some(2),
            Int32 | UInt32 | Float32 | Date32 => Some(4),
            Int64 | UInt64 | Float64 | Date64 => Some(8),
            Decimal128 { .. } => Some(16),
            FixedSizeBinary(w) => Some((*w).max(0) as usize),
            Dictionary { index_type, .. } => index_type.byte_width(),
            _ => None,
        }
    }

    pub fn is_integer(&self) -> bool {
        use DataType::*;
        matches!(
            self,
            Int8 | Int16 | Int32 | Int64 | UInt8 | UInt16 | UInt32 | UInt64
        )
    }

    pub fn is_signed_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
        )
    }

    pub fn is_nested(&self) -> bool {
        matches!(
            self,
            DataType::List(_) | DataType::Struct(_) | DataType::Union { .. }
        )
    }

    /// Child fields of nested types, in schema order.
    pub fn children(&self) -> &[Field] {
        match self {
            DataType::List(f) => std::slice::from_ref(f.as_ref()),
            DataType::Struct(fields) => fields,
            DataType::Union { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Convenience constructor that checks union type codes against the children.
    pub fn try_union(mode: UnionMode, fields: Vec<Field>, type_codes: Vec<i8>) -> Result<Self> {
        if fields.len() != type_codes.len() {
            return Err(IpcError::invalid(format!(
                "union has {} children but {} type codes",
                fields.len(),
                type_codes.len()
            )));
        }
        if let Some(bad) = type_codes.iter().find(|c| **c < 0) {
            return Err(IpcError::invalid(format!("negative union type code {bad}")));
        }
        for (i, code) in type_codes.iter().enumerate() {
            if type_codes[..i].contains(code) {
                return Err(IpcError::invalid(format!("duplicate union type code {code}")));
            }
        }
        Ok(DataType::Union { mode, fields, type_codes })
    }

    /// Dictionary type constructor; the index type must be an integer.
    pub fn try_dictionary(
        id: i64,
        index_type: DataType,
        value_type: DataType,
        ordered: bool,
    ) -> Result<Self> {
        if !index_type.is_integer() {
            return Err(IpcError::invalid(format!(
                "dictionary index type must be an integer, got {index_type}"
            )));
        }
        Ok(DataType::Dictionary {
            id,
            index_type: Box::new(index_type),
            value_type: Box::new(value_type),
            ordered,
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataType::Decimal128 { precision, scale } => {
                write!(f, "Decimal128({precision}, {scale})")
            }
            DataType::FixedSizeBinary(w) => write!(f, "FixedSizeBinary({w})"),
            DataType::List(item) => write!(f, "List<{}>", item.data_type()),
            DataType::Struct(fields) => {
                write!(f, "Struct<")?;
                for (i, field) in fields.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", field.name(), field.data_type())?;
                }
                write!(f, ">")
            }
            DataType::Union { mode, fields, .. } => {
                write!(f, "Union<{mode:?}, {} children>", fields.len())
            }
            DataType::Dictionary { id, index_type, value_type, .. } => {
                write!(f, "Dictionary<{index_type}, {value_type}, id={id}>")
            }
            other => write!(f, "{other:?}"),
        }
    }
}
