use std::collections::BTreeMap;
use std::sync::Arc;

use crate::models::types::datatype::DataType;

/// A named, typed column definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Field {
    name: String,
    data_type: DataType,
    nullable: bool,
    metadata: BTreeMap<String, String>,
}

impl Field {
    pub fn new(name: impl Into<String>, data_type: DataType, nullable: bool) -> Self {
        Self {
            name: name.into(),
            data_type,
            nullable,
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }
}

/// Ordered field list plus optional key-value metadata. Immutable once built; batches
/// share it through [`SchemaRef`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Schema {
    fields: Vec<Field>,
    metadata: BTreeMap<String, String>,
}

pub type SchemaRef = Arc<Schema>;

impl Schema {
    pub fn new(fields: Vec<Field>) -> Self {
        Self { fields, metadata: BTreeMap::new() }
    }

    pub fn with_metadata(mut self, metadata: BTreeMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> &Field {
        &self.fields[i]
    }

    pub fn num_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn metadata(&self) -> &BTreeMap<String, String> {
        &self.metadata
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name() == name)
    }

    /// Every dictionary-encoded type in the schema, depth-first, as `(id, value_type)`.
    /// An id appears once even if several fields share it.
    pub fn dictionary_types(&self) -> Vec<(i64, &DataType)> {
        fn walk<'a>(dt: &'a DataType, out: &mut Vec<(i64, &'a DataType)>) {
            if let DataType::Dictionary { id, value_type, .. } = dt {
                if !out.iter().any(|(seen, _)| seen == id) {
                    out.push((*id, value_type.as_ref()));
                }
                walk(value_type, out);
                return;
            }
            for child in dt.children() {
                walk(child.data_type(), out);
            }
        }

        let mut out = Vec::new();
        for field in &self.fields {
            walk(field.data_type(), &mut out);
        }
        out
    }
}
