use std::sync::Arc;

use crate::error::{IpcError, Result};
use crate::models::array::array_data::ArrayRef;
use crate::models::types::schema::SchemaRef;

/// Equal-length columns bound to a shared schema.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordBatch {
    schema: SchemaRef,
    num_rows: usize,
    columns: Vec<ArrayRef>,
}

impl RecordBatch {
    /// Checks the column count, each column's type against its field and that all
    /// columns have the same length.
    pub fn try_new(schema: SchemaRef, columns: Vec<ArrayRef>) -> Result<Self> {
        let num_rows = columns.first().map(|c| c.len()).unwrap_or(0);
        Self::try_new_with_rows(schema, columns, num_rows)
    }

    /// As [`RecordBatch::try_new`] but with an explicit row count, for zero-column batches.
    pub fn try_new_with_rows(schema: SchemaRef, columns: Vec<ArrayRef>, num_rows: usize) -> Result<Self> {
        if columns.len() != schema.num_fields() {
            return Err(IpcError::invalid(format!(
                "schema has {} fields but {} columns were given",
                schema.num_fields(),
                columns.len()
            )));
        }
        for (field, column) in schema.fields().iter().zip(&columns) {
            if column.data_type() != field.data_type() {
                return Err(IpcError::invalid(format!(
                    "column {} is {} but the schema declares {}",
                    field.name(),
                    column.data_type(),
                    field.data_type()
                )));
            }
            if column.len() != num_rows {
                return Err(IpcError::invalid(format!(
                    "column {} has {} rows, expected {num_rows}",
                    field.name(),
                    column.len()
                )));
            }
        }
        Ok(Self { schema, num_rows, columns })
    }

    pub fn schema(&self) -> &SchemaRef {
        &self.schema
    }

    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    pub fn num_columns(&self) -> usize {
        self.columns.len()
    }

    pub fn column(&self, i: usize) -> &ArrayRef {
        &self.columns[i]
    }

    pub fn columns(&self) -> &[ArrayRef] {
        &self.columns
    }

    /// Zero-copy row range.
    pub fn slice(&self, offset: usize, len: usize) -> Result<RecordBatch> {
        if offset.checked_add(len).map_or(true, |end| end > self.num_rows) {
            return Err(IpcError::invalid(format!(
                "slice [{offset}, {offset}+{len}) out of bounds for batch of {} rows",
                self.num_rows
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| c.slice(offset, len).map(Arc::new))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            schema: Arc::clone(&self.schema),
            num_rows: len,
            columns,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::{int32_array, utf8_array};
    use crate::models::types::datatype::DataType;
    use crate::models::types::schema::{Field, Schema};

    fn schema() -> SchemaRef {
        Arc::new(Schema::new(vec![
            Field::new("a", DataType::Int32, true),
            Field::new("b", DataType::Utf8, true),
        ]))
    }

    #[test]
    fn test_try_new_checks_shape() {
        let a = Arc::new(int32_array(&[Some(1), Some(2)]));
        let b = Arc::new(utf8_array(&[Some("x"), None]));
        let batch = RecordBatch::try_new(schema(), vec![a.clone(), b.clone()]).unwrap();
        assert_eq!(batch.num_rows(), 2);

        assert!(RecordBatch::try_new(schema(), vec![a.clone()]).is_err());
        assert!(RecordBatch::try_new(schema(), vec![b.clone(), a.clone()]).is_err());
        let short = Arc::new(utf8_array(&[Some("x")]));
        assert!(RecordBatch::try_new(schema(), vec![a, short]).is_err());
    }

    #[test]
    fn test_slice_rows() {
        let a = Arc::new(int32_array(&[Some(1), Some(2), Some(3)]));
        let b = Arc::new(utf8_array(&[Some("x"), None, Some("z")]));
        let batch = RecordBatch::try_new(schema(), vec![a, b]).unwrap();
        let tail = batch.slice(1, 2).unwrap();
        assert_eq!(tail.num_rows(), 2);
        assert_eq!(tail.column(1).value_str(1), Some("z"));
        assert!(batch.slice(2, 2).is_err());
    }
}
