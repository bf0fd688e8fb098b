//! # Dictionary registry
//!
//! Per-session mapping from dictionary id to the current dictionary values. A writer
//! fills it from the batches it is given (or explicit registration) and emits one
//! dictionary message per entry at start; a reader fills it from dictionary messages and
//! uses it to pair decoded index arrays with their values.
//!
//! The registry is plain owned state. Sessions never share one, and it has no internal
//! locking.

use std::collections::BTreeMap;
use std::sync::Arc;

use log::trace;

use crate::error::{IpcError, Result};
use crate::models::array::array_data::{ArrayData, ArrayRef};
use crate::models::array::record_batch::RecordBatch;
use crate::models::types::datatype::DataType;

#[derive(Debug, Default, Clone)]
pub struct DictionaryRegistry {
    dictionaries: BTreeMap<i64, ArrayRef>,
}

impl DictionaryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.dictionaries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dictionaries.is_empty()
    }

    pub fn contains(&self, id: i64) -> bool {
        self.dictionaries.contains_key(&id)
    }

    pub fn get(&self, id: i64) -> Result<&ArrayRef> {
        self.dictionaries
            .get(&id)
            .ok_or_else(|| IpcError::invalid(format!("dictionary id {id} not found")))
    }

    /// Register a new dictionary. An id may only be inserted once.
    pub fn insert(&mut self, id: i64, dictionary: ArrayRef) -> Result<()> {
        if self.dictionaries.contains_key(&id) {
            return Err(IpcError::invalid(format!("dictionary id {id} already registered")));
        }
        trace!("registering dictionary {id} ({} values)", dictionary.len());
        self.dictionaries.insert(id, dictionary);
        Ok(())
    }

    /// Replace an existing dictionary, returning the old one.
    pub fn replace(&mut self, id: i64, dictionary: ArrayRef) -> Result<ArrayRef> {
        match self.dictionaries.get_mut(&id) {
            Some(slot) => Ok(std::mem::replace(slot, dictionary)),
            None => Err(IpcError::invalid(format!(
                "cannot replace unregistered dictionary id {id}"
            ))),
        }
    }

    /// Id under which this exact dictionary handle is registered.
    pub fn id_of(&self, dictionary: &ArrayRef) -> Option<i64> {
        self.dictionaries
            .iter()
            .find(|(_, d)| Arc::ptr_eq(d, dictionary))
            .map(|(id, _)| *id)
    }

    /// Entries in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = (i64, &ArrayRef)> {
        self.dictionaries.iter().map(|(id, d)| (*id, d))
    }

    /// Register the dictionaries carried by `batch`'s dictionary-encoded columns,
    /// including those nested in structs, lists and unions.
    ///
    /// Ids that are already registered are left alone. Returns the ids whose carried
    /// dictionary differs from the registered one, so callers can decide whether that is
    /// an error.
    pub fn collect_from_batch(&mut self, batch: &RecordBatch) -> Result<Vec<i64>> {
        let mut conflicts = Vec::new();
        for column in batch.columns() {
            self.collect_from_array(column, &mut conflicts)?;
        }
        Ok(conflicts)
    }

    fn collect_from_array(&mut self, array: &ArrayData, conflicts: &mut Vec<i64>) -> Result<()> {
        if let DataType::Dictionary { id, value_type, .. } = array.data_type() {
            if let DataType::Dictionary { .. } = value_type.as_ref() {
                return Err(IpcError::not_implemented(format!(
                    "dictionary {id} has dictionary-encoded values"
                )));
            }
            if let Some(dictionary) = array.dictionary() {
                match self.dictionaries.get(id) {
                    None => self.insert(*id, Arc::clone(dictionary))?,
                    Some(existing) => {
                        if !Arc::ptr_eq(existing, dictionary)
                            && existing.as_ref() != dictionary.as_ref()
                            && !conflicts.contains(id)
                        {
                            conflicts.push(*id);
                        }
                    }
                }
            }
            return Ok(());
        }
        for child in array.children() {
            self.collect_from_array(child, conflicts)?;
        }
        Ok(())
    }

    /// Pair every dictionary-encoded column of a decoded batch with its registered values.
    pub fn attach(&self, batch: &RecordBatch) -> Result<RecordBatch> {
        let columns = batch
            .columns()
            .iter()
            .map(|c| self.attach_array(c))
            .collect::<Result<Vec<_>>>()?;
        RecordBatch::try_new_with_rows(Arc::clone(batch.schema()), columns, batch.num_rows())
    }

    fn attach_array(&self, array: &ArrayRef) -> Result<ArrayRef> {
        match array.data_type() {
            DataType::Dictionary { id, .. } => {
                let dictionary = self.get(*id)?;
                let joined = array.as_ref().clone().with_dictionary(Arc::clone(dictionary))?;
                Ok(Arc::new(joined))
            }
            dt if dt.is_nested() => {
                let children = array
                    .children()
                    .iter()
                    .map(|c| self.attach_array(c))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Arc::new(array.as_ref().clone().with_children(children)))
            }
            _ => Ok(Arc::clone(array)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::array::builders::{dictionary_array, int32_array, struct_array, utf8_array};
    use crate::models::types::schema::{Field, Schema};

    fn dict_batch(dict: ArrayRef) -> RecordBatch {
        let col = dictionary_array(7, int32_array(&[Some(1), None, Some(0)]), dict, false).unwrap();
        let schema = Schema::new(vec![Field::new("d", col.data_type().clone(), true)]);
        RecordBatch::try_new(Arc::new(schema), vec![Arc::new(col)]).unwrap()
    }

    #[test]
    fn test_insert_get_replace() {
        let mut reg = DictionaryRegistry::new();
        let a = Arc::new(utf8_array(&[Some("a")]));
        let b = Arc::new(utf8_array(&[Some("b")]));
        reg.insert(1, a.clone()).unwrap();
        assert!(reg.insert(1, b.clone()).is_err());
        assert_eq!(reg.id_of(&a), Some(1));
        assert!(reg.get(2).is_err());
        let old = reg.replace(1, b.clone()).unwrap();
        assert!(Arc::ptr_eq(&old, &a));
        assert_eq!(reg.id_of(&b), Some(1));
        assert!(reg.replace(5, a).is_err());
    }

    #[test]
    fn test_collect_reports_conflicts() {
        let mut reg = DictionaryRegistry::new();
        let dict = Arc::new(utf8_array(&[Some("x"), Some("y")]));
        assert!(reg.collect_from_batch(&dict_batch(dict.clone())).unwrap().is_empty());
        assert!(reg.contains(7));

        // equal content under a different handle is not a conflict
        let same = Arc::new(utf8_array(&[Some("x"), Some("y")]));
        assert!(reg.collect_from_batch(&dict_batch(same)).unwrap().is_empty());

        let other = Arc::new(utf8_array(&[Some("p"), Some("q")]));
        assert_eq!(reg.collect_from_batch(&dict_batch(other)).unwrap(), vec![7]);
    }

    #[test]
    fn test_attach_nested() {
        let dict = Arc::new(utf8_array(&[Some("x"), Some("y")]));
        let col = dictionary_array(3, int32_array(&[Some(1), Some(0)]), dict.clone(), false).unwrap();
        let data_type = col.data_type().clone();
        let bare = ArrayData::try_new(
            data_type.clone(),
            2,
            0,
            None,
            col.buffers().to_vec(),
            vec![],
        )
        .unwrap();
        let s = struct_array(vec![(Field::new("k", data_type, true), bare)], None).unwrap();
        let schema = Schema::new(vec![Field::new("s", s.data_type().clone(), true)]);
        let batch = RecordBatch::try_new(Arc::new(schema), vec![Arc::new(s)]).unwrap();

        let mut reg = DictionaryRegistry::new();
        assert!(reg.attach(&batch).is_err());
        reg.insert(3, dict.clone()).unwrap();
        let joined = reg.attach(&batch).unwrap();
        let inner = joined.column(0).child(0);
        assert!(Arc::ptr_eq(inner.dictionary().unwrap(), &dict));
    }
}
