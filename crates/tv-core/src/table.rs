//! Flat (event-major, per-object) tables and keyed sets of them.

use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::keys::TableKey;

/// One flat table: the event-major concatenation of a per-object quantity.
#[derive(Debug, Clone, PartialEq)]
pub enum FlatTable {
    /// Floating-point quantity.
    Float(Vec<f64>),
    /// Integer quantity (counts, identifiers).
    Int(Vec<i64>),
    /// Selection mask.
    Bool(Vec<bool>),
}

impl FlatTable {
    /// Number of objects.
    pub fn len(&self) -> usize {
        match self {
            FlatTable::Float(v) => v.len(),
            FlatTable::Int(v) => v.len(),
            FlatTable::Bool(v) => v.len(),
        }
    }

    /// Whether the table has no objects.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this table is a selection mask.
    pub fn is_mask(&self) -> bool {
        matches!(self, FlatTable::Bool(_))
    }

    /// Short type name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            FlatTable::Float(_) => "float",
            FlatTable::Int(_) => "int",
            FlatTable::Bool(_) => "bool",
        }
    }

    /// Values as `f64` (`true` → 1.0).
    pub fn to_f64(&self) -> Vec<f64> {
        match self {
            FlatTable::Float(v) => v.clone(),
            FlatTable::Int(v) => v.iter().map(|&x| x as f64).collect(),
            FlatTable::Bool(v) => v.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
        }
    }

    /// Borrow as a mask, or fail with a type mismatch naming `what`.
    pub fn as_mask(&self, what: &str) -> Result<&[bool]> {
        match self {
            FlatTable::Bool(v) => Ok(v),
            other => Err(Error::TypeMismatch(format!(
                "'{what}' must be a boolean mask, found a {} table",
                other.kind()
            ))),
        }
    }

    /// Keep positions where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Result<FlatTable> {
        if mask.len() != self.len() {
            return Err(Error::shape(
                "mask filter",
                format!("table has {} entries, mask has {}", self.len(), mask.len()),
            ));
        }
        Ok(match self {
            FlatTable::Float(v) => FlatTable::Float(select(v, mask)),
            FlatTable::Int(v) => FlatTable::Int(select(v, mask)),
            FlatTable::Bool(v) => FlatTable::Bool(select(v, mask)),
        })
    }
}

fn select<T: Copy>(values: &[T], mask: &[bool]) -> Vec<T> {
    values.iter().zip(mask).filter_map(|(&v, &keep)| keep.then_some(v)).collect()
}

/// Ordered map of flat tables produced by one extraction.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableSet {
    tables: BTreeMap<TableKey, FlatTable>,
}

impl TableSet {
    /// Empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a table.
    pub fn insert(&mut self, key: TableKey, table: FlatTable) {
        self.tables.insert(key, table);
    }

    /// Look up a table.
    pub fn get(&self, key: &TableKey) -> Option<&FlatTable> {
        self.tables.get(key)
    }

    /// Look up a table, failing with an unknown-table error listing all keys.
    pub fn require(&self, key: &TableKey) -> Result<&FlatTable> {
        self.tables.get(key).ok_or_else(|| Error::UnknownTable {
            key: key.to_string(),
            available: self.key_names(),
        })
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &TableKey) -> bool {
        self.tables.contains_key(key)
    }

    /// Iterate in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&TableKey, &FlatTable)> {
        self.tables.iter()
    }

    /// Keys in order.
    pub fn keys(&self) -> impl Iterator<Item = &TableKey> {
        self.tables.keys()
    }

    /// Key names in order (for diagnostics).
    pub fn key_names(&self) -> Vec<String> {
        self.tables.keys().map(|k| k.to_string()).collect()
    }

    /// Number of tables.
    pub fn len(&self) -> usize {
        self.tables.len()
    }

    /// Whether the set is empty.
    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    /// Move all tables of `other` into `self` (later entries win).
    pub fn extend(&mut self, other: TableSet) {
        self.tables.extend(other.tables);
    }
}

impl FromIterator<(TableKey, FlatTable)> for TableSet {
    fn from_iter<I: IntoIterator<Item = (TableKey, FlatTable)>>(iter: I) -> Self {
        Self { tables: iter.into_iter().collect() }
    }
}

impl IntoIterator for TableSet {
    type Item = (TableKey, FlatTable);
    type IntoIter = std::collections::btree_map::IntoIter<TableKey, FlatTable>;

    fn into_iter(self) -> Self::IntoIter {
        self.tables.into_iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{Category, CollectionKey, Provenance};

    #[test]
    fn filter_keeps_true_positions() {
        let t = FlatTable::Float(vec![1.0, 2.0, 3.0, 4.0]);
        let out = t.filter(&[true, false, false, true]).unwrap();
        assert_eq!(out, FlatTable::Float(vec![1.0, 4.0]));
    }

    #[test]
    fn filter_rejects_misaligned_mask() {
        let t = FlatTable::Int(vec![1, 2, 3]);
        let err = t.filter(&[true, false]).unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }

    #[test]
    fn require_lists_available_keys() {
        let base = CollectionKey::new(Category::Lc, Provenance::Reco);
        let mut set = TableSet::new();
        set.insert(TableKey::base(base), FlatTable::Int(vec![3]));
        let err = set.require(&base.with_suffix("E")).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("LC_reco_E"));
        assert!(msg.contains("LC_reco"));
    }
}
