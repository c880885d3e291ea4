//! In-memory columnar source, used for tests and for feeding synthetic data.

use std::collections::BTreeMap;

use tv_core::{Error, Result};

use crate::column::{Column, JaggedCol, NestedCol};
use crate::source::{ColumnarSource, check_field, count_events};

/// A source whose collections live in memory.
///
/// Build it with [`MemorySource::builder`]; all fields must cover the same
/// number of events.
#[derive(Debug, Clone)]
pub struct MemorySource {
    collections: BTreeMap<String, BTreeMap<String, Column>>,
    n_events: usize,
}

/// Builder for [`MemorySource`].
#[derive(Debug, Clone, Default)]
pub struct MemorySourceBuilder {
    collections: BTreeMap<String, BTreeMap<String, Column>>,
}

impl MemorySource {
    /// Start building a source.
    pub fn builder() -> MemorySourceBuilder {
        MemorySourceBuilder::default()
    }
}

impl MemorySourceBuilder {
    /// Add a field holding one value per object.
    pub fn jagged(
        mut self,
        collection: impl Into<String>,
        field: impl Into<String>,
        rows: &[Vec<f64>],
    ) -> Self {
        self.insert(collection.into(), field.into(), Column::Jagged(JaggedCol::from_rows(rows)));
        self
    }

    /// Add a field holding a sequence of values per object.
    pub fn nested(
        mut self,
        collection: impl Into<String>,
        field: impl Into<String>,
        rows: &[Vec<Vec<f64>>],
    ) -> Self {
        self.insert(collection.into(), field.into(), Column::Nested(NestedCol::from_rows(rows)));
        self
    }

    /// Add an already materialised column.
    pub fn column(
        mut self,
        collection: impl Into<String>,
        field: impl Into<String>,
        column: Column,
    ) -> Self {
        self.insert(collection.into(), field.into(), column);
        self
    }

    fn insert(&mut self, collection: String, field: String, column: Column) {
        self.collections.entry(collection).or_default().insert(field, column);
    }

    /// Validate event counts and build the source.
    pub fn build(self) -> Result<MemorySource> {
        let mut expected: Option<(String, usize)> = None;
        for (collection, fields) in &self.collections {
            for (field, column) in fields {
                let n = column.n_entries();
                match &expected {
                    None => expected = Some((format!("{collection}/{field}"), n)),
                    Some((first, m)) if *m != n => {
                        return Err(Error::shape(
                            "memory source",
                            format!("'{first}' has {m} events but '{collection}/{field}' has {n}"),
                        ));
                    }
                    Some(_) => {}
                }
            }
        }
        let mut source = MemorySource { collections: self.collections, n_events: 0 };
        source.n_events = count_events(&source)?;
        Ok(source)
    }
}

impl ColumnarSource for MemorySource {
    fn collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    fn fields(&self, collection: &str) -> Result<Vec<String>> {
        match self.collections.get(collection) {
            Some(fields) => Ok(fields.keys().cloned().collect()),
            None => Err(Error::UnknownCollection {
                name: collection.to_string(),
                available: self.collections(),
            }),
        }
    }

    fn read_column(&self, collection: &str, field: &str) -> Result<Column> {
        let fields = self.fields(collection)?;
        check_field(collection, field, &fields)?;
        Ok(self.collections[collection][field].clone())
    }

    fn n_events(&self) -> usize {
        self.n_events
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn source() -> MemorySource {
        MemorySource::builder()
            .jagged("clusters", "position_z", &[vec![320.0, 330.0], vec![], vec![340.0]])
            .jagged("clusters", "cluster_layer_id", &[vec![1.0, 2.0], vec![], vec![3.0]])
            .nested("tracksters", "vertices_x", &[vec![vec![1.0]], vec![], vec![]])
            .build()
            .unwrap()
    }

    #[test]
    fn event_count_from_representative_leaf() {
        assert_eq!(source().n_events(), 3);
    }

    #[test]
    fn unknown_names_are_reported() {
        let s = source();
        let err = s.read_column("nope", "x").unwrap_err();
        assert!(matches!(err, Error::UnknownCollection { .. }));
        let err = s.read_column("clusters", "x").unwrap_err();
        match err {
            Error::UnknownField { available, .. } => {
                assert_eq!(available, vec!["cluster_layer_id", "position_z"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn typed_reads_check_depth() {
        let s = source();
        assert!(s.read_jagged("clusters", "position_z").is_ok());
        assert!(matches!(
            s.read_nested("clusters", "position_z").unwrap_err(),
            Error::TypeMismatch(_)
        ));
        assert!(s.read_nested("tracksters", "vertices_x").is_ok());
    }

    #[test]
    fn build_rejects_inconsistent_event_counts() {
        let err = MemorySource::builder()
            .jagged("a", "x", &[vec![1.0], vec![2.0]])
            .jagged("b", "y", &[vec![1.0]])
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::ShapeMismatch { .. }));
    }
}
