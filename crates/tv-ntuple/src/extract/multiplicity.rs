use std::collections::BTreeMap;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{Category, FlatTable, Result, TableKey, TableSet};
use tv_source::ColumnarSource;

use super::Extractor;
use crate::config::CollectionTable;

/// Sub-collection field whose per-object length is the multiplicity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MultiplicityConfig {
    /// Collection names.
    pub collections: CollectionTable,
    /// Nested field per category.
    pub fields: BTreeMap<Category, String>,
}

impl MultiplicityConfig {
    /// Layer clusters per trackster, tracksters per supercluster.
    pub fn ticl_default() -> Self {
        Self {
            collections: CollectionTable::ticl_default(),
            fields: BTreeMap::from([
                (Category::Lc, "vertices_x".to_string()),
                (Category::Tracksters, "trackster_indices".to_string()),
            ]),
        }
    }
}

impl Default for MultiplicityConfig {
    fn default() -> Self {
        Self::ticl_default()
    }
}

/// Number of constituents per object, one `Int` table per base key.
pub struct MultiplicityExtractor<'a, S: ColumnarSource + ?Sized> {
    source: &'a S,
    config: MultiplicityConfig,
    tables: OnceCell<TableSet>,
}

impl<'a, S: ColumnarSource + ?Sized> MultiplicityExtractor<'a, S> {
    /// Extractor over `source`.
    pub fn new(source: &'a S, config: MultiplicityConfig) -> Self {
        Self { source, config, tables: OnceCell::new() }
    }

    fn compute(&self) -> Result<TableSet> {
        let mut out = TableSet::new();
        for key in self.config.collections.keys() {
            let Some(field) = self.config.fields.get(&key.category) else {
                log::info!("multiplicity: no field configured for {}, skipping {key}", key.category);
                continue;
            };
            let collection = self.config.collections.require(key)?;
            let nested = self.source.read_nested(collection, field)?;
            let counts = nested.lengths().into_iter().map(|n| n as i64).collect();
            log::debug!("multiplicity: {key} <- {collection}/{field} ({} objects)", nested.n_objects());
            out.insert(TableKey::base(key), FlatTable::Int(counts));
        }
        Ok(out)
    }
}

impl<S: ColumnarSource + ?Sized> Extractor for MultiplicityExtractor<'_, S> {
    fn name(&self) -> &'static str {
        "multiplicity"
    }

    fn ensure_computed(&self) -> Result<&TableSet> {
        self.tables.get_or_try_init(|| self.compute())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tv_core::{CollectionKey, Provenance};
    use tv_source::MemorySource;

    #[test]
    fn counts_constituents_per_object() {
        let src = MemorySource::builder()
            .nested("reco", "vertices_x", &[vec![vec![1.0, 2.0], vec![3.0]], vec![], vec![vec![]]])
            .build()
            .unwrap();
        let config = MultiplicityConfig {
            collections: CollectionTable::new("assoc").with(Category::Lc, Provenance::Reco, "reco"),
            ..MultiplicityConfig::ticl_default()
        };
        let ex = MultiplicityExtractor::new(&src, config);
        let set = ex.ensure_computed().unwrap();
        let key = TableKey::base(CollectionKey::new(Category::Lc, Provenance::Reco));
        assert_eq!(set.get(&key), Some(&FlatTable::Int(vec![2, 1, 0])));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn one_value_per_object_fields_are_rejected() {
        let src = MemorySource::builder().jagged("reco", "vertices_x", &[vec![1.0]]).build().unwrap();
        let config = MultiplicityConfig {
            collections: CollectionTable::new("assoc").with(Category::Lc, Provenance::Reco, "reco"),
            ..MultiplicityConfig::ticl_default()
        };
        let err = MultiplicityExtractor::new(&src, config).ensure_computed().unwrap_err();
        assert!(matches!(err, tv_core::Error::TypeMismatch(_)));
    }
}
