use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{FlatTable, Result, TableKey, TableSet};
use tv_source::ColumnarSource;

use super::Extractor;
use crate::config::CollectionTable;
use crate::layer::LayerResolver;

/// Collections and coordinate field of the layer assignment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerAssignmentConfig {
    /// Collections whose objects get a layer id, one table per base key.
    pub collections: CollectionTable,
    /// Per-object coordinate looked up in the layer map.
    pub coordinate: String,
}

impl LayerAssignmentConfig {
    /// Every TICL trackster collection, located by `barycenter_z`.
    pub fn ticl_default() -> Self {
        Self { collections: CollectionTable::ticl_default(), coordinate: "barycenter_z".to_string() }
    }
}

impl Default for LayerAssignmentConfig {
    fn default() -> Self {
        Self::ticl_default()
    }
}

/// Layer id of every object, from its coordinate and the resolved layer map.
///
/// One `Int` table per base key; `-1` where no layer can be assigned.
pub struct LayerAssignment<'a, 'b, S: ColumnarSource + ?Sized> {
    source: &'a S,
    resolver: &'b LayerResolver<'a, S>,
    config: LayerAssignmentConfig,
    tables: OnceCell<TableSet>,
}

impl<'a, 'b, S: ColumnarSource + ?Sized> LayerAssignment<'a, 'b, S> {
    /// Assignment over `source`, looking layers up in `resolver`'s map.
    pub fn new(source: &'a S, resolver: &'b LayerResolver<'a, S>, config: LayerAssignmentConfig) -> Self {
        Self { source, resolver, config, tables: OnceCell::new() }
    }

    fn compute(&self) -> Result<TableSet> {
        let map = self.resolver.resolve()?;
        let mut out = TableSet::new();
        for key in self.config.collections.keys() {
            let collection = self.config.collections.require(key)?;
            let z = self.source.read_jagged(collection, &self.config.coordinate)?;
            let ids = z
                .flatten()
                .iter()
                .map(|&z| map.layer_of(z).map_or(-1, |l| l as i64))
                .collect();
            out.insert(TableKey::base(key), FlatTable::Int(ids));
        }
        Ok(out)
    }
}

impl<S: ColumnarSource + ?Sized> Extractor for LayerAssignment<'_, '_, S> {
    fn name(&self) -> &'static str {
        "layers"
    }

    fn ensure_computed(&self) -> Result<&TableSet> {
        self.tables.get_or_try_init(|| self.compute())
    }
}
