//! Collection naming shared by all extractors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tv_core::{CollectionKey, Category, Error, Provenance, Result};

/// Default name of the collection holding reco ↔ sim association lists.
pub const TICL_ASSOCIATIONS: &str = "ticlDumper/associations";

/// Default name of the layer-cluster collection.
pub const TICL_CLUSTERS: &str = "ticlDumper/clusters";

/// Maps each base key to the source collection holding its objects.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionTable {
    /// Base key → collection name.
    pub collections: BTreeMap<CollectionKey, String>,
    /// Collection holding the association candidate lists.
    pub associations: String,
}

impl CollectionTable {
    /// An empty table (no collections configured).
    pub fn new(associations: impl Into<String>) -> Self {
        Self { collections: BTreeMap::new(), associations: associations.into() }
    }

    /// The collection names written by the TICL dumper.
    pub fn ticl_default() -> Self {
        Self::new(TICL_ASSOCIATIONS)
            .with(Category::Lc, Provenance::Reco, "ticlDumper/trackstersCLUE3DHigh")
            .with(Category::Lc, Provenance::Sim, "ticlDumper/simtrackstersCP")
            .with(Category::Tracksters, Provenance::Reco, "ticlDumper/trackstersSuperclustering")
            .with(Category::Tracksters, Provenance::Sim, "ticlDumper/simtrackstersSC")
    }

    /// Set the collection for one base key.
    pub fn with(mut self, category: Category, provenance: Provenance, name: impl Into<String>) -> Self {
        self.collections.insert(CollectionKey::new(category, provenance), name.into());
        self
    }

    /// Collection name for `key`, if configured.
    pub fn get(&self, key: CollectionKey) -> Option<&str> {
        self.collections.get(&key).map(String::as_str)
    }

    /// Collection name for `key`, or a configuration error.
    pub fn require(&self, key: CollectionKey) -> Result<&str> {
        self.get(key).ok_or_else(|| {
            Error::Config(format!(
                "no collection configured for '{key}'; configured keys: {:?}",
                self.collections.keys().map(|k| k.to_string()).collect::<Vec<_>>()
            ))
        })
    }

    /// Configured base keys in canonical order.
    pub fn keys(&self) -> impl Iterator<Item = CollectionKey> + '_ {
        self.collections.keys().copied()
    }
}

impl Default for CollectionTable {
    fn default() -> Self {
        Self::ticl_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_table_covers_all_base_keys() {
        let t = CollectionTable::ticl_default();
        let keys: Vec<CollectionKey> = t.keys().collect();
        assert_eq!(keys, CollectionKey::all().collect::<Vec<_>>());
        assert_eq!(
            t.require(CollectionKey::new(Category::Lc, Provenance::Sim)).unwrap(),
            "ticlDumper/simtrackstersCP"
        );
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let t = CollectionTable::new(TICL_ASSOCIATIONS).with(Category::Lc, Provenance::Reco, "x");
        let err = t.require(CollectionKey::new(Category::Tracksters, Provenance::Sim)).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(err.to_string().contains("LC_reco"));
    }

    #[test]
    fn deserialize_overrides() {
        let json = r#"{"collections": {"LC_reco": "a", "LC_sim": "b"}, "associations": "assoc"}"#;
        let t: CollectionTable = serde_json::from_str(json).unwrap();
        assert_eq!(t.keys().count(), 2);
        assert_eq!(t.associations, "assoc");
    }
}
