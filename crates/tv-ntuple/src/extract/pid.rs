use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{Category, CollectionKey, FlatTable, Provenance, Result, TableSet};
use tv_source::ColumnarSource;

use super::{Extractor, project};
use crate::config::CollectionTable;

/// TICL particle-type hypotheses, in probability-vector order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdClass {
    /// Index 0.
    Photon,
    /// Index 1.
    Electron,
    /// Index 2.
    Muon,
    /// Index 3, neutral pion (π⁰).
    NeutralPion,
    /// Index 4.
    ChargedHadron,
    /// Index 5.
    NeutralHadron,
    /// Index 6, no dominant hypothesis.
    Ambiguous,
    /// Index 7.
    Unknown,
}

impl IdClass {
    /// All classes in vector order.
    pub const ALL: [IdClass; 8] = [
        IdClass::Photon,
        IdClass::Electron,
        IdClass::Muon,
        IdClass::NeutralPion,
        IdClass::ChargedHadron,
        IdClass::NeutralHadron,
        IdClass::Ambiguous,
        IdClass::Unknown,
    ];

    /// Position in the probability vector.
    pub fn index(self) -> usize {
        self as usize
    }

    /// Name used as table suffix.
    pub fn as_str(self) -> &'static str {
        match self {
            IdClass::Photon => "photon",
            IdClass::Electron => "electron",
            IdClass::Muon => "muon",
            IdClass::NeutralPion => "neutral_pion",
            IdClass::ChargedHadron => "charged_hadron",
            IdClass::NeutralHadron => "neutral_hadron",
            IdClass::Ambiguous => "ambiguous",
            IdClass::Unknown => "unknown",
        }
    }
}

impl fmt::Display for IdClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Truth vector parallel to a reco probability vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TruthSource {
    /// Collection holding the truth vectors.
    pub collection: String,
    /// Nested field, same shape as the reco probabilities.
    pub field: String,
}

/// Where the identification extractor reads scores and truth labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PidConfig {
    /// Reco collection per base key; only reco keys are read.
    pub collections: CollectionTable,
    /// Reco probability-vector field.
    pub probabilities: String,
    /// Truth per category; categories without one are skipped.
    pub truth: BTreeMap<Category, TruthSource>,
    /// Classes to extract; one table per (category, class).
    pub classes: Vec<IdClass>,
}

impl PidConfig {
    /// Photon and charged-hadron scores of CLUE3D tracksters, labelled by
    /// `sim_id_probabilities` of the same collection.
    pub fn ticl_default() -> Self {
        let collections = CollectionTable::ticl_default();
        let lc_reco = collections
            .get(CollectionKey::new(Category::Lc, Provenance::Reco))
            .unwrap_or_default()
            .to_string();
        Self {
            collections,
            probabilities: "id_probabilities".to_string(),
            truth: BTreeMap::from([(
                Category::Lc,
                TruthSource { collection: lc_reco, field: "sim_id_probabilities".to_string() },
            )]),
            classes: vec![IdClass::Photon, IdClass::ChargedHadron],
        }
    }
}

impl Default for PidConfig {
    fn default() -> Self {
        Self::ticl_default()
    }
}

/// Identification score of each class, for objects whose truth label is set.
///
/// Tables are keyed `<reco-key>_<class>` (`LC_reco_photon`).
pub struct PidExtractor<'a, S: ColumnarSource + ?Sized> {
    source: &'a S,
    config: PidConfig,
    tables: OnceCell<TableSet>,
}

impl<'a, S: ColumnarSource + ?Sized> PidExtractor<'a, S> {
    /// Extractor over `source`.
    pub fn new(source: &'a S, config: PidConfig) -> Self {
        Self { source, config, tables: OnceCell::new() }
    }

    /// Scores of `class` for every category, keyed by base key.
    pub fn tables_for(&self, class: IdClass) -> Result<TableSet> {
        Ok(project(self.ensure_computed()?, class.as_str()))
    }

    fn compute(&self) -> Result<TableSet> {
        let mut out = TableSet::new();
        for category in Category::ALL {
            let key = CollectionKey::new(category, Provenance::Reco);
            let Some(collection) = self.config.collections.get(key) else {
                continue;
            };
            let Some(truth) = self.config.truth.get(&category) else {
                log::info!("pid: no truth vectors for {category}, skipping {key}");
                continue;
            };

            let probs = self.source.read_nested(collection, &self.config.probabilities)?;
            let labels = self.source.read_nested(&truth.collection, &truth.field)?;
            probs.check_aligned(
                &labels,
                &format!("{collection}/{} vs {}/{}", self.config.probabilities, truth.collection, truth.field),
            )?;

            for &class in &self.config.classes {
                let scores: Vec<f64> = probs
                    .column(class.index())
                    .into_iter()
                    .zip(labels.column(class.index()))
                    .filter_map(|(p, t)| match (p, t) {
                        (Some(p), Some(t)) if t > 0.5 => Some(p),
                        _ => None,
                    })
                    .collect();
                log::debug!("pid: {key} {class}: {} of {} objects", scores.len(), probs.n_objects());
                out.insert(key.with_suffix(class.as_str()), FlatTable::Float(scores));
            }
        }
        Ok(out)
    }
}

impl<S: ColumnarSource + ?Sized> Extractor for PidExtractor<'_, S> {
    fn name(&self) -> &'static str {
        "pid"
    }

    fn ensure_computed(&self) -> Result<&TableSet> {
        self.tables.get_or_try_init(|| self.compute())
    }
}
