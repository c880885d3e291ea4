use std::collections::BTreeMap;
use std::fmt;

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{Category, CollectionKey, Error, FlatTable, Provenance, Result, TableKey, TableSet};
use tv_source::{ColumnarSource, JaggedCol, NestedCol};

use super::{Extractor, project};
use crate::config::CollectionTable;

/// Which side of an association list the objects belong to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AssociationDirection {
    /// Reco objects, candidates are sim objects.
    #[serde(rename = "recoToSim")]
    RecoToSim,
    /// Sim objects, candidates are reco objects.
    #[serde(rename = "simToReco")]
    SimToReco,
}

impl AssociationDirection {
    /// Both directions.
    pub const ALL: [AssociationDirection; 2] =
        [AssociationDirection::RecoToSim, AssociationDirection::SimToReco];

    /// Provenance of the objects carrying the candidate lists.
    pub fn from(self) -> Provenance {
        match self {
            AssociationDirection::RecoToSim => Provenance::Reco,
            AssociationDirection::SimToReco => Provenance::Sim,
        }
    }

    /// Provenance of the candidates.
    pub fn to(self) -> Provenance {
        match self {
            AssociationDirection::RecoToSim => Provenance::Sim,
            AssociationDirection::SimToReco => Provenance::Reco,
        }
    }

    /// Name used in field and table suffixes.
    pub fn as_str(self) -> &'static str {
        match self {
            AssociationDirection::RecoToSim => "recoToSim",
            AssociationDirection::SimToReco => "simToReco",
        }
    }

    /// Key of the `aspect` table for `category`, e.g. `LC_reco_recoToSim_score`.
    pub fn table_key(self, category: Category, aspect: AssociationAspect) -> TableKey {
        CollectionKey::new(category, self.from()).with_suffix(self.table_suffix(aspect))
    }

    fn table_suffix(self, aspect: AssociationAspect) -> String {
        format!("{self}{}", aspect.field_suffix())
    }
}

impl fmt::Display for AssociationDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One of the three per-candidate quantities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AssociationAspect {
    /// Candidate index within its event.
    Id,
    /// Association score (lower is better).
    Score,
    /// Fraction of shared energy.
    SharedEnergy,
}

impl AssociationAspect {
    /// All aspects.
    pub const ALL: [AssociationAspect; 3] =
        [AssociationAspect::Id, AssociationAspect::Score, AssociationAspect::SharedEnergy];

    /// Suffix appended to the association field prefix.
    pub fn field_suffix(self) -> &'static str {
        match self {
            AssociationAspect::Id => "",
            AssociationAspect::Score => "_score",
            AssociationAspect::SharedEnergy => "_sharedE",
        }
    }
}

/// Association field prefix per (category, direction).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssociationConfig {
    /// Collection names; `associations` names the candidate-list collection.
    pub collections: CollectionTable,
    /// Field prefix per pair; the three aspect fields are `<prefix>`,
    /// `<prefix>_score` and `<prefix>_sharedE`.
    pub fields: BTreeMap<Category, BTreeMap<AssociationDirection, String>>,
    /// Per-object field of the from-collection whose event layout the
    /// candidate lists must match. Skipped when `None` or when the
    /// from-collection is not configured.
    pub alignment_field: Option<String>,
}

impl AssociationConfig {
    /// Associations written by the TICL dumper: CLUE3D tracksters against
    /// calo particles, superclusters against sim superclusters.
    pub fn ticl_default() -> Self {
        let pair = |prefix: &str, target: &str| {
            BTreeMap::from([
                (AssociationDirection::RecoToSim, format!("{prefix}_recoToSim_{target}")),
                (AssociationDirection::SimToReco, format!("{prefix}_simToReco_{target}")),
            ])
        };
        Self {
            collections: CollectionTable::ticl_default(),
            fields: BTreeMap::from([
                (Category::Lc, pair("ticlTrackstersCLUE3DHigh", "CP")),
                (Category::Tracksters, pair("ticlTrackstersSuperclustering", "SC")),
            ]),
            alignment_field: Some("raw_energy".to_string()),
        }
    }

    /// Configured pairs in canonical order.
    pub fn pairs(&self) -> impl Iterator<Item = (Category, AssociationDirection, &str)> + '_ {
        self.fields
            .iter()
            .flat_map(|(&c, dirs)| dirs.iter().map(move |(&d, prefix)| (c, d, prefix.as_str())))
    }
}

impl Default for AssociationConfig {
    fn default() -> Self {
        Self::ticl_default()
    }
}

/// Best-match ids of one (category, direction) pair, laid out per event.
#[derive(Debug, Clone, Copy)]
pub struct BestMatch<'s> {
    /// Base key of the objects carrying the candidate lists.
    pub from: CollectionKey,
    /// Base key of the candidate collection.
    pub to: CollectionKey,
    /// Event-local candidate index per object, `-1` when the list is empty.
    pub ids: &'s JaggedCol,
}

struct Computed {
    tables: TableSet,
    best: BTreeMap<(Category, AssociationDirection), (CollectionKey, JaggedCol)>,
}

/// Rank-0 association candidates, one table per (category, direction, aspect).
///
/// Tables are keyed `<from-key>_<direction><aspect-suffix>`, e.g.
/// `LC_reco_recoToSim`, `LC_reco_recoToSim_score`, `LC_sim_simToReco_sharedE`.
pub struct AssociationExtractor<'a, S: ColumnarSource + ?Sized> {
    source: &'a S,
    config: AssociationConfig,
    computed: OnceCell<Computed>,
}

impl<'a, S: ColumnarSource + ?Sized> AssociationExtractor<'a, S> {
    /// Extractor over `source`.
    pub fn new(source: &'a S, config: AssociationConfig) -> Self {
        Self { source, config, computed: OnceCell::new() }
    }

    /// Configuration in use.
    pub fn config(&self) -> &AssociationConfig {
        &self.config
    }

    /// One aspect of one direction for every category, keyed by base key.
    pub fn tables_for(&self, direction: AssociationDirection, aspect: AssociationAspect) -> Result<TableSet> {
        let set = self.ensure_computed()?;
        Ok(project(set, &direction.table_suffix(aspect)))
    }

    /// Best-match ids of a configured pair (computes on first use).
    pub fn best_match(&self, category: Category, direction: AssociationDirection) -> Result<BestMatch<'_>> {
        let computed = self.computed()?;
        let (from, ids) = computed.best.get(&(category, direction)).ok_or_else(|| {
            Error::Config(format!(
                "no association configured for {category} {direction}; configured: {:?}",
                computed.best.keys().map(|(c, d)| format!("{c} {d}")).collect::<Vec<_>>()
            ))
        })?;
        Ok(BestMatch { from: *from, to: from.counterpart(), ids })
    }

    fn computed(&self) -> Result<&Computed> {
        self.computed.get_or_try_init(|| self.compute())
    }

    fn compute(&self) -> Result<Computed> {
        let collection = self.config.collections.associations.as_str();
        let mut tables = TableSet::new();
        let mut best = BTreeMap::new();
        for (category, direction, prefix) in self.config.pairs() {
            let [id, score, shared] = AssociationAspect::ALL
                .map(|aspect| format!("{prefix}{}", aspect.field_suffix()));
            let ids = self.source.read_nested(collection, &id)?;
            let scores = self.source.read_nested(collection, &score)?;
            let shared_e = self.source.read_nested(collection, &shared)?;
            ids.check_aligned(&scores, &format!("{collection}: {id} vs {score}"))?;
            ids.check_aligned(&shared_e, &format!("{collection}: {id} vs {shared}"))?;

            let from = CollectionKey::new(category, direction.from());
            self.check_from_layout(from, &ids, &id)?;

            let best_ids = rank0_ids(&ids, collection, &id)?;
            log::debug!(
                "association: {from} {direction} <- {collection}/{prefix} ({} objects)",
                ids.n_objects()
            );

            let key = |aspect| direction.table_key(category, aspect);
            tables.insert(
                key(AssociationAspect::Id),
                FlatTable::Int(best_ids.iter().map(|&v| v as i64).collect()),
            );
            tables.insert(key(AssociationAspect::Score), FlatTable::Float(rank0(&scores)));
            tables.insert(key(AssociationAspect::SharedEnergy), FlatTable::Float(rank0(&shared_e)));

            let per_event = JaggedCol::try_new(best_ids, ids.object_offsets.clone())?;
            best.insert((category, direction), (from, per_event));
        }
        Ok(Computed { tables, best })
    }

    /// One candidate list per object of the from-collection, event by event.
    fn check_from_layout(&self, from: CollectionKey, ids: &NestedCol, id_field: &str) -> Result<()> {
        let Some(field) = self.config.alignment_field.as_deref() else {
            return Ok(());
        };
        let Some(objects) = self.config.collections.get(from) else {
            log::debug!("association: no collection for {from}, layout check skipped");
            return Ok(());
        };
        let reference = self.source.read_jagged(objects, field)?;
        ids.check_objects_aligned(
            &reference,
            &format!("{}/{id_field} vs {objects}/{field}", self.config.collections.associations),
        )
    }
}

impl<S: ColumnarSource + ?Sized> Extractor for AssociationExtractor<'_, S> {
    fn name(&self) -> &'static str {
        "association"
    }

    fn ensure_computed(&self) -> Result<&TableSet> {
        Ok(&self.computed()?.tables)
    }
}

/// First candidate of every object, NaN for empty candidate lists.
fn rank0(col: &NestedCol) -> Vec<f64> {
    col.column(0).into_iter().map(|v| v.unwrap_or(f64::NAN)).collect()
}

/// First candidate index of every object, `-1` for empty lists.
fn rank0_ids(col: &NestedCol, collection: &str, field: &str) -> Result<Vec<f64>> {
    col.column(0)
        .into_iter()
        .enumerate()
        .map(|(i, v)| match v {
            None => Ok(-1.0),
            Some(id) if id.is_finite() && id >= 0.0 && id.fract() == 0.0 => Ok(id),
            Some(id) => Err(Error::DataIntegrity(format!(
                "'{collection}/{field}': object {i} has best-match id {id}"
            ))),
        })
        .collect()
}
