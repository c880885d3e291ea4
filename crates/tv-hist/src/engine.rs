//! Aggregation engine: flat tables → histograms → store.
//!
//! The primary map holds base keys (`LC_reco`) with the quantity to
//! histogram, and optionally derived keys (`LC_reco_HD`) holding a boolean
//! mask over their base table. The slicing map holds `<base>_<slice>`
//! tables. For every primary key the engine produces:
//!
//! - `<key>`: the (masked) primary histogram;
//! - `<key>_<slice>` for every slice name: a masked 1-D histogram when the
//!   slicing table is boolean, a 2-D histogram (rows = slice bins) otherwise.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tv_core::{Error, FlatTable, Result, TableKey, TableSet};

use crate::binning::BinSpec;
use crate::filler::{FillSummary, fill_1d, fill_1d_masked, fill_2d};
use crate::record::HistogramRecord;
use crate::store::HistogramStore;

/// Slicing quantities used when none are configured.
pub const DEFAULT_SLICES: [&str; 5] = ["E", "ET", "eta", "HD", "LD"];

/// Binning and slicing configuration of one engine run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Primary-axis binning, resolved by primary key (derived keys fall back
    /// to their base key).
    pub bins: BinSpec,
    /// Slicing-axis binning, resolved by slice name.
    pub slice_bins: BinSpec,
    /// Slice names, in output order.
    pub slices: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            bins: BinSpec::default(),
            slice_bins: BinSpec::default(),
            slices: DEFAULT_SLICES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// What one engine run produced.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    /// Fill bookkeeping per histogram key.
    pub fills: BTreeMap<String, FillSummary>,
}

impl RunSummary {
    /// Number of histograms produced.
    pub fn len(&self) -> usize {
        self.fills.len()
    }

    /// Whether nothing was produced.
    pub fn is_empty(&self) -> bool {
        self.fills.is_empty()
    }
}

/// Builds histograms from table maps.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

/// Values of one primary key after masking.
struct Selection<'t> {
    values: Vec<f64>,
    mask: Option<&'t [bool]>,
}

impl Engine {
    /// Engine with a validated configuration.
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.bins.validate()?;
        config.slice_bins.validate()?;
        Ok(Self { config })
    }

    /// Configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Build every histogram without touching the store.
    pub fn build(
        &self,
        primary: &TableSet,
        slicing: &TableSet,
    ) -> Result<(BTreeMap<String, HistogramRecord>, RunSummary)> {
        let mut records = BTreeMap::new();
        let mut summary = RunSummary::default();
        for (key, table) in primary.iter() {
            let sel = select(primary, key, table)?;
            let base_name = key.base.to_string();
            let key_name = key.to_string();
            let bins = self.config.bins.resolve(&[key_name.as_str(), base_name.as_str()])?;

            let h = fill_1d(&sel.values, bins)?;
            summary.fills.insert(key_name.clone(), h.summary);
            insert_record(&mut records, key_name, h.into())?;

            for slice in &self.config.slices {
                let slice_key = TableKey::derived(key.base, slice.as_str());
                let slice_table = slicing.get(&slice_key).ok_or_else(|| Error::UnknownTable {
                    key: slice_key.to_string(),
                    available: slicing.key_names(),
                })?;
                let slice_table = match sel.mask {
                    Some(mask) => slice_table.filter(mask)?,
                    None => slice_table.clone(),
                };
                let out_key = key.sliced(slice).to_string();
                let record: HistogramRecord = match &slice_table {
                    FlatTable::Bool(m) => {
                        let h = fill_1d_masked(&sel.values, m, bins)?;
                        summary.fills.insert(out_key.clone(), h.summary);
                        h.into()
                    }
                    numeric => {
                        let slice_bins = self.config.slice_bins.resolve(&[slice.as_str()])?;
                        let h = fill_2d(&sel.values, &numeric.to_f64(), bins, slice_bins)?;
                        summary.fills.insert(out_key.clone(), h.summary);
                        h.into()
                    }
                };
                insert_record(&mut records, out_key, record)?;
            }
        }
        Ok((records, summary))
    }

    /// Build every histogram and merge them into `store` in one locked cycle.
    pub fn run(&self, primary: &TableSet, slicing: &TableSet, store: &HistogramStore) -> Result<RunSummary> {
        let (records, summary) = self.build(primary, slicing)?;
        for (key, fill) in &summary.fills {
            if fill.underflow + fill.overflow > 0 {
                log::warn!(
                    "{key}: {} values below and {} above the bin range were dropped",
                    fill.underflow,
                    fill.overflow
                );
            }
            if fill.non_finite > 0 {
                log::debug!("{key}: {} non-finite values skipped", fill.non_finite);
            }
        }
        store.merge_all(records)?;
        log::info!("{} histograms written to {}", summary.len(), store.path().display());
        Ok(summary)
    }
}

/// A boolean slice `S` of `K` and a derived primary `K_S` both write `K_S`.
/// Identical records collapse; differing ones are a configuration error.
fn insert_record(
    records: &mut BTreeMap<String, HistogramRecord>,
    key: String,
    record: HistogramRecord,
) -> Result<()> {
    match records.get(&key) {
        None => {
            records.insert(key, record);
            Ok(())
        }
        Some(existing) if *existing == record => {
            log::debug!("{key}: produced twice with identical content");
            Ok(())
        }
        Some(_) => Err(Error::Config(format!(
            "output key '{key}' is produced both by a slice and by a primary key with different \
             histograms; drop the selection or the slice, or give them the same binning"
        ))),
    }
}

/// Resolve a primary key to its values, applying the mask of a derived key.
fn select<'t>(primary: &'t TableSet, key: &TableKey, table: &'t FlatTable) -> Result<Selection<'t>> {
    if !key.is_derived() {
        return Ok(Selection { values: table.to_f64(), mask: None });
    }
    let key_name = key.to_string();
    let mask = table.as_mask(&key_name)?;
    let base = primary.require(&TableKey::base(key.base))?;
    let values = base.filter(mask).map_err(|e| match e {
        Error::ShapeMismatch { detail, .. } => Error::shape(format!("mask '{key_name}'"), detail),
        other => other,
    })?;
    Ok(Selection { values: values.to_f64(), mask: Some(mask) })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binning::Binning;
    use tv_core::{Category, CollectionKey, Provenance};

    const LC_RECO: CollectionKey = CollectionKey::new(Category::Lc, Provenance::Reco);

    fn engine(slices: &[&str]) -> Engine {
        Engine::new(EngineConfig {
            bins: BinSpec::Global(Binning::Count(2)),
            slice_bins: BinSpec::Global(Binning::Count(2)),
            slices: slices.iter().map(|s| s.to_string()).collect(),
        })
        .unwrap()
    }

    fn primary() -> TableSet {
        [
            (TableKey::base(LC_RECO), FlatTable::Int(vec![1, 2, 5, 6, 7])),
            (LC_RECO.with_suffix("HD"), FlatTable::Bool(vec![true, false, true, false, true])),
        ]
        .into_iter()
        .collect()
    }

    fn slicing() -> TableSet {
        [
            (LC_RECO.with_suffix("E"), FlatTable::Float(vec![10.0, 10.0, 20.0, 20.0, 20.0])),
            (LC_RECO.with_suffix("HD"), FlatTable::Bool(vec![true, false, true, false, true])),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn unsliced_and_sliced_keys() {
        let (records, summary) = engine(&["E", "HD"]).build(&primary(), &slicing()).unwrap();
        let keys: Vec<&str> = records.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            vec!["LC_reco", "LC_reco_E", "LC_reco_HD", "LC_reco_HD_E", "LC_reco_HD_HD"]
        );
        assert_eq!(
            records["LC_reco"],
            HistogramRecord::OneD { data: vec![2, 3], data_bin_edges: vec![1.0, 4.0, 7.0] }
        );
        assert!(records["LC_reco_E"].is_2d());
        assert_eq!(summary.len(), 5);
    }

    #[test]
    fn derived_key_is_stored_under_its_own_name() {
        let (records, _) = engine(&[]).build(&primary(), &slicing()).unwrap();
        // base[mask] = [1, 5, 7]
        assert_eq!(
            records["LC_reco_HD"],
            HistogramRecord::OneD { data: vec![1, 2], data_bin_edges: vec![1.0, 4.0, 7.0] }
        );
        assert_eq!(
            records["LC_reco"],
            HistogramRecord::OneD { data: vec![2, 3], data_bin_edges: vec![1.0, 4.0, 7.0] }
        );
    }

    #[test]
    fn colliding_output_keys_must_agree() {
        // Slice "HD" of LC_reco and the derived primary LC_reco_HD both
        // write LC_reco_HD; with shared binning they agree.
        let (records, _) = engine(&["HD"]).build(&primary(), &slicing()).unwrap();
        assert_eq!(
            records["LC_reco_HD"],
            HistogramRecord::OneD { data: vec![1, 2], data_bin_edges: vec![1.0, 4.0, 7.0] }
        );

        let engine = Engine::new(EngineConfig {
            bins: BinSpec::PerKey(BTreeMap::from([
                ("LC_reco".to_string(), Binning::Count(2)),
                ("LC_reco_HD".to_string(), Binning::Count(3)),
            ])),
            slice_bins: BinSpec::Global(Binning::Count(2)),
            slices: vec!["HD".to_string()],
        })
        .unwrap();
        let err = engine.build(&primary(), &slicing()).unwrap_err();
        assert!(matches!(err, Error::Config(_)), "{err}");
        assert!(err.to_string().contains("LC_reco_HD"), "{err}");
    }

    #[test]
    fn missing_slice_lists_available() {
        let err = engine(&["ET"]).build(&primary(), &slicing()).unwrap_err();
        match err {
            Error::UnknownTable { key, available } => {
                assert_eq!(key, "LC_reco_ET");
                assert_eq!(available, vec!["LC_reco_E", "LC_reco_HD"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn derived_key_errors() {
        let mut p = primary();
        p.insert(LC_RECO.with_suffix("E"), FlatTable::Float(vec![0.0; 5]));
        assert!(matches!(engine(&[]).build(&p, &slicing()), Err(Error::TypeMismatch(_))));

        let orphan: TableSet = [(LC_RECO.with_suffix("HD"), FlatTable::Bool(vec![true]))].into_iter().collect();
        assert!(matches!(engine(&[]).build(&orphan, &slicing()), Err(Error::UnknownTable { .. })));

        let short: TableSet = [
            (TableKey::base(LC_RECO), FlatTable::Int(vec![1, 2])),
            (LC_RECO.with_suffix("HD"), FlatTable::Bool(vec![true])),
        ]
        .into_iter()
        .collect();
        assert!(matches!(engine(&[]).build(&short, &slicing()), Err(Error::ShapeMismatch { .. })));
    }
}
