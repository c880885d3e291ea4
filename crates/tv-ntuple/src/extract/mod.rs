//! Extraction variants: source collections → flat tables.
//!
//! Every extractor borrows the source, owns its configuration, and computes
//! its [`TableSet`] at most once; later calls to
//! [`Extractor::ensure_computed`] return the cached set.

mod angular;
mod association;
mod kinematics;
mod layers;
mod multiplicity;
mod pid;

pub use angular::{AngularConfig, AngularExtractor};
pub use association::{
    AssociationAspect, AssociationConfig, AssociationDirection, AssociationExtractor, BestMatch,
};
pub use kinematics::{KinematicsConfig, KinematicsExtractor, NamedQuantity};
pub use layers::{LayerAssignment, LayerAssignmentConfig};
pub use multiplicity::{MultiplicityConfig, MultiplicityExtractor};
pub use pid::{IdClass, PidConfig, PidExtractor, TruthSource};

use tv_core::{Error, FlatTable, Result, TableKey, TableSet};
use tv_source::JaggedCol;

/// An extraction variant with a memoized result.
pub trait Extractor {
    /// Short name, used for logging and for naming output stores.
    fn name(&self) -> &'static str;

    /// Compute the tables on first call; return the cached set afterwards.
    fn ensure_computed(&self) -> Result<&TableSet>;
}

/// Tables of `set` whose suffix equals `suffix`, re-keyed by their base key.
///
/// Turns suffixed extractor outputs (`LC_reco_photon`) into the base-keyed
/// primary map the aggregation engine expects (`LC_reco`).
pub fn project(set: &TableSet, suffix: &str) -> TableSet {
    set.iter()
        .filter(|(k, _)| k.suffix.as_deref() == Some(suffix))
        .map(|(k, t)| (TableKey::base(k.base), t.clone()))
        .collect()
}

/// Convert event-local best-match ids into global positions in a target
/// collection with per-event `target_offsets`.
///
/// `ids` is aligned with the source objects; a negative id means "no match"
/// and yields `None`. An id beyond the target event's object count is a
/// data-integrity error.
pub fn global_indices(ids: &JaggedCol, target_offsets: &[usize]) -> Result<Vec<Option<usize>>> {
    let n_target_events = target_offsets.len().saturating_sub(1);
    if ids.n_entries() != n_target_events {
        return Err(Error::shape(
            "best-match ids",
            format!("{} events vs {n_target_events} target events", ids.n_entries()),
        ));
    }
    let mut out = Vec::with_capacity(ids.n_values());
    for (event, w) in ids.offsets.windows(2).enumerate() {
        let start = target_offsets[event];
        let n = target_offsets[event + 1] - start;
        for &id in &ids.flat[w[0]..w[1]] {
            if id.is_nan() || id.fract() != 0.0 {
                return Err(Error::DataIntegrity(format!(
                    "best-match id {id} in event {event} is not an integer"
                )));
            } else if id < 0.0 {
                out.push(None);
            } else if (id as usize) < n {
                out.push(Some(start + id as usize));
            } else {
                return Err(Error::DataIntegrity(format!(
                    "best-match id {id} in event {event} exceeds the {n} target objects"
                )));
            }
        }
    }
    Ok(out)
}

/// `values[i]` for every index, NaN where the index is `None`.
pub fn gather(values: &[f64], indices: &[Option<usize>]) -> Vec<f64> {
    indices.iter().map(|i| i.map_or(f64::NAN, |i| values[i])).collect()
}

pub(crate) fn float_table(values: &[f64], absolute: bool) -> FlatTable {
    if absolute {
        FlatTable::Float(values.iter().map(|v| v.abs()).collect())
    } else {
        FlatTable::Float(values.to_vec())
    }
}
