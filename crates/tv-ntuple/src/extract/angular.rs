use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{Category, FlatTable, Result, TableSet};
use tv_source::{ColumnarSource, JaggedCol};

use super::{AssociationDirection, AssociationExtractor, Extractor, gather, global_indices, project};
use crate::config::CollectionTable;

/// Vector components and pairs for the angular-resolution extractor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AngularConfig {
    /// Collection names.
    pub collections: CollectionTable,
    /// Pairs to compute; each needs a configured association.
    pub pairs: Vec<(Category, AssociationDirection)>,
    /// Vector component fields (x, y, z).
    pub components: [String; 3],
}

impl AngularConfig {
    /// Leading principal axis of reco objects vs. their best sim match.
    pub fn ticl_default() -> Self {
        Self {
            collections: CollectionTable::ticl_default(),
            pairs: vec![
                (Category::Lc, AssociationDirection::RecoToSim),
                (Category::Tracksters, AssociationDirection::RecoToSim),
            ],
            components: ["eVector0_x", "eVector0_y", "eVector0_z"].map(String::from),
        }
    }
}

impl Default for AngularConfig {
    fn default() -> Self {
        Self::ticl_default()
    }
}

/// Angle (radians) between each object's vector and its best match's.
///
/// Output tables are keyed `<from-key>_<direction>_angle` and aligned with
/// the objects carrying the association lists; unmatched objects and
/// zero-length vectors give NaN.
pub struct AngularExtractor<'a, 'b, S: ColumnarSource + ?Sized> {
    source: &'a S,
    association: &'b AssociationExtractor<'a, S>,
    config: AngularConfig,
    tables: OnceCell<TableSet>,
}

impl<'a, 'b, S: ColumnarSource + ?Sized> AngularExtractor<'a, 'b, S> {
    /// Extractor over `source`, reusing the best matches of `association`.
    pub fn new(source: &'a S, association: &'b AssociationExtractor<'a, S>, config: AngularConfig) -> Self {
        Self { source, association, config, tables: OnceCell::new() }
    }

    /// Angles of one direction for every category, keyed by base key.
    pub fn tables_for(&self, direction: AssociationDirection) -> Result<TableSet> {
        Ok(project(self.ensure_computed()?, &angle_suffix(direction)))
    }

    fn compute(&self) -> Result<TableSet> {
        let mut out = TableSet::new();
        for &(category, direction) in &self.config.pairs {
            let best = self.association.best_match(category, direction)?;
            let from = self.read_vectors(self.config.collections.require(best.from)?)?;
            let to = self.read_vectors(self.config.collections.require(best.to)?)?;
            best.ids.check_aligned(&from[0], &format!("{} {direction}: association vs vectors", best.from))?;

            let idx = global_indices(best.ids, &to[0].offsets)?;
            let matched: Vec<Vec<f64>> = to.iter().map(|c| gather(c.flatten(), &idx)).collect();
            let angles = opening_angles(
                [from[0].flatten(), from[1].flatten(), from[2].flatten()],
                [&matched[0], &matched[1], &matched[2]],
            );
            log::debug!("angular: {} {direction} -> {} angles", best.from, angles.len());
            out.insert(best.from.with_suffix(angle_suffix(direction)), FlatTable::Float(angles));
        }
        Ok(out)
    }

    fn read_vectors(&self, collection: &str) -> Result<[JaggedCol; 3]> {
        let [x, y, z] = &self.config.components;
        let cx = self.source.read_jagged(collection, x)?;
        let cy = self.source.read_jagged(collection, y)?;
        let cz = self.source.read_jagged(collection, z)?;
        cx.check_aligned(&cy, &format!("{collection}: {x} vs {y}"))?;
        cx.check_aligned(&cz, &format!("{collection}: {x} vs {z}"))?;
        Ok([cx, cy, cz])
    }
}

impl<S: ColumnarSource + ?Sized> Extractor for AngularExtractor<'_, '_, S> {
    fn name(&self) -> &'static str {
        "angular"
    }

    fn ensure_computed(&self) -> Result<&TableSet> {
        self.tables.get_or_try_init(|| self.compute())
    }
}

fn angle_suffix(direction: AssociationDirection) -> String {
    format!("{direction}_angle")
}

/// `acos(a·b / (|a||b|))` per row, with the cosine clamped to [-1, 1].
pub(crate) fn opening_angles(a: [&[f64]; 3], b: [&[f64]; 3]) -> Vec<f64> {
    (0..a[0].len())
        .map(|i| {
            let (ax, ay, az) = (a[0][i], a[1][i], a[2][i]);
            let (bx, by, bz) = (b[0][i], b[1][i], b[2][i]);
            let norm = (ax * ax + ay * ay + az * az).sqrt() * (bx * bx + by * by + bz * bz).sqrt();
            if norm == 0.0 || !norm.is_finite() {
                return f64::NAN;
            }
            ((ax * bx + ay * by + az * bz) / norm).clamp(-1.0, 1.0).acos()
        })
        .collect()
}
