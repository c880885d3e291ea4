//! Layer-coordinate resolver.
//!
//! Builds, once per source, the table `layer id → |z|` from the layer-cluster
//! collection. Tracksters carry no layer ids of their own, so the map is what
//! turns a trackster coordinate back into a layer.

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use tv_core::{Error, Result};
use tv_source::ColumnarSource;

use crate::config::TICL_CLUSTERS;

/// Value of a layer slot that no object populated.
pub const LAYER_SENTINEL: f64 = 9999.0;

/// Default upper bound on layer ids. HGCAL has 47 layers.
pub const DEFAULT_MAX_LAYERS: usize = 1000;

/// Per-layer reduction of the absolute coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerReduction {
    /// Smallest |z| per layer (front face of the layer).
    #[default]
    Min,
    /// Largest |z| per layer.
    Max,
}

/// Where the resolver reads coordinates and layer ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Layer-cluster collection.
    pub collection: String,
    /// Coordinate field (one value per cluster).
    pub coordinate: String,
    /// One-based layer id field, aligned with `coordinate`.
    pub layer_id: String,
    /// Reduction applied per layer.
    pub reduction: LayerReduction,
    /// Largest accepted layer id; larger ids are data-integrity errors.
    pub max_layers: usize,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            collection: TICL_CLUSTERS.to_string(),
            coordinate: "position_z".to_string(),
            layer_id: "cluster_layer_id".to_string(),
            reduction: LayerReduction::Min,
            max_layers: DEFAULT_MAX_LAYERS,
        }
    }
}

/// Index = layer id − 1, value = reduced |z| or [`LAYER_SENTINEL`].
#[derive(Debug, Clone, PartialEq)]
pub struct LayerMap {
    values: Vec<f64>,
}

impl LayerMap {
    /// Number of layers (the largest layer id seen).
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether no layer was seen at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw slots, index = layer id − 1.
    pub fn as_slice(&self) -> &[f64] {
        &self.values
    }

    /// Coordinate of a one-based layer id, `None` if out of range or unpopulated.
    pub fn coordinate(&self, layer_id: usize) -> Option<f64> {
        let v = *self.values.get(layer_id.checked_sub(1)?)?;
        (v != LAYER_SENTINEL).then_some(v)
    }

    /// Whether every layer in `1..=len` is populated.
    pub fn is_complete(&self) -> bool {
        self.values.iter().all(|&v| v != LAYER_SENTINEL)
    }

    /// One-based id of the populated layer whose coordinate is nearest to
    /// `|z|`. Ties go to the lower layer. `None` for non-finite `z` or an
    /// empty map.
    pub fn layer_of(&self, z: f64) -> Option<usize> {
        if !z.is_finite() {
            return None;
        }
        let z = z.abs();
        self.values
            .iter()
            .enumerate()
            .filter(|&(_, &v)| v != LAYER_SENTINEL)
            .min_by(|(_, a), (_, b)| (*a - z).abs().total_cmp(&(*b - z).abs()))
            .map(|(i, _)| i + 1)
    }
}

/// Lazily computes and caches the [`LayerMap`] of one source.
pub struct LayerResolver<'a, S: ColumnarSource + ?Sized> {
    source: &'a S,
    config: LayerConfig,
    map: OnceCell<LayerMap>,
}

impl<'a, S: ColumnarSource + ?Sized> LayerResolver<'a, S> {
    /// Resolver over `source` with the given field names and reduction.
    pub fn new(source: &'a S, config: LayerConfig) -> Self {
        Self { source, config, map: OnceCell::new() }
    }

    /// Configuration in use.
    pub fn config(&self) -> &LayerConfig {
        &self.config
    }

    /// The layer map, computed on first call.
    pub fn resolve(&self) -> Result<&LayerMap> {
        self.map.get_or_try_init(|| self.compute())
    }

    fn compute(&self) -> Result<LayerMap> {
        let cfg = &self.config;
        let z = self.source.read_jagged(&cfg.collection, &cfg.coordinate)?;
        let ids = self.source.read_jagged(&cfg.collection, &cfg.layer_id)?;
        z.check_aligned(&ids, &format!("{}: {} vs {}", cfg.collection, cfg.coordinate, cfg.layer_id))?;

        let layers = layer_indices(ids.flatten(), cfg.max_layers, &cfg.collection, &cfg.layer_id)?;
        let n_layers = layers.iter().copied().max().map_or(0, |m| m + 1);
        let values = reduce(z.flatten(), &layers, n_layers, cfg.reduction);

        let map = LayerMap { values };
        log::debug!(
            "layer map from '{}': {} layers, complete = {}",
            cfg.collection,
            map.len(),
            map.is_complete()
        );
        Ok(map)
    }
}

/// Convert one-based float ids into zero-based slot indices.
fn layer_indices(ids: &[f64], max_layers: usize, collection: &str, field: &str) -> Result<Vec<usize>> {
    ids.iter()
        .enumerate()
        .map(|(i, &id)| {
            if id.is_finite() && id >= 1.0 && id.fract() == 0.0 && id <= max_layers as f64 {
                Ok(id as usize - 1)
            } else {
                Err(Error::DataIntegrity(format!(
                    "'{collection}/{field}': object {i} has layer id {id}; \
                     ids must be integers in 1..={max_layers}"
                )))
            }
        })
        .collect()
}

fn reduce(z: &[f64], layers: &[usize], n_layers: usize, reduction: LayerReduction) -> Vec<f64> {
    let mut out = vec![LAYER_SENTINEL; n_layers];
    let mut seen = vec![false; n_layers];
    for (&z, &layer) in z.iter().zip(layers) {
        if z.is_nan() {
            continue;
        }
        let z = z.abs();
        let slot = &mut out[layer];
        if !seen[layer] {
            *slot = z;
            seen[layer] = true;
            continue;
        }
        *slot = match reduction {
            LayerReduction::Min => slot.min(z),
            LayerReduction::Max => slot.max(z),
        };
    }
    out
}
