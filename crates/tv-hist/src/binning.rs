//! Bin specifications.
//!
//! A [`Binning`] is either a bin count (equal-width bins over the finite
//! data range, numpy `histogram` semantics) or explicit edges. A [`BinSpec`]
//! is one binning for every key, or a per-key map with the reserved key `"*"`
//! as fallback.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tv_core::{Error, Result};

/// Reserved [`BinSpec::PerKey`] entry used when no exact key matches.
pub const FALLBACK_KEY: &str = "*";

/// How one axis is discretized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Binning {
    /// `n` equal-width bins over the finite data range.
    Count(usize),
    /// Explicit ascending edges (`n + 1` edges for `n` bins).
    Edges(Vec<f64>),
}

impl Binning {
    /// Fail on zero bins or on edges that are not finite and strictly ascending.
    pub fn validate(&self, what: &str) -> Result<()> {
        match self {
            Binning::Count(0) => Err(Error::Config(format!("{what}: bin count must be at least 1"))),
            Binning::Count(_) => Ok(()),
            Binning::Edges(edges) => {
                if edges.len() < 2 {
                    return Err(Error::Config(format!(
                        "{what}: need at least 2 bin edges, got {}",
                        edges.len()
                    )));
                }
                if let Some(bad) = edges.iter().find(|e| !e.is_finite()) {
                    return Err(Error::Config(format!("{what}: bin edge {bad} is not finite")));
                }
                if let Some(i) = edges.windows(2).position(|w| w[1] <= w[0]) {
                    return Err(Error::Config(format!(
                        "{what}: bin edges must be strictly ascending ({} then {})",
                        edges[i],
                        edges[i + 1]
                    )));
                }
                Ok(())
            }
        }
    }

    /// Concrete edges for `values`.
    ///
    /// For [`Binning::Count`] the range is `[min, max]` of the finite values,
    /// widened to `[v - 0.5, v + 0.5]` when all values are equal and `[0, 1]`
    /// when there are none.
    pub fn edges(&self, values: &[f64]) -> Result<Vec<f64>> {
        self.validate("binning")?;
        match self {
            Binning::Edges(edges) => Ok(edges.clone()),
            Binning::Count(n) => {
                let (lo, hi) = finite_range(values.iter().copied()).unwrap_or((0.0, 1.0));
                let (lo, hi) = if lo == hi { (lo - 0.5, hi + 0.5) } else { (lo, hi) };
                Ok(linspace(lo, hi, *n))
            }
        }
    }
}

/// `[min, max]` of the finite values, `None` if there are none.
pub(crate) fn finite_range(values: impl Iterator<Item = f64>) -> Option<(f64, f64)> {
    values
        .filter(|v| v.is_finite())
        .fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
}

fn linspace(lo: f64, hi: f64, n: usize) -> Vec<f64> {
    let width = hi - lo;
    let mut edges: Vec<f64> = if width.is_finite() {
        let step = width / n as f64;
        (0..=n).map(|i| lo + i as f64 * step).collect()
    } else {
        // Range wider than f64: interpolate so no intermediate overflows.
        (0..=n)
            .map(|i| {
                let t = i as f64 / n as f64;
                lo * (1.0 - t) + hi * t
            })
            .collect()
    };
    edges[n] = hi;
    edges
}

/// Bin specification for one axis across many keys.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BinSpec {
    /// Same binning for every key.
    Global(Binning),
    /// Per-key binning; `"*"` is the fallback.
    PerKey(BTreeMap<String, Binning>),
}

impl BinSpec {
    /// Validate every binning.
    pub fn validate(&self) -> Result<()> {
        match self {
            BinSpec::Global(b) => b.validate("global binning"),
            BinSpec::PerKey(map) => map.iter().try_for_each(|(k, b)| b.validate(&format!("binning of '{k}'"))),
        }
    }

    /// Binning for the first of `keys` with an entry, else the fallback.
    ///
    /// Fails with a configuration error naming the keys tried.
    pub fn resolve(&self, keys: &[&str]) -> Result<&Binning> {
        match self {
            BinSpec::Global(b) => Ok(b),
            BinSpec::PerKey(map) => keys
                .iter()
                .find_map(|k| map.get(*k))
                .or_else(|| map.get(FALLBACK_KEY))
                .ok_or_else(|| {
                    Error::Config(format!(
                        "no binning for {keys:?} and no '{FALLBACK_KEY}' entry; configured keys: {:?}",
                        map.keys().collect::<Vec<_>>()
                    ))
                }),
        }
    }
}

impl Default for BinSpec {
    fn default() -> Self {
        BinSpec::Global(Binning::Count(10))
    }
}

impl From<Binning> for BinSpec {
    fn from(b: Binning) -> Self {
        BinSpec::Global(b)
    }
}
