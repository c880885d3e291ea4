//! Histogram filling.
//!
//! Every bin is half-open `[lo, hi)` except the last, which also takes its
//! upper edge. NaN and ±inf are never counted; finite values outside the
//! edges are dropped and recorded as underflow/overflow.

use tv_core::{Error, Result};

use crate::binning::Binning;

/// Bookkeeping of one fill.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FillSummary {
    /// Values counted in a bin.
    pub entries: u64,
    /// Finite values below the first edge.
    pub underflow: u64,
    /// Finite values above the last edge.
    pub overflow: u64,
    /// NaN / ±inf values (for 2-D: pairs with either coordinate non-finite).
    pub non_finite: u64,
}

impl FillSummary {
    /// Values seen by the fill.
    pub fn total(&self) -> u64 {
        self.entries + self.underflow + self.overflow + self.non_finite
    }
}

/// A filled 1-D histogram.
#[derive(Debug, Clone, PartialEq)]
pub struct Hist1D {
    /// Bin edges.
    pub edges: Vec<f64>,
    /// Count per bin.
    pub counts: Vec<u64>,
    /// Fill bookkeeping.
    pub summary: FillSummary,
}

/// A filled 2-D histogram: rows are slice bins, columns are primary bins.
#[derive(Debug, Clone, PartialEq)]
pub struct Hist2D {
    /// Primary-axis edges.
    pub edges: Vec<f64>,
    /// Slicing-axis edges.
    pub slice_edges: Vec<f64>,
    /// `counts[slice_bin][primary_bin]`.
    pub counts: Vec<Vec<u64>>,
    /// Fill bookkeeping.
    pub summary: FillSummary,
}

enum Slot {
    Bin(usize),
    Under,
    Over,
}

/// Bin of `val` given sorted, finite edges.
fn find_bin(edges: &[f64], val: f64) -> Slot {
    let last = edges.len() - 1;
    if val < edges[0] {
        return Slot::Under;
    }
    if val > edges[last] {
        return Slot::Over;
    }
    if val == edges[last] {
        return Slot::Bin(last - 1);
    }
    // First edge strictly greater than `val`, minus one.
    match edges.partition_point(|&e| e <= val).checked_sub(1) {
        Some(i) => Slot::Bin(i),
        None => Slot::Under,
    }
}

/// Fill a 1-D histogram.
pub fn fill_1d(values: &[f64], binning: &Binning) -> Result<Hist1D> {
    let edges = binning.edges(values)?;
    let mut counts = vec![0u64; edges.len() - 1];
    let mut summary = FillSummary::default();
    for &v in values {
        if !v.is_finite() {
            summary.non_finite += 1;
            continue;
        }
        match find_bin(&edges, v) {
            Slot::Bin(i) => {
                counts[i] += 1;
                summary.entries += 1;
            }
            Slot::Under => summary.underflow += 1,
            Slot::Over => summary.overflow += 1,
        }
    }
    Ok(Hist1D { edges, counts, summary })
}

/// Fill a 1-D histogram with the values where `mask` is true.
pub fn fill_1d_masked(values: &[f64], mask: &[bool], binning: &Binning) -> Result<Hist1D> {
    if values.len() != mask.len() {
        return Err(Error::shape(
            "masked fill",
            format!("{} values vs {} mask entries", values.len(), mask.len()),
        ));
    }
    let selected: Vec<f64> = values.iter().zip(mask).filter_map(|(&v, &m)| m.then_some(v)).collect();
    fill_1d(&selected, binning)
}

/// Fill a 2-D histogram of `(primary, slice)` pairs.
///
/// Count binnings take their range from the pairs where both coordinates
/// are finite. A pair outside either axis is counted as under/overflow once,
/// with the slicing axis checked first.
pub fn fill_2d(
    primary: &[f64],
    slice: &[f64],
    primary_binning: &Binning,
    slice_binning: &Binning,
) -> Result<Hist2D> {
    if primary.len() != slice.len() {
        return Err(Error::shape(
            "2-D fill",
            format!("{} primary values vs {} slicing values", primary.len(), slice.len()),
        ));
    }
    let finite: Vec<(f64, f64)> = primary
        .iter()
        .zip(slice)
        .map(|(&x, &y)| (x, y))
        .filter(|(x, y)| x.is_finite() && y.is_finite())
        .collect();

    let xs: Vec<f64> = finite.iter().map(|p| p.0).collect();
    let ys: Vec<f64> = finite.iter().map(|p| p.1).collect();
    let edges = primary_binning.edges(&xs)?;
    let slice_edges = slice_binning.edges(&ys)?;

    let mut counts = vec![vec![0u64; edges.len() - 1]; slice_edges.len() - 1];
    let mut summary = FillSummary { non_finite: (primary.len() - finite.len()) as u64, ..Default::default() };
    for (x, y) in finite {
        match (find_bin(&slice_edges, y), find_bin(&edges, x)) {
            (Slot::Bin(row), Slot::Bin(col)) => {
                counts[row][col] += 1;
                summary.entries += 1;
            }
            (Slot::Under, _) | (Slot::Bin(_), Slot::Under) => summary.underflow += 1,
            (Slot::Over, _) | (Slot::Bin(_), Slot::Over) => summary.overflow += 1,
        }
    }
    Ok(Hist2D { edges, slice_edges, counts, summary })
}
