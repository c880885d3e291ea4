//! Persisted histogram records.

use serde::{Deserialize, Serialize};

use crate::filler::{Hist1D, Hist2D};

/// One entry of the histogram store.
///
/// 1-D: `{"data": [..], "data_bin_edges": [..]}`.
/// 2-D: `{"data": [[..], ..], "data_bin_edges": [..], "c_data_bin_edges": [..]}`
/// with one row per slicing bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HistogramRecord {
    /// Slicing-axis × primary-axis counts.
    TwoD {
        /// Row-major counts.
        data: Vec<Vec<u64>>,
        /// Primary-axis edges.
        data_bin_edges: Vec<f64>,
        /// Slicing-axis edges.
        c_data_bin_edges: Vec<f64>,
    },
    /// Counts over the primary axis.
    OneD {
        /// Counts.
        data: Vec<u64>,
        /// Edges.
        data_bin_edges: Vec<f64>,
    },
}

impl HistogramRecord {
    /// Whether this is a 2-D record.
    pub fn is_2d(&self) -> bool {
        matches!(self, HistogramRecord::TwoD { .. })
    }

    /// Sum of all counts.
    pub fn total(&self) -> u64 {
        match self {
            HistogramRecord::OneD { data, .. } => data.iter().sum(),
            HistogramRecord::TwoD { data, .. } => data.iter().flatten().sum(),
        }
    }
}

impl From<Hist1D> for HistogramRecord {
    fn from(h: Hist1D) -> Self {
        HistogramRecord::OneD { data: h.counts, data_bin_edges: h.edges }
    }
}

impl From<Hist2D> for HistogramRecord {
    fn from(h: Hist2D) -> Self {
        HistogramRecord::TwoD { data: h.counts, data_bin_edges: h.edges, c_data_bin_edges: h.slice_edges }
    }
}
