//! # tv-hist
//!
//! Histogram aggregation for the TICL validation ntupler.
//!
//! - [`binning`]: bin counts, explicit edges and per-key bin specifications
//! - [`filler`]: 1-D, masked 1-D and 2-D filling with flow bookkeeping
//! - [`record`]: the JSON record shapes read by the renderer
//! - [`store`]: the locked merge-by-key JSON store
//! - [`engine`]: primary/slicing table maps → histograms → store
//!
//! ## Example
//!
//! ```no_run
//! use tv_core::{Category, CollectionKey, FlatTable, Provenance, TableKey, TableSet};
//! use tv_hist::{Engine, EngineConfig, HistogramStore};
//!
//! let key = CollectionKey::new(Category::Lc, Provenance::Reco);
//! let mut primary = TableSet::new();
//! primary.insert(TableKey::base(key), FlatTable::Int(vec![3, 1, 4]));
//!
//! let engine = Engine::new(EngineConfig { slices: vec![], ..EngineConfig::default() }).unwrap();
//! engine.run(&primary, &TableSet::new(), &HistogramStore::new("multiplicity_histos.json")).unwrap();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod binning;
pub mod engine;
pub mod filler;
pub mod record;
pub mod store;

pub use binning::{BinSpec, Binning, FALLBACK_KEY};
pub use engine::{DEFAULT_SLICES, Engine, EngineConfig, RunSummary};
pub use filler::{FillSummary, Hist1D, Hist2D, fill_1d, fill_1d_masked, fill_2d};
pub use record::HistogramRecord;
pub use store::HistogramStore;
