//! # tv-source
//!
//! The columnar event-source contract used by the TICL validation ntupler,
//! plus two adapters:
//!
//! - [`MemorySource`]: collections held in memory (tests, synthetic inputs).
//! - [`ParquetSource`]: a directory of Parquet files, one file per collection.
//!
//! ## Example
//!
//! ```no_run
//! use tv_source::{ColumnarSource, ParquetSource};
//!
//! let src = ParquetSource::open("ntuples/run1").unwrap();
//! for name in src.collections() {
//!     println!("{name}: {:?}", src.fields(&name).unwrap());
//! }
//! let z = src.read_jagged("ticlDumper/clusters", "position_z").unwrap();
//! println!("{} events, {} clusters", src.n_events(), z.n_values());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod column;
pub mod memory;
pub mod parquet;
pub mod source;

pub use column::{Column, JaggedCol, NestedCol};
pub use memory::{MemorySource, MemorySourceBuilder};
pub use parquet::ParquetSource;
pub use source::{ColumnarSource, count_events, representative_leaf};
