//! # tv-core
//!
//! Shared types for the TICL validation ntupler: the error enum, typed
//! collection / table keys and the flat tables passed between extraction and
//! aggregation.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod keys;
pub mod table;

pub use error::{Error, Result};
pub use keys::{Category, CollectionKey, Provenance, TableKey};
pub use table::{FlatTable, TableSet};
