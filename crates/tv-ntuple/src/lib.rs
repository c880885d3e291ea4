//! # tv-ntuple
//!
//! Turns TICL dumper collections into flat, positionally aligned tables.
//!
//! - [`layer`]: the layer-id → |z| map built from the layer clusters
//! - [`extract`]: multiplicity, kinematics and selection masks,
//!   identification scores, best-match associations, angular resolution,
//!   and layer assignment
//! - [`comparison`]: the `"abs(field) >= 2.15"` quantity grammar
//!
//! Every extractor computes once and caches; tables of one collection are
//! aligned index-for-index, so masks from one extractor can be applied to
//! tables from another.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod comparison;
pub mod config;
pub mod extract;
pub mod layer;

pub use comparison::{CmpOp, Comparison, Operand, Quantity};
pub use config::{CollectionTable, TICL_ASSOCIATIONS, TICL_CLUSTERS};
pub use extract::{
    AngularConfig, AngularExtractor, AssociationAspect, AssociationConfig, AssociationDirection,
    AssociationExtractor, BestMatch, Extractor, IdClass, KinematicsConfig, KinematicsExtractor,
    LayerAssignment, LayerAssignmentConfig, MultiplicityConfig, MultiplicityExtractor,
    NamedQuantity, PidConfig, PidExtractor, TruthSource,
};
pub use layer::{DEFAULT_MAX_LAYERS, LAYER_SENTINEL, LayerConfig, LayerMap, LayerReduction, LayerResolver};
