//! Error types for the TICL validation ntupler

use thiserror::Error;

/// Validation ntupler error type
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A collection name that the source does not contain.
    #[error("collection '{name}' is unavailable in the data source; available collections: {available:?}")]
    UnknownCollection {
        /// Requested collection.
        name: String,
        /// Collections the source does contain.
        available: Vec<String>,
    },

    /// A field name that a known collection does not contain.
    #[error("field '{field}' is unavailable in collection '{collection}'; available fields: {available:?}")]
    UnknownField {
        /// Collection that was searched.
        collection: String,
        /// Requested field.
        field: String,
        /// Fields the collection does contain.
        available: Vec<String>,
    },

    /// A flat table key that was not produced by any extractor.
    #[error("table '{key}' is unavailable; available tables: {available:?}")]
    UnknownTable {
        /// Requested table key.
        key: String,
        /// Keys that are present.
        available: Vec<String>,
    },

    /// Two fields or tables that must be aligned disagree in shape.
    #[error("shape mismatch in {context}: {detail}")]
    ShapeMismatch {
        /// What was being aligned.
        context: String,
        /// Which lengths disagreed.
        detail: String,
    },

    /// Source values that violate a structural invariant (e.g. a layer id out of range).
    #[error("data integrity error: {0}")]
    DataIntegrity(String),

    /// A column was read with the wrong nesting depth or element type.
    #[error("type mismatch: {0}")]
    TypeMismatch(String),

    /// Invalid configuration (bin specification, comparison grammar, ...).
    #[error("configuration error: {0}")]
    Config(String),

    /// Failure inside a columnar source adapter.
    #[error("source error: {0}")]
    Source(String),

    /// Failure acquiring or releasing the histogram store lock.
    #[error("lock error: {0}")]
    Lock(String),
}

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Shorthand for a [`Error::ShapeMismatch`].
    pub fn shape(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Error::ShapeMismatch { context: context.into(), detail: detail.into() }
    }
}
