//! The columnar source contract consumed by the extraction pipeline.

use tv_core::{Error, Result};

use crate::column::{Column, JaggedCol, NestedCol};

/// A store of named collections, each holding named per-event ragged fields.
///
/// Implementations compute the event count once at construction.
pub trait ColumnarSource {
    /// Names of all collections.
    fn collections(&self) -> Vec<String>;

    /// Field names of `collection`.
    ///
    /// Fails with [`Error::UnknownCollection`] if the collection does not exist.
    fn fields(&self, collection: &str) -> Result<Vec<String>>;

    /// Materialise one field.
    ///
    /// Fails with [`Error::UnknownCollection`] or [`Error::UnknownField`].
    fn read_column(&self, collection: &str, field: &str) -> Result<Column>;

    /// Number of events.
    fn n_events(&self) -> usize;

    /// Read a field that must hold one value per object.
    fn read_jagged(&self, collection: &str, field: &str) -> Result<JaggedCol> {
        match self.read_column(collection, field)? {
            Column::Jagged(j) => Ok(j),
            Column::Nested(_) => Err(Error::TypeMismatch(format!(
                "field '{field}' of '{collection}' holds a sequence per object, expected one value"
            ))),
        }
    }

    /// Read a field that must hold a sequence of values per object.
    fn read_nested(&self, collection: &str, field: &str) -> Result<NestedCol> {
        match self.read_column(collection, field)? {
            Column::Nested(n) => Ok(n),
            Column::Jagged(_) => Err(Error::TypeMismatch(format!(
                "field '{field}' of '{collection}' holds one value per object, expected a sequence"
            ))),
        }
    }
}

/// Fail with [`Error::UnknownCollection`] unless `name` is in `available`.
pub fn check_collection(name: &str, available: &[String]) -> Result<()> {
    if available.iter().any(|c| c == name) {
        Ok(())
    } else {
        Err(Error::UnknownCollection { name: name.to_string(), available: available.to_vec() })
    }
}

/// Fail with [`Error::UnknownField`] unless `field` is in `available`.
pub fn check_field(collection: &str, field: &str, available: &[String]) -> Result<()> {
    if available.iter().any(|f| f == field) {
        Ok(())
    } else {
        Err(Error::UnknownField {
            collection: collection.to_string(),
            field: field.to_string(),
            available: available.to_vec(),
        })
    }
}

/// Pick a representative leaf name from a listing.
///
/// The first name whose cycle-stripped form (text before `;`) is contained
/// in exactly one listed name is returned; this skips prefixes such as a
/// directory entry that also appears inside its children's names. Falls back
/// to the last name, and returns `None` for an empty listing.
pub fn representative_leaf(names: &[String]) -> Option<&str> {
    for name in names {
        let stem = name.split(';').next().unwrap_or(name);
        if names.iter().filter(|other| other.contains(stem)).count() == 1 {
            return Some(name);
        }
    }
    names.last().map(String::as_str)
}

/// Count events by materialising the representative leaf field of the
/// representative leaf collection.
pub fn count_events<S: ColumnarSource + ?Sized>(source: &S) -> Result<usize> {
    let collections = source.collections();
    let Some(collection) = representative_leaf(&collections) else {
        return Ok(0);
    };
    let fields = source.fields(collection)?;
    let Some(field) = representative_leaf(&fields) else {
        return Ok(0);
    };
    log::debug!("counting events from '{collection}/{field}'");
    Ok(source.read_column(collection, field)?.n_entries())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn representative_leaf_skips_shared_prefixes() {
        let n = names(&["ticlDumper;1", "ticlDumper/clusters;1", "ticlDumper/tracksters;1"]);
        assert_eq!(representative_leaf(&n), Some("ticlDumper/clusters;1"));
    }

    #[test]
    fn representative_leaf_of_plain_names() {
        let n = names(&["raw_energy", "raw_energy_err", "vertices_x"]);
        assert_eq!(representative_leaf(&n), Some("raw_energy_err"));
        assert_eq!(representative_leaf(&[]), None);
    }

    #[test]
    fn check_helpers_enumerate_alternatives() {
        let avail = names(&["a", "b"]);
        let msg = check_collection("c", &avail).unwrap_err().to_string();
        assert!(msg.contains("\"a\"") && msg.contains("\"b\""), "{msg}");
        let msg = check_field("coll", "x", &avail).unwrap_err().to_string();
        assert!(msg.contains("'x'") && msg.contains("'coll'") && msg.contains("\"b\""), "{msg}");
    }
}
