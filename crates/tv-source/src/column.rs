//! Event-indexed ragged columns.
//!
//! Both column types keep all values in one flat buffer plus offset tables,
//! so flattening is free and per-object operations are bulk passes over the
//! buffers rather than per-event loops.

use tv_core::{Error, Result};

/// A jagged (variable-length) column: flat values + per-event offsets.
///
/// `offsets` has length `n_entries + 1`. Entry `i` has values
/// `flat[offsets[i]..offsets[i+1]]`.
#[derive(Debug, Clone, PartialEq)]
pub struct JaggedCol {
    /// Flat array of all values across all entries.
    pub flat: Vec<f64>,
    /// Entry boundaries: `offsets.len() == n_entries + 1`.
    pub offsets: Vec<usize>,
}

impl JaggedCol {
    /// Build from flat values and offsets, validating the offset table.
    pub fn try_new(flat: Vec<f64>, offsets: Vec<usize>) -> Result<Self> {
        validate_offsets(&offsets, flat.len(), "jagged column")?;
        Ok(Self { flat, offsets })
    }

    /// Build from per-event rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[R]) -> Self {
        let mut flat = Vec::new();
        let mut offsets = Vec::with_capacity(rows.len() + 1);
        offsets.push(0);
        for row in rows {
            flat.extend_from_slice(row.as_ref());
            offsets.push(flat.len());
        }
        Self { flat, offsets }
    }

    /// Values of one entry.
    pub fn row(&self, row: usize) -> &[f64] {
        &self.flat[self.offsets[row]..self.offsets[row + 1]]
    }

    /// Number of entries.
    pub fn n_entries(&self) -> usize {
        self.offsets.len().saturating_sub(1)
    }

    /// Total number of values.
    pub fn n_values(&self) -> usize {
        self.flat.len()
    }

    /// Per-entry lengths.
    pub fn counts(&self) -> Vec<usize> {
        self.offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Event-major flat table (all entries concatenated in order).
    pub fn flatten(&self) -> &[f64] {
        &self.flat
    }

    /// Fail unless `other` has identical per-entry lengths.
    pub fn check_aligned(&self, other: &JaggedCol, context: &str) -> Result<()> {
        check_offsets(&self.offsets, &other.offsets, context)
    }
}

/// A doubly nested column: event × object × item.
///
/// `object_offsets` (length `n_entries + 1`) splits objects into events;
/// `item_offsets` (length `n_objects + 1`) splits `flat` into objects.
#[derive(Debug, Clone, PartialEq)]
pub struct NestedCol {
    /// Flat array of all items of all objects of all entries.
    pub flat: Vec<f64>,
    /// Object boundaries into `flat`.
    pub item_offsets: Vec<usize>,
    /// Entry boundaries into the object list.
    pub object_offsets: Vec<usize>,
}

impl NestedCol {
    /// Build from flat values and both offset tables, validating them.
    pub fn try_new(
        flat: Vec<f64>,
        item_offsets: Vec<usize>,
        object_offsets: Vec<usize>,
    ) -> Result<Self> {
        validate_offsets(&item_offsets, flat.len(), "nested column items")?;
        validate_offsets(&object_offsets, item_offsets.len() - 1, "nested column objects")?;
        Ok(Self { flat, item_offsets, object_offsets })
    }

    /// Build from per-event, per-object rows.
    pub fn from_rows<R: AsRef<[f64]>>(rows: &[Vec<R>]) -> Self {
        let mut flat = Vec::new();
        let mut item_offsets = vec![0];
        let mut object_offsets = Vec::with_capacity(rows.len() + 1);
        object_offsets.push(0);
        for event in rows {
            for object in event {
                flat.extend_from_slice(object.as_ref());
                item_offsets.push(flat.len());
            }
            object_offsets.push(item_offsets.len() - 1);
        }
        Self { flat, item_offsets, object_offsets }
    }

    /// Number of entries (events).
    pub fn n_entries(&self) -> usize {
        self.object_offsets.len().saturating_sub(1)
    }

    /// Total number of objects across all entries.
    pub fn n_objects(&self) -> usize {
        self.item_offsets.len().saturating_sub(1)
    }

    /// Items of one object (global object index).
    pub fn object(&self, object: usize) -> &[f64] {
        &self.flat[self.item_offsets[object]..self.item_offsets[object + 1]]
    }

    /// Number of items per object, event-major.
    pub fn lengths(&self) -> Vec<usize> {
        self.item_offsets.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Item `index` of every object, event-major; `None` where an object has
    /// fewer than `index + 1` items.
    pub fn column(&self, index: usize) -> Vec<Option<f64>> {
        self.item_offsets
            .windows(2)
            .map(|w| (w[0] + index < w[1]).then(|| self.flat[w[0] + index]))
            .collect()
    }

    /// Fail unless `other` has the same events, objects and items per object.
    pub fn check_aligned(&self, other: &NestedCol, context: &str) -> Result<()> {
        check_offsets(&self.object_offsets, &other.object_offsets, context)?;
        check_offsets(&self.item_offsets, &other.item_offsets, context)
    }

    /// Fail unless the per-event object counts match a jagged column.
    pub fn check_objects_aligned(&self, other: &JaggedCol, context: &str) -> Result<()> {
        check_offsets(&self.object_offsets, &other.offsets, context)
    }
}

/// A column as materialised by a source.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    /// One value per object.
    Jagged(JaggedCol),
    /// A sequence of values per object.
    Nested(NestedCol),
}

impl Column {
    /// Number of entries (events).
    pub fn n_entries(&self) -> usize {
        match self {
            Column::Jagged(j) => j.n_entries(),
            Column::Nested(n) => n.n_entries(),
        }
    }
}

fn validate_offsets(offsets: &[usize], n_values: usize, what: &str) -> Result<()> {
    let Some(&first) = offsets.first() else {
        return Err(Error::DataIntegrity(format!("{what}: empty offset table")));
    };
    if first != 0 {
        return Err(Error::DataIntegrity(format!("{what}: offsets start at {first}, not 0")));
    }
    if offsets.windows(2).any(|w| w[1] < w[0]) {
        return Err(Error::DataIntegrity(format!("{what}: offsets are not monotone")));
    }
    let last = offsets[offsets.len() - 1];
    if last != n_values {
        return Err(Error::DataIntegrity(format!(
            "{what}: offsets end at {last}, but {n_values} values are present"
        )));
    }
    Ok(())
}

fn check_offsets(a: &[usize], b: &[usize], context: &str) -> Result<()> {
    if a.len() != b.len() {
        return Err(Error::shape(
            context,
            format!("{} entries vs {} entries", a.len().saturating_sub(1), b.len().saturating_sub(1)),
        ));
    }
    if let Some(i) = a.windows(2).zip(b.windows(2)).position(|(x, y)| x[1] - x[0] != y[1] - y[0]) {
        return Err(Error::shape(
            context,
            format!(
                "entry {i} has {} elements vs {} elements",
                a[i + 1] - a[i],
                b[i + 1] - b[i]
            ),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jagged_from_rows_flattens_event_major() {
        let j = JaggedCol::from_rows(&[vec![1.0, 2.0], vec![], vec![5.0, 6.0, 7.0]]);
        assert_eq!(j.flatten(), &[1.0, 2.0, 5.0, 6.0, 7.0]);
        assert_eq!(j.offsets, vec![0, 2, 2, 5]);
        assert_eq!(j.counts(), vec![2, 0, 3]);
        assert_eq!(j.row(2), &[5.0, 6.0, 7.0]);
        assert!(j.row(1).is_empty());
    }

    #[test]
    fn jagged_try_new_validates() {
        assert!(JaggedCol::try_new(vec![1.0], vec![0, 2]).is_err());
        assert!(JaggedCol::try_new(vec![1.0, 2.0], vec![0, 2, 1, 2]).is_err());
        assert!(JaggedCol::try_new(vec![1.0, 2.0], vec![1, 2]).is_err());
        assert!(JaggedCol::try_new(vec![1.0, 2.0], vec![0, 1, 2]).is_ok());
    }

    #[test]
    fn nested_lengths_and_columns() {
        let n = NestedCol::from_rows(&[
            vec![vec![1.0, 2.0, 3.0], vec![]],
            vec![],
            vec![vec![4.0], vec![5.0, 6.0]],
        ]);
        assert_eq!(n.n_entries(), 3);
        assert_eq!(n.n_objects(), 4);
        assert_eq!(n.lengths(), vec![3, 0, 1, 2]);
        assert_eq!(n.object_offsets, vec![0, 2, 2, 4]);
        assert_eq!(n.column(0), vec![Some(1.0), None, Some(4.0), Some(5.0)]);
        assert_eq!(n.column(1), vec![Some(2.0), None, None, Some(6.0)]);
        assert_eq!(n.object(3), &[5.0, 6.0]);
    }

    #[test]
    fn nested_objects_align_with_jagged_entries() {
        let n = NestedCol::from_rows(&[vec![vec![1.0, 2.0], vec![]], vec![vec![3.0]]]);
        let same = JaggedCol::from_rows(&[vec![0.0, 0.0], vec![0.0]]);
        assert!(n.check_objects_aligned(&same, "test").is_ok());
        let moved = JaggedCol::from_rows(&[vec![0.0], vec![0.0, 0.0]]);
        let err = n.check_objects_aligned(&moved, "test").unwrap_err().to_string();
        assert!(err.contains("entry 0"), "{err}");
    }

    #[test]
    fn alignment_checks_report_first_bad_entry() {
        let a = JaggedCol::from_rows(&[vec![1.0], vec![2.0, 3.0]]);
        let b = JaggedCol::from_rows(&[vec![1.0], vec![2.0]]);
        let err = a.check_aligned(&b, "test").unwrap_err().to_string();
        assert!(err.contains("entry 1"), "{err}");

        let c = JaggedCol::from_rows(&[vec![1.0]]);
        assert!(a.check_aligned(&c, "test").is_err());
        assert!(a.check_aligned(&a.clone(), "test").is_ok());
    }
}
