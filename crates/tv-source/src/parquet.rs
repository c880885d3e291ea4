//! Parquet-backed columnar source.
//!
//! A source is a directory; every `*.parquet` file below it is one
//! collection, named by its relative path without the extension
//! (`ticlDumper/clusters.parquet` → `ticlDumper/clusters`). Each file holds
//! one row per event. `List<numeric>` columns are jagged fields and
//! `List<List<numeric>>` columns are nested fields.

use std::collections::BTreeMap;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{Array, ArrayRef, AsArray, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Float64Type, Schema};
use arrow::record_batch::RecordBatch;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::{ArrowWriter, ProjectionMask};
use tv_core::{Error, Result};

use crate::column::{Column, JaggedCol, NestedCol};
use crate::source::{ColumnarSource, check_collection, check_field, count_events};

/// Metadata for one collection file.
#[derive(Debug, Clone)]
struct CollectionFile {
    path: PathBuf,
    /// Field name → list nesting depth.
    fields: BTreeMap<String, usize>,
    rows: usize,
}

/// A directory of Parquet files exposed as a [`ColumnarSource`].
#[derive(Debug, Clone)]
pub struct ParquetSource {
    root: PathBuf,
    collections: BTreeMap<String, CollectionFile>,
    n_events: usize,
}

impl ParquetSource {
    /// Scan `root` for collection files and count events.
    pub fn open(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();
        if !root.is_dir() {
            return Err(Error::Source(format!(
                "source directory does not exist: {}",
                root.display()
            )));
        }

        let mut collections = BTreeMap::new();
        for entry in walkdir::WalkDir::new(&root).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Source(format!("scanning {}: {e}", root.display())))?;
            let path = entry.path();
            if !entry.file_type().is_file()
                || path.extension().and_then(|e| e.to_str()) != Some("parquet")
            {
                continue;
            }
            let name = collection_name(&root, path)?;
            let file = inspect_file(path)?;
            log::debug!("found collection '{name}' ({} rows, {} fields)", file.rows, file.fields.len());
            collections.insert(name, file);
        }

        let mut rows = collections.iter().map(|(name, f)| (name, f.rows));
        if let Some((first, n)) = rows.next()
            && let Some((other, m)) = rows.find(|&(_, m)| m != n)
        {
            return Err(Error::shape(
                "parquet source",
                format!("collection '{first}' has {n} events but '{other}' has {m}"),
            ));
        }

        let mut source = Self { root, collections, n_events: 0 };
        source.n_events = count_events(&source)?;
        Ok(source)
    }

    /// Source directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write one collection file under `root`, creating directories as needed.
    ///
    /// All columns must cover the same number of events.
    pub fn write_collection(
        root: impl AsRef<Path>,
        collection: &str,
        columns: &[(&str, &Column)],
    ) -> Result<PathBuf> {
        let path = root.as_ref().join(format!("{collection}.parquet"));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut fields = Vec::with_capacity(columns.len());
        let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
        for (name, column) in columns {
            let array = column_to_array(column);
            fields.push(Field::new(*name, array.data_type().clone(), true));
            arrays.push(array);
        }
        let schema = Arc::new(Schema::new(fields));
        let batch = RecordBatch::try_new(schema.clone(), arrays).map_err(arrow_err(&path))?;

        let file = File::create(&path)?;
        let mut writer = ArrowWriter::try_new(file, schema, None).map_err(parquet_err(&path))?;
        writer.write(&batch).map_err(parquet_err(&path))?;
        writer.close().map_err(parquet_err(&path))?;
        Ok(path)
    }

    fn collection(&self, name: &str) -> Result<&CollectionFile> {
        check_collection(name, &self.collections())?;
        Ok(&self.collections[name])
    }
}

impl ColumnarSource for ParquetSource {
    fn collections(&self) -> Vec<String> {
        self.collections.keys().cloned().collect()
    }

    fn fields(&self, collection: &str) -> Result<Vec<String>> {
        Ok(self.collection(collection)?.fields.keys().cloned().collect())
    }

    fn read_column(&self, collection: &str, field: &str) -> Result<Column> {
        let file = self.collection(collection)?;
        check_field(collection, field, &self.fields(collection)?)?;
        let depth = file.fields[field];

        let path = &file.path;
        let reader = File::open(path)?;
        let builder = ParquetRecordBatchReaderBuilder::try_new(reader).map_err(parquet_err(path))?;
        let index = builder.schema().index_of(field).map_err(arrow_err(path))?;
        let mask = ProjectionMask::roots(builder.parquet_schema(), [index]);
        let batches = builder.with_projection(mask).build().map_err(parquet_err(path))?;

        let context = format!("{collection}/{field}");
        let mut jagged = Accumulator::default();
        let mut nested = Accumulator::default();
        for batch in batches {
            let batch = batch.map_err(arrow_err(path))?;
            let array = batch.column(0);
            if depth == 1 {
                jagged.append_jagged(array.as_ref(), &context)?;
            } else {
                nested.append_nested(array.as_ref(), &context)?;
            }
        }

        if depth == 1 {
            Ok(Column::Jagged(JaggedCol::try_new(jagged.flat, jagged.outer)?))
        } else {
            Ok(Column::Nested(NestedCol::try_new(nested.flat, nested.inner, nested.outer)?))
        }
    }

    fn n_events(&self) -> usize {
        self.n_events
    }
}

/// Offsets and values collected across record batches.
struct Accumulator {
    flat: Vec<f64>,
    /// Item offsets per object (nested columns only).
    inner: Vec<usize>,
    /// Per-event offsets (into `flat` for jagged, into objects for nested).
    outer: Vec<usize>,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self { flat: Vec::new(), inner: vec![0], outer: vec![0] }
    }
}

impl Accumulator {
    fn append_jagged(&mut self, array: &dyn Array, context: &str) -> Result<()> {
        let (offsets, values) = list_parts(array, context)?;
        let base = self.flat.len();
        self.flat.extend(numeric_values(&values, context)?);
        self.outer.extend(offsets.iter().skip(1).map(|o| o + base));
        Ok(())
    }

    fn append_nested(&mut self, array: &dyn Array, context: &str) -> Result<()> {
        let (object_offsets, objects) = list_parts(array, context)?;
        let (item_offsets, items) = list_parts(objects.as_ref(), context)?;
        let item_base = self.flat.len();
        let object_base = self.inner.len() - 1;
        self.flat.extend(numeric_values(&items, context)?);
        self.inner.extend(item_offsets.iter().skip(1).map(|o| o + item_base));
        self.outer.extend(object_offsets.iter().skip(1).map(|o| o + object_base));
        Ok(())
    }
}

/// Split a list array into zero-based offsets and the covered child values.
fn list_parts(array: &dyn Array, context: &str) -> Result<(Vec<usize>, ArrayRef)> {
    if let Some(list) = array.as_list_opt::<i32>() {
        Ok(rebase(list.value_offsets().iter().map(|&o| o as usize).collect(), list.values()))
    } else if let Some(list) = array.as_list_opt::<i64>() {
        Ok(rebase(list.value_offsets().iter().map(|&o| o as usize).collect(), list.values()))
    } else {
        Err(Error::TypeMismatch(format!(
            "'{context}': expected a list column, found {:?}",
            array.data_type()
        )))
    }
}

fn rebase(offsets: Vec<usize>, values: &ArrayRef) -> (Vec<usize>, ArrayRef) {
    let start = offsets.first().copied().unwrap_or(0);
    let end = offsets.last().copied().unwrap_or(start);
    let rebased = offsets.iter().map(|o| o - start).collect();
    (rebased, values.slice(start, end - start))
}

fn numeric_values(values: &ArrayRef, context: &str) -> Result<Vec<f64>> {
    let cast = arrow::compute::cast(values, &DataType::Float64).map_err(|e| {
        Error::TypeMismatch(format!("'{context}': cannot read {:?} as f64: {e}", values.data_type()))
    })?;
    Ok(cast.as_primitive::<Float64Type>().iter().map(|v| v.unwrap_or(f64::NAN)).collect())
}

fn list_depth(dt: &DataType) -> usize {
    match dt {
        DataType::List(inner) | DataType::LargeList(inner) => 1 + list_depth(inner.data_type()),
        _ => 0,
    }
}

fn inspect_file(path: &Path) -> Result<CollectionFile> {
    let reader = File::open(path)?;
    let builder = ParquetRecordBatchReaderBuilder::try_new(reader).map_err(parquet_err(path))?;
    let rows = usize::try_from(builder.metadata().file_metadata().num_rows())
        .map_err(|_| Error::Source(format!("{}: negative row count", path.display())))?;

    let mut fields = BTreeMap::new();
    for field in builder.schema().fields() {
        match list_depth(field.data_type()) {
            depth @ (1 | 2) => {
                fields.insert(field.name().clone(), depth);
            }
            _ => log::warn!(
                "{}: skipping column '{}' of type {:?} (not a per-object list)",
                path.display(),
                field.name(),
                field.data_type()
            ),
        }
    }
    Ok(CollectionFile { path: path.to_path_buf(), fields, rows })
}

fn collection_name(root: &Path, path: &Path) -> Result<String> {
    let rel = path
        .strip_prefix(root)
        .map_err(|e| Error::Source(format!("{}: {e}", path.display())))?
        .with_extension("");
    let parts: Vec<String> =
        rel.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
    Ok(parts.join("/"))
}

fn column_to_array(column: &Column) -> ArrayRef {
    match column {
        Column::Jagged(j) => {
            let mut builder = ListBuilder::new(Float64Builder::new());
            for row in 0..j.n_entries() {
                builder.values().append_slice(j.row(row));
                builder.append(true);
            }
            Arc::new(builder.finish())
        }
        Column::Nested(n) => {
            let mut builder = ListBuilder::new(ListBuilder::new(Float64Builder::new()));
            for event in 0..n.n_entries() {
                for object in n.object_offsets[event]..n.object_offsets[event + 1] {
                    builder.values().values().append_slice(n.object(object));
                    builder.values().append(true);
                }
                builder.append(true);
            }
            Arc::new(builder.finish())
        }
    }
}

fn parquet_err(path: &Path) -> impl Fn(parquet::errors::ParquetError) -> Error + '_ {
    move |e| Error::Source(format!("{}: {e}", path.display()))
}

fn arrow_err(path: &Path) -> impl Fn(arrow::error::ArrowError) -> Error + '_ {
    move |e| Error::Source(format!("{}: {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_depth_counts_nesting() {
        let f64_list = DataType::List(Arc::new(Field::new("item", DataType::Float64, true)));
        let nested = DataType::List(Arc::new(Field::new("item", f64_list.clone(), true)));
        assert_eq!(list_depth(&DataType::Float64), 0);
        assert_eq!(list_depth(&f64_list), 1);
        assert_eq!(list_depth(&nested), 2);
    }

    #[test]
    fn collection_name_uses_forward_slashes() {
        let root = Path::new("/data/run1");
        let path = root.join("ticlDumper").join("clusters.parquet");
        assert_eq!(collection_name(root, &path).unwrap(), "ticlDumper/clusters");
    }
}
