//! Merge-by-key JSON histogram store.
//!
//! The store is one JSON object mapping histogram keys to records. Writers
//! hold an exclusive lock on a sidecar `<store>.lock` file for the whole
//! read-modify-write cycle and replace the document atomically (temporary
//! file in the same directory, then rename). Entries this process did not
//! write are kept verbatim.

use std::fs::{File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use serde::Serialize;
use serde_json::{Map, Value};
use tv_core::{Error, Result};

use crate::record::HistogramRecord;

/// Histogram store backed by a JSON file.
#[derive(Debug, Clone)]
pub struct HistogramStore {
    path: PathBuf,
}

impl HistogramStore {
    /// Store at `path`; the file is created on first merge.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Sidecar lock file path (`<store>.lock`).
    pub fn lock_path(&self) -> PathBuf {
        let mut name = self.path.as_os_str().to_os_string();
        name.push(".lock");
        PathBuf::from(name)
    }

    /// Current document; empty when the store does not exist yet.
    pub fn load(&self) -> Result<Map<String, Value>> {
        let file = match File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Map::new()),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_reader(BufReader::new(file))? {
            Value::Object(map) => Ok(map),
            other => Err(Error::DataIntegrity(format!(
                "{}: histogram store must be a JSON object, found {}",
                self.path.display(),
                json_kind(&other)
            ))),
        }
    }

    /// One record, `None` if the key is absent.
    pub fn get(&self, key: &str) -> Result<Option<HistogramRecord>> {
        match self.load()?.remove(key) {
            Some(v) => Ok(Some(serde_json::from_value(v)?)),
            None => Ok(None),
        }
    }

    /// Set or overwrite one key.
    pub fn merge(&self, key: &str, record: &HistogramRecord) -> Result<()> {
        self.merge_all([(key.to_string(), record.clone())])
    }

    /// Set or overwrite every key of `entries` in one locked cycle.
    pub fn merge_all<I>(&self, entries: I) -> Result<()>
    where
        I: IntoIterator<Item = (String, HistogramRecord)>,
    {
        if let Some(dir) = self.path.parent()
            && !dir.as_os_str().is_empty()
        {
            std::fs::create_dir_all(dir)?;
        }
        let _lock = StoreLock::acquire(&self.lock_path())?;

        let mut doc = self.load()?;
        let mut n = 0usize;
        for (key, record) in entries {
            doc.insert(key, serde_json::to_value(&record)?);
            n += 1;
        }
        self.write_atomic(&doc)?;
        log::debug!("merged {n} histograms into {} ({} total)", self.path.display(), doc.len());
        Ok(())
    }

    fn write_atomic(&self, doc: &Map<String, Value>) -> Result<()> {
        let dir = match self.path.parent() {
            Some(d) if !d.as_os_str().is_empty() => d,
            _ => Path::new("."),
        };
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        {
            let mut writer = BufWriter::new(tmp.as_file_mut());
            let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
            let mut ser = serde_json::Serializer::with_formatter(&mut writer, formatter);
            doc.serialize(&mut ser)?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| Error::Io(e.error))?;
        Ok(())
    }
}

fn json_kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Exclusive advisory lock on the sidecar file, released on drop.
struct StoreLock {
    file: File,
}

impl StoreLock {
    /// Blocks until the lock is free; there is no timeout.
    fn acquire(path: &Path) -> Result<Self> {
        let file = OpenOptions::new().read(true).write(true).create(true).truncate(false).open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => return Ok(Self { file }),
            Err(e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                log::info!("waiting for lock on {}", path.display());
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => {}
            Err(e) => return Err(Error::Lock(format!("{}: {e}", path.display()))),
        }
        loop {
            match file.lock_exclusive() {
                Ok(()) => return Ok(Self { file }),
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(Error::Lock(format!("{}: {e}", path.display()))),
            }
        }
    }
}

impl Drop for StoreLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.file);
    }
}
