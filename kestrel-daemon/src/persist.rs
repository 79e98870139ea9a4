use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::StoreError;

/// A JSON array of records in one file, replaced atomically on save.
#[derive(Debug, Clone)]
pub struct JsonFile {
    path: PathBuf,
}

impl JsonFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// `favorites.json` becomes `favorites.json.<suffix>`.
    fn sibling(&self, suffix: &str) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".");
        name.push(suffix);
        self.path.with_file_name(name)
    }

    /// A missing file is an empty store.
    ///
    /// Each record is decoded on its own. Records that do not decode are
    /// skipped with a warning, after the whole file was copied to
    /// `<name>.rejected` so that the next save does not destroy them.
    pub fn load<T: DeserializeOwned>(&self) -> Result<Vec<T>, StoreError> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };
        let values: Vec<serde_json::Value> = serde_json::from_str(&content)?;
        let total = values.len();
        let records: Vec<T> = values
            .into_iter()
            .enumerate()
            .filter_map(|(index, value)| match serde_json::from_value(value) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("Skipping record {index} of {:?}: {e}", self.path);
                    None
                }
            })
            .collect();
        if records.len() < total {
            let kept = self.sibling("rejected");
            fs::copy(&self.path, &kept).map_err(|source| StoreError::Write {
                path: kept.clone(),
                source,
            })?;
            log::warn!(
                "{} unreadable records of {:?} are kept in {kept:?}",
                total - records.len(),
                self.path
            );
        }
        Ok(records)
    }

    /// Renames an unreadable file to `<name>.unreadable`.
    pub fn set_aside(&self) -> Result<PathBuf, StoreError> {
        let target = self.sibling("unreadable");
        fs::rename(&self.path, &target).map_err(|source| StoreError::Write {
            path: self.path.clone(),
            source,
        })?;
        Ok(target)
    }

    pub fn save<T: Serialize>(&self, records: &[T]) -> Result<(), StoreError> {
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }
        let content = serde_json::to_string_pretty(records)?;
        let tmp = self.sibling("tmp");
        fs::write(&tmp, content).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)
    }
}

/// Opens a store's records. If they cannot be read, the file is moved aside
/// and the store starts empty. If it cannot be moved either, the second
/// value is false and the file must not be written until a later read
/// succeeds.
pub fn open_records<T>(
    name: &str,
    load: impl FnOnce() -> Result<Vec<T>, StoreError>,
    set_aside: impl FnOnce() -> Result<PathBuf, StoreError>,
) -> (Vec<T>, bool) {
    let e = match load() {
        Ok(records) => return (records, true),
        Err(e) => e,
    };
    match set_aside() {
        Ok(target) => {
            log::warn!("Could not read {name}, moved it to {target:?} and starting empty: {e}");
            (Vec::new(), true)
        }
        Err(moved) => {
            log::error!("Could not read {name} ({e}) nor move it aside ({moved}), changes are refused until it is readable");
            (Vec::new(), false)
        }
    }
}

/// The file behind an in-memory store that is rewritten on every change.
pub struct StoreFile {
    file: Option<JsonFile>,
    readable: AtomicBool,
}

impl StoreFile {
    pub fn in_memory() -> Self {
        Self {
            file: None,
            readable: AtomicBool::new(true),
        }
    }

    pub fn open<T: DeserializeOwned>(file: JsonFile) -> (Self, Vec<T>) {
        let name = file.path().display().to_string();
        let (records, readable) = open_records(&name, || file.load(), || file.set_aside());
        let store = Self {
            file: Some(file),
            readable: AtomicBool::new(readable),
        };
        (store, records)
    }

    /// Must be called before every write. If the file could not be read at
    /// open, reads it again and returns its records, which replace the empty
    /// in-memory state.
    pub fn recover<T: DeserializeOwned>(&self) -> Result<Option<Vec<T>>, StoreError> {
        if self.readable.load(Ordering::SeqCst) {
            return Ok(None);
        }
        let Some(file) = &self.file else {
            return Ok(None);
        };
        let records = file.load()?;
        self.readable.store(true, Ordering::SeqCst);
        log::info!("{:?} is readable again, {} records recovered", file.path(), records.len());
        Ok(Some(records))
    }

    /// Writes on the blocking pool.
    pub async fn save<T>(&self, records: Vec<T>) -> Result<(), StoreError>
    where
        T: Serialize + Send + 'static,
    {
        let Some(file) = self.file.clone() else {
            return Ok(());
        };
        tokio::task::spawn_blocking(move || file.save(&records)).await?
    }
}
