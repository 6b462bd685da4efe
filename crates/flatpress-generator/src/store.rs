//! JSON record storage.
//!
//! Reads never fail loudly: a missing or malformed file is simply absent.
//! Writes go to a sibling temporary file that is renamed over the
//! destination, so readers never observe a partially written record.

use std::{
    fs,
    io::{self, Write},
    path::{Path, PathBuf},
};

use flatpress_core::{Record, Value, content::RECORD_EXTENSION};
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

/// Store errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Writing or renaming failed.
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    /// The record could not be serialized.
    #[error("failed to serialize {path}: {source}")]
    Serialize {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The destination has no parent directory.
    #[error("invalid record path: {0}")]
    InvalidPath(PathBuf),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Flat-file JSON record store.
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentStore;

impl ContentStore {
    /// Create a store.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Load a record. Missing files, unreadable files, malformed JSON and
    /// non-object documents all yield `None`.
    pub fn load(&self, path: &Path) -> Option<Record> {
        let source = match fs::read_to_string(path) {
            Ok(source) => source,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "record not found");
                return None;
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to read record");
                return None;
            }
        };

        match serde_json::from_str::<serde_json::Value>(&source).map(Value::from) {
            Ok(Value::Record(record)) => Some(record),
            Ok(other) => {
                warn!(
                    path = %path.display(),
                    found = other.kind_name(),
                    "record is not a JSON object"
                );
                None
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "malformed record");
                None
            }
        }
    }

    /// Save a record atomically with deterministic pretty formatting.
    pub fn save(&self, path: &Path, record: &Record) -> Result<()> {
        let dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| StoreError::InvalidPath(path.to_path_buf()))?;

        let mut json = serde_json::to_string_pretty(record).map_err(|source| {
            StoreError::Serialize {
                path: path.to_path_buf(),
                source,
            }
        })?;
        json.push('\n');

        let write_err = |source| StoreError::Write {
            path: path.to_path_buf(),
            source,
        };

        fs::create_dir_all(dir).map_err(write_err)?;
        let mut temp = NamedTempFile::new_in(dir).map_err(write_err)?;
        temp.write_all(json.as_bytes()).map_err(write_err)?;
        temp.flush().map_err(write_err)?;

        // A failed persist hands the temp file back; dropping it removes it.
        temp.persist(path).map_err(|e| write_err(e.error))?;

        debug!(path = %path.display(), "saved record");
        Ok(())
    }

    /// Record files directly inside `dir`, sorted by name. Hidden files are
    /// ignored; a missing directory yields an empty list.
    pub fn list(&self, dir: &Path) -> Vec<PathBuf> {
        let mut files: Vec<_> = read_dir_entries(dir)
            .into_iter()
            .filter(|path| path.is_file())
            .filter(|path| {
                path.extension()
                    .is_some_and(|ext| ext == RECORD_EXTENSION)
            })
            .collect();
        files.sort();
        files
    }

    /// Names of the sub-directories of `dir`, sorted.
    pub fn list_dirs(&self, dir: &Path) -> Vec<String> {
        let mut names: Vec<_> = read_dir_entries(dir)
            .into_iter()
            .filter(|path| path.is_dir())
            .filter_map(|path| {
                path.file_name()
                    .map(|name| name.to_string_lossy().into_owned())
            })
            .collect();
        names.sort();
        names
    }
}

fn read_dir_entries(dir: &Path) -> Vec<PathBuf> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            if e.kind() != io::ErrorKind::NotFound {
                warn!(dir = %dir.display(), error = %e, "failed to list directory");
            }
            return Vec::new();
        }
    };

    entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            !path
                .file_name()
                .is_some_and(|n| n.to_string_lossy().starts_with('.'))
        })
        .collect()
}
