//! Filesystem persistence for per-format data.
//!
//! Layout under the cache root:
//! - `<format>.json`: the dataset
//! - `<format>_metadata.json`: provenance for the dataset
//! - `last_update`: ISO-8601 time of the last completed refresh
//!
//! A read-only bundled snapshot with the same per-format shape may sit next
//! to the program; it is only ever read.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tempfile::NamedTempFile;
use thiserror::Error;
use tracing::{debug, warn};

use crate::formats::Format;
use crate::models::Dataset;

/// Name of the refresh timestamp file in the cache root
const LAST_UPDATE_FILE: &str = "last_update";

/// Bundled metadata lives in a sibling directory of the bundled data
const BUNDLED_METADATA_DIR: &str = "metadata";

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Corrupt data in {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to encode {path}: {source}")]
    Encode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

impl StoreError {
    fn io(path: &Path, source: io::Error) -> Self {
        StoreError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

pub struct LocalStore {
    root: PathBuf,
    bundled_dir: Option<PathBuf>,
}

impl LocalStore {
    /// Open a store rooted at `root`, creating the directory if needed.
    pub fn new(root: PathBuf) -> StoreResult<Self> {
        fs::create_dir_all(&root).map_err(|e| StoreError::io(&root, e))?;
        Ok(Self {
            root,
            bundled_dir: None,
        })
    }

    /// Attach a read-only bundled snapshot directory
    pub fn with_bundled_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bundled_dir = dir;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn bundled_dir(&self) -> Option<&Path> {
        self.bundled_dir.as_deref()
    }

    fn dataset_path(&self, format: Format) -> PathBuf {
        self.root.join(format!("{}.json", format))
    }

    fn metadata_path(&self, format: Format) -> PathBuf {
        self.root.join(format!("{}_metadata.json", format))
    }

    fn last_update_path(&self) -> PathBuf {
        self.root.join(LAST_UPDATE_FILE)
    }

    // ===== Datasets =====

    /// Read the persisted dataset for a format.
    ///
    /// Returns `Ok(None)` when nothing has been persisted and
    /// `Err(StoreError::Corrupt)` when the file exists but does not parse.
    pub fn read_dataset(&self, format: Format) -> StoreResult<Option<Dataset>> {
        read_json(&self.dataset_path(format))
    }

    /// Replace the persisted dataset for a format in full.
    pub fn write_dataset(&self, format: Format, dataset: &Dataset) -> StoreResult<()> {
        write_json_atomic(&self.dataset_path(format), dataset)?;
        debug!(format = %format, count = dataset.len(), "Wrote dataset");
        Ok(())
    }

    /// Read the bundled snapshot for a format, if one ships with the program.
    pub fn read_bundled_snapshot(&self, format: Format) -> StoreResult<Option<Dataset>> {
        match &self.bundled_dir {
            Some(dir) => read_json(&dir.join(format!("{}.json", format))),
            None => Ok(None),
        }
    }

    // ===== Metadata =====

    pub fn read_metadata(&self, format: Format) -> StoreResult<Option<Value>> {
        read_json(&self.metadata_path(format))
    }

    pub fn write_metadata(&self, format: Format, metadata: &Value) -> StoreResult<()> {
        write_json_atomic(&self.metadata_path(format), metadata)
    }

    /// Bundled metadata sits in a `metadata/` directory beside the bundled data
    pub fn read_bundled_metadata(&self, format: Format) -> StoreResult<Option<Value>> {
        let Some(dir) = &self.bundled_dir else {
            return Ok(None);
        };
        let Some(parent) = dir.parent() else {
            return Ok(None);
        };
        read_json(
            &parent
                .join(BUNDLED_METADATA_DIR)
                .join(format!("{}_metadata.json", format)),
        )
    }

    // ===== Refresh timestamp =====

    /// Time of the last completed refresh. An unreadable or unparseable
    /// timestamp is reported as absent.
    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        let path = self.last_update_path();
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Failed to read refresh timestamp");
                return None;
            }
        };

        let parsed = parse_timestamp(contents.trim());
        if parsed.is_none() {
            warn!(path = %path.display(), "Ignoring unparseable refresh timestamp");
        }
        parsed
    }

    pub fn set_last_refresh(&self, at: DateTime<Utc>) -> StoreResult<()> {
        let path = self.last_update_path();
        write_atomic(&path, at.to_rfc3339().as_bytes())
    }
}

/// Accepts RFC 3339 as well as naive ISO-8601 timestamps, which are read as
/// local time. A naive time that does not exist locally (DST gap) is read as UTC.
fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(
        naive
            .and_local_timezone(Local)
            .earliest()
            .map(|local| local.with_timezone(&Utc))
            .unwrap_or_else(|| naive.and_utc()),
    )
}

fn read_json<T: DeserializeOwned>(path: &Path) -> StoreResult<Option<T>> {
    let contents = match fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::io(path, e)),
    };

    serde_json::from_str(&contents)
        .map(Some)
        .map_err(|source| StoreError::Corrupt {
            path: path.to_path_buf(),
            source,
        })
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> StoreResult<()> {
    let contents = serde_json::to_vec_pretty(value).map_err(|source| StoreError::Encode {
        path: path.to_path_buf(),
        source,
    })?;
    write_atomic(path, &contents)
}

/// Write the whole file to a uniquely named temporary file beside the
/// target, then rename it into place so a reader never sees a partially
/// written file, even with several writers sharing the directory.
fn write_atomic(path: &Path, contents: &[u8]) -> StoreResult<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent).map_err(|e| StoreError::io(parent, e))?;

    let mut tmp = NamedTempFile::new_in(parent).map_err(|e| StoreError::io(parent, e))?;
    tmp.write_all(contents)
        .and_then(|()| tmp.as_file().sync_all())
        .map_err(|e| StoreError::io(tmp.path(), e))?;
    // On failure the temporary file is removed when dropped
    tmp.persist(path).map_err(|e| StoreError::io(path, e.error))?;
    Ok(())
}
