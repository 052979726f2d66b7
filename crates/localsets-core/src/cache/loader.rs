//! Load precedence for a single format.
//!
//! Sources are tried in order until one yields a dataset: the user cache,
//! then the bundled snapshot. A source that fails to read or parse is
//! treated as empty-handed and the next one is asked. When none has data
//! the format loads as an empty dataset.

use serde::Serialize;
use tracing::{debug, warn};

use crate::formats::Format;
use crate::models::Dataset;
use crate::store::{LocalStore, StoreResult};

/// Where a loaded dataset came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadSource {
    Cache,
    Bundled,
    Empty,
}

/// Sources consulted before falling back to an empty dataset
pub const LOAD_CHAIN: &[LoadSource] = &[LoadSource::Cache, LoadSource::Bundled];

impl LoadSource {
    fn read(self, store: &LocalStore, format: Format) -> StoreResult<Option<Dataset>> {
        match self {
            LoadSource::Cache => store.read_dataset(format),
            LoadSource::Bundled => store.read_bundled_snapshot(format),
            LoadSource::Empty => Ok(Some(Dataset::new())),
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            LoadSource::Cache => "cache",
            LoadSource::Bundled => "bundled",
            LoadSource::Empty => "empty",
        }
    }
}

/// Walk `chain` for `format`, returning the first dataset found.
pub fn load_with_chain(store: &LocalStore, format: Format, chain: &[LoadSource]) -> (Dataset, LoadSource) {
    for &source in chain {
        match source.read(store, format) {
            Ok(Some(dataset)) => {
                debug!(format = %format, source = source.label(), count = dataset.len(), "Loaded format");
                return (dataset, source);
            }
            Ok(None) => continue,
            Err(e) => {
                warn!(format = %format, source = source.label(), error = %e, "Unreadable data, trying next source");
            }
        }
    }

    warn!(format = %format, "No data available");
    (Dataset::new(), LoadSource::Empty)
}

/// Load `format` using the standard precedence.
pub fn load_format(store: &LocalStore, format: Format) -> (Dataset, LoadSource) {
    load_with_chain(store, format, LOAD_CHAIN)
}
