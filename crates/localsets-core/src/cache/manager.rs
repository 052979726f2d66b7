use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use super::loader::{load_format, LoadSource};
use crate::formats::{Format, FormatInfo, Source, PREFERRED_FORMATS};
use crate::models::{Dataset, Record, UsageStats};
use crate::remote::RemoteFetcher;
use crate::store::LocalStore;
use crate::sync::{SyncEngine, SyncReport};

/// Refresh automatically once the last refresh is older than this.
/// The upstream repositories regenerate their data about once a day.
const STALE_AFTER_HOURS: i64 = 24;

/// Settings for one [`DataCache`] instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    pub cache_dir: PathBuf,
    pub bundled_dir: Option<PathBuf>,
    pub formats: Vec<Format>,
    pub auto_refresh: bool,
}

impl CacheConfig {
    /// Every random battle format, auto-refresh on, no bundled snapshot
    pub fn new(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            bundled_dir: None,
            formats: Source::RandBats.formats().to_vec(),
            auto_refresh: true,
        }
    }

    pub fn with_formats(mut self, formats: impl IntoIterator<Item = Format>) -> Self {
        self.formats = formats.into_iter().collect();
        self
    }

    pub fn with_bundled_dir(mut self, dir: Option<PathBuf>) -> Self {
        self.bundled_dir = dir;
        self
    }

    pub fn with_auto_refresh(mut self, enabled: bool) -> Self {
        self.auto_refresh = enabled;
        self
    }
}

/// Whether data last refreshed at `last` needs refreshing at `now`.
/// Never having refreshed counts as stale.
pub fn is_stale(last: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    match last {
        Some(last) => now - last >= Duration::hours(STALE_AFTER_HOURS),
        None => true,
    }
}

struct LoadedFormat {
    format: Format,
    dataset: Arc<Dataset>,
    source: LoadSource,
}

/// In-memory view over the cached set data for a group of formats.
///
/// Datasets are immutable once loaded; a refresh swaps in a new `Arc` so
/// readers never observe a half-replaced dataset.
pub struct DataCache {
    store: Arc<LocalStore>,
    sync: SyncEngine,
    formats: Vec<Format>,
    loaded: RwLock<Vec<LoadedFormat>>,
}

impl DataCache {
    /// Open the cache: load the configured formats, then refresh them if
    /// auto-refresh is on and the data is stale.
    pub async fn open(config: CacheConfig, fetcher: Arc<dyn RemoteFetcher>) -> Result<Self> {
        let store = LocalStore::new(config.cache_dir.clone())
            .with_context(|| format!("Failed to open cache at {}", config.cache_dir.display()))?
            .with_bundled_dir(config.bundled_dir.clone());
        let store = Arc::new(store);

        let cache = Self {
            sync: SyncEngine::new(fetcher, Arc::clone(&store)),
            store,
            formats: config.formats.clone(),
            loaded: RwLock::new(Vec::new()),
        };
        cache.initialize(&config.formats);

        if config.auto_refresh {
            cache.refresh_if_stale().await;
        }
        Ok(cache)
    }

    /// Load every format in `formats` that is not loaded yet.
    pub fn initialize(&self, formats: &[Format]) {
        for &format in formats {
            if self.is_loaded(format) {
                continue;
            }
            let (dataset, source) = load_format(&self.store, format);
            let mut loaded = self.write();
            // Another caller may have loaded it meanwhile
            if !loaded.iter().any(|l| l.format == format) {
                loaded.push(LoadedFormat {
                    format,
                    dataset: Arc::new(dataset),
                    source,
                });
            }
        }
    }

    /// Refresh the configured formats when the last refresh is too old.
    pub async fn refresh_if_stale(&self) -> Option<SyncReport> {
        let last = self.store.last_refresh();
        if !is_stale(last, Utc::now()) {
            debug!(last_refresh = ?last, "Data is fresh, skipping refresh");
            return None;
        }
        info!(last_refresh = ?last, "Data is stale, refreshing");
        Some(self.run_refresh(&self.formats, false).await)
    }

    /// Refresh `formats` (all loaded formats when `None`) and reload the ones
    /// that changed.
    pub async fn refresh(&self, formats: Option<&[Format]>) -> SyncReport {
        let formats = self.refresh_targets(formats);
        self.run_refresh(&formats, false).await
    }

    /// Like [`refresh`](Self::refresh) but rewrites every fetched format,
    /// even when its data did not change.
    pub async fn force_refresh(&self, formats: Option<&[Format]>) -> SyncReport {
        let formats = self.refresh_targets(formats);
        self.run_refresh(&formats, true).await
    }

    fn refresh_targets(&self, formats: Option<&[Format]>) -> Vec<Format> {
        match formats {
            Some(formats) => formats.to_vec(),
            None => self.list_formats(),
        }
    }

    async fn run_refresh(&self, formats: &[Format], force: bool) -> SyncReport {
        let report = self.sync.refresh(formats, force).await;
        let updated = report.updated();
        for format in updated.iter().copied().filter(|f| self.is_loaded(*f)) {
            self.reload(format);
        }
        info!(updated = updated.len(), "Updated formats");
        report
    }

    /// Re-read a format through the load chain and swap it in
    fn reload(&self, format: Format) {
        let (dataset, source) = load_format(&self.store, format);
        let mut loaded = self.write();
        if let Some(entry) = loaded.iter_mut().find(|l| l.format == format) {
            entry.dataset = Arc::new(dataset);
            entry.source = source;
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<LoadedFormat>> {
        self.loaded.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<LoadedFormat>> {
        self.loaded.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// The dataset currently loaded for `format`
    pub fn dataset(&self, format: Format) -> Option<Arc<Dataset>> {
        self.read()
            .iter()
            .find(|l| l.format == format)
            .map(|l| Arc::clone(&l.dataset))
    }

    fn snapshot(&self) -> Vec<(Format, Arc<Dataset>)> {
        self.read()
            .iter()
            .map(|l| (l.format, Arc::clone(&l.dataset)))
            .collect()
    }

    pub fn is_loaded(&self, format: Format) -> bool {
        self.read().iter().any(|l| l.format == format)
    }

    /// Where a loaded format's data came from
    pub fn load_source(&self, format: Format) -> Option<LoadSource> {
        self.read().iter().find(|l| l.format == format).map(|l| l.source)
    }

    // ===== Queries =====

    /// Look up a creature by any spelling of its name.
    ///
    /// Without a format, the most recent random battle formats are tried
    /// first, then the first loaded format.
    pub fn get(&self, name: &str, format: Option<Format>) -> Option<Record> {
        if let Some(format) = format {
            return self.dataset(format)?.lookup(name).cloned();
        }

        let snapshot = self.snapshot();
        for preferred in PREFERRED_FORMATS {
            let found = snapshot
                .iter()
                .find(|(f, _)| f == preferred)
                .and_then(|(_, dataset)| dataset.lookup(name));
            if let Some(record) = found {
                return Some(record.clone());
            }
        }

        let (_, first) = snapshot.first()?;
        first.lookup(name).cloned()
    }

    /// Creature keys of a format in declared order; empty when not loaded
    pub fn list(&self, format: Format) -> Vec<String> {
        self.dataset(format)
            .map(|dataset| dataset.keys().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Loaded formats in load order
    pub fn list_formats(&self) -> Vec<Format> {
        self.read().iter().map(|l| l.format).collect()
    }

    /// Every loaded format containing `name`, random battle formats first
    pub fn search(&self, name: &str) -> Vec<SearchHit> {
        let mut hits: Vec<SearchHit> = self
            .snapshot()
            .into_iter()
            .filter_map(|(format, dataset)| {
                dataset.lookup(name).map(|record| SearchHit {
                    format,
                    source: format.source(),
                    record: record.clone(),
                })
            })
            .collect();
        hits.sort_by_key(|hit| hit.source);
        hits
    }

    // ===== Statistics =====

    pub fn stats(&self, name: &str, format: Format) -> Option<UsageStats> {
        self.dataset(format)?.lookup(name)?.stats()
    }

    /// Statistics for every creature in a format that has them
    pub fn format_stats(&self, format: Format) -> Vec<(String, UsageStats)> {
        let Some(dataset) = self.dataset(format) else {
            return Vec::new();
        };
        dataset
            .iter()
            .filter_map(|(key, record)| record.stats().map(|stats| (key.to_string(), stats)))
            .collect()
    }

    /// How much of a format carries statistics, field by field
    pub fn stats_summary(&self, format: Format) -> Option<StatsSummary> {
        let dataset = self.dataset(format)?;
        let mut records_with_stats = 0;
        let mut field_coverage: BTreeMap<String, usize> = BTreeMap::new();

        for (_, record) in dataset.iter() {
            if let Some(stats) = record.stats() {
                records_with_stats += 1;
                for field in stats.fields() {
                    *field_coverage.entry(field.to_string()).or_default() += 1;
                }
            }
        }

        Some(StatsSummary {
            format,
            total_records: dataset.len(),
            records_with_stats,
            field_coverage,
        })
    }

    // ===== Introspection =====

    /// Provenance for a format: persisted metadata first, then bundled
    pub fn metadata(&self, format: Format) -> Option<Value> {
        match self.store.read_metadata(format) {
            Ok(Some(metadata)) => return Some(metadata),
            Ok(None) => {}
            Err(e) => warn!(format = %format, error = %e, "Failed to read metadata"),
        }
        match self.store.read_bundled_metadata(format) {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!(format = %format, error = %e, "Failed to read bundled metadata");
                None
            }
        }
    }

    /// Registry description plus the record count when loaded
    pub fn format_info(&self, format: Format) -> FormatInfo {
        let mut info = format.describe();
        info.record_count = self.dataset(format).map(|d| d.len());
        info
    }

    pub fn last_refresh(&self) -> Option<DateTime<Utc>> {
        self.store.last_refresh()
    }

    pub fn describe_cache(&self) -> CacheInfo {
        let format_counts: Vec<FormatCount> = self
            .read()
            .iter()
            .map(|l| FormatCount {
                format: l.format,
                count: l.dataset.len(),
                source: l.source,
            })
            .collect();

        CacheInfo {
            root_dir: self.store.root().to_path_buf(),
            loaded_formats: format_counts.iter().map(|c| c.format).collect(),
            total_records: format_counts.iter().map(|c| c.count).sum(),
            format_counts,
            last_refresh: self.store.last_refresh(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    pub format: Format,
    pub source: Source,
    pub record: Record,
}

#[derive(Debug, Clone, Serialize)]
pub struct StatsSummary {
    pub format: Format,
    pub total_records: usize,
    pub records_with_stats: usize,
    /// Stats field name → number of records carrying it
    pub field_coverage: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FormatCount {
    pub format: Format,
    pub count: usize,
    pub source: LoadSource,
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheInfo {
    pub root_dir: PathBuf,
    pub loaded_formats: Vec<Format>,
    pub format_counts: Vec<FormatCount>,
    pub total_records: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refresh: Option<DateTime<Utc>>,
}

impl CacheInfo {
    pub fn last_refresh_display(&self) -> String {
        self.last_refresh
            .map(|at| age_display(at, Utc::now()))
            .unwrap_or_else(|| "never".to_string())
    }
}

/// Human-friendly age of a timestamp, e.g. "5m ago" or "2d ago"
pub fn age_display(at: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let minutes = (now - at).num_minutes();
    if minutes < 1 {
        // Also covers clock skew
        "just now".to_string()
    } else if minutes < 60 {
        format!("{}m ago", minutes)
    } else if minutes < 1440 {
        let hours = minutes / 60;
        if minutes % 60 >= 30 {
            format!("{}h ago", hours + 1)
        } else {
            format!("{}h ago", hours)
        }
    } else {
        let days = minutes / 1440;
        if (minutes % 1440) / 60 >= 12 {
            format!("{}d ago", days + 1)
        } else {
            format!("{}d ago", days)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
