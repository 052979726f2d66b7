//! Refreshing persisted data from a remote source.
//!
//! Every format is refreshed on its own: a failed fetch for one format is
//! recorded in the [`SyncReport`] and leaves that format's persisted data
//! untouched, while the rest of the batch carries on. Data is only written
//! after the primary document has been fetched and merged in full.

use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use futures::future::{join_all, BoxFuture, FutureExt, Shared};
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::formats::Format;
use crate::models::{Dataset, UsageStats};
use crate::remote::RemoteFetcher;
use crate::store::LocalStore;

/// Result of refreshing a single format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// New data was persisted
    Updated,
    /// Fetched data matched what was already persisted; nothing written
    Unchanged,
    /// Fetch or write failed; previously persisted data is kept
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct SyncReport {
    outcomes: Vec<(Format, SyncOutcome)>,
    completed_at: DateTime<Utc>,
}

impl SyncReport {
    /// Formats whose persisted data was replaced
    pub fn updated(&self) -> BTreeSet<Format> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == SyncOutcome::Updated)
            .map(|(format, _)| *format)
            .collect()
    }

    pub fn unchanged(&self) -> Vec<Format> {
        self.outcomes
            .iter()
            .filter(|(_, outcome)| *outcome == SyncOutcome::Unchanged)
            .map(|(format, _)| *format)
            .collect()
    }

    pub fn failed(&self) -> Vec<(Format, &str)> {
        self.outcomes
            .iter()
            .filter_map(|(format, outcome)| match outcome {
                SyncOutcome::Failed(reason) => Some((*format, reason.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn outcome(&self, format: Format) -> Option<&SyncOutcome> {
        self.outcomes
            .iter()
            .find(|(f, _)| *f == format)
            .map(|(_, outcome)| outcome)
    }

    pub fn outcomes(&self) -> &[(Format, SyncOutcome)] {
        &self.outcomes
    }

    pub fn completed_at(&self) -> DateTime<Utc> {
        self.completed_at
    }
}

type InFlight = Shared<BoxFuture<'static, SyncOutcome>>;

pub struct SyncEngine {
    fetcher: Arc<dyn RemoteFetcher>,
    store: Arc<LocalStore>,
    /// Running jobs keyed by format and force flag
    in_flight: Arc<Mutex<HashMap<(Format, bool), InFlight>>>,
}

impl SyncEngine {
    pub fn new(fetcher: Arc<dyn RemoteFetcher>, store: Arc<LocalStore>) -> Self {
        Self {
            fetcher,
            store,
            in_flight: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Refresh `formats` from the remote source into the local store.
    ///
    /// The fetch is always attempted. With `force` the fetched data is
    /// written and reported as updated even when it matches what is already
    /// persisted. A format already being refreshed by another caller with
    /// the same `force` flag is joined rather than fetched twice.
    ///
    /// The refresh timestamp is recorded once the batch completes, whatever
    /// the per-format outcomes were.
    pub async fn refresh(&self, formats: &[Format], force: bool) -> SyncReport {
        let mut batch: Vec<Format> = Vec::with_capacity(formats.len());
        for format in formats {
            if !batch.contains(format) {
                batch.push(*format);
            }
        }

        info!(count = batch.len(), force, "Refreshing formats");
        let jobs: Vec<InFlight> = batch
            .iter()
            .map(|&format| self.join_or_start(format, force))
            .collect();
        let results = join_all(jobs).await;

        let completed_at = Utc::now();
        if let Err(e) = self.store.set_last_refresh(completed_at) {
            warn!(error = %e, "Failed to record refresh timestamp");
        }

        let report = SyncReport {
            outcomes: batch.into_iter().zip(results).collect(),
            completed_at,
        };
        info!(
            updated = report.updated().len(),
            unchanged = report.unchanged().len(),
            failed = report.failed().len(),
            "Refresh complete"
        );
        report
    }

    fn join_or_start(&self, format: Format, force: bool) -> InFlight {
        let key = (format, force);
        let mut in_flight = lock(&self.in_flight);
        if let Some(job) = in_flight.get(&key) {
            debug!(format = %format, force, "Joining refresh already in progress");
            return job.clone();
        }

        let fetcher = Arc::clone(&self.fetcher);
        let store = Arc::clone(&self.store);
        let registry = Arc::clone(&self.in_flight);
        let job = async move {
            let outcome = sync_format(fetcher.as_ref(), &store, format, force).await;
            lock(&registry).remove(&key);
            outcome
        }
        .boxed()
        .shared();

        in_flight.insert(key, job.clone());
        job
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn sync_format(
    fetcher: &dyn RemoteFetcher,
    store: &LocalStore,
    format: Format,
    force: bool,
) -> SyncOutcome {
    let mut dataset = match fetcher.fetch_dataset(format).await {
        Ok(dataset) => dataset,
        Err(e) => {
            warn!(format = %format, error = %e, "Failed to fetch dataset, keeping existing data");
            return SyncOutcome::Failed(e.to_string());
        }
    };

    // Statistics are best-effort: a missing document is not a failure
    match fetcher.fetch_stats(format).await {
        Ok(Some(stats)) => {
            let merged = merge_stats(&mut dataset, &stats);
            debug!(format = %format, merged, "Merged usage statistics");
        }
        Ok(None) => {}
        Err(e) => debug!(format = %format, error = %e, "No usage statistics"),
    }

    let unchanged = !force
        && matches!(store.read_dataset(format), Ok(Some(ref existing)) if *existing == dataset);

    let outcome = if unchanged {
        debug!(format = %format, "Fetched data matches persisted data");
        SyncOutcome::Unchanged
    } else {
        match store.write_dataset(format, &dataset) {
            Ok(()) => SyncOutcome::Updated,
            Err(e) => {
                error!(format = %format, error = %e, "Failed to persist dataset");
                return SyncOutcome::Failed(e.to_string());
            }
        }
    };

    match fetcher.fetch_metadata(format).await {
        Ok(Some(metadata)) => {
            if let Err(e) = store.write_metadata(format, &metadata) {
                warn!(format = %format, error = %e, "Failed to persist metadata");
            }
        }
        Ok(None) => {}
        Err(e) => debug!(format = %format, error = %e, "Failed to fetch metadata"),
    }

    outcome
}

/// Attach each statistics entry to the record with the same key.
///
/// Entries for creatures missing from the dataset are dropped. Returns the
/// number of records that received statistics.
pub fn merge_stats(dataset: &mut Dataset, stats: &Value) -> usize {
    let Value::Object(entries) = stats else {
        return 0;
    };

    let mut merged = 0;
    for (key, entry) in entries {
        let Some(record) = dataset.get_mut(key) else {
            continue;
        };
        if let Some(stats) = UsageStats::from_value(entry.clone()) {
            record.set_stats(stats);
            merged += 1;
        }
    }
    merged
}
