#![allow(dead_code)]

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use localsets_core::{CacheConfig, DataCache, Dataset, FetchError, Format, RemoteFetcher};
use serde_json::Value;
use tempfile::TempDir;

pub fn format(id: &str) -> Format {
    id.parse().unwrap()
}

/// Fetcher serving canned documents. Formats without a dataset fail.
#[derive(Default)]
pub struct MockFetcher {
    datasets: Mutex<HashMap<Format, Value>>,
    stats: Mutex<HashMap<Format, Value>>,
    metadata: Mutex<HashMap<Format, Value>>,
    dataset_calls: AtomicUsize,
    delay: Option<Duration>,
}

impl MockFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn serve_dataset(&self, format: Format, value: Value) {
        self.datasets.lock().unwrap().insert(format, value);
    }

    pub fn fail_dataset(&self, format: Format) {
        self.datasets.lock().unwrap().remove(&format);
    }

    pub fn serve_stats(&self, format: Format, value: Value) {
        self.stats.lock().unwrap().insert(format, value);
    }

    pub fn serve_metadata(&self, format: Format, value: Value) {
        self.metadata.lock().unwrap().insert(format, value);
    }

    pub fn dataset_calls(&self) -> usize {
        self.dataset_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteFetcher for MockFetcher {
    async fn fetch_dataset(&self, format: Format) -> Result<Dataset, FetchError> {
        self.dataset_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let value = self.datasets.lock().unwrap().get(&format).cloned();
        match value {
            Some(value) => serde_json::from_value(value)
                .map_err(|e| FetchError::InvalidResponse(e.to_string())),
            None => Err(FetchError::ServerError(format!("{} unavailable", format))),
        }
    }

    async fn fetch_stats(&self, format: Format) -> Result<Option<Value>, FetchError> {
        match self.stats.lock().unwrap().get(&format) {
            Some(value) => Ok(Some(value.clone())),
            None => Err(FetchError::NotFound(format.to_string())),
        }
    }

    async fn fetch_metadata(&self, format: Format) -> Result<Option<Value>, FetchError> {
        Ok(self.metadata.lock().unwrap().get(&format).cloned())
    }
}

/// Temporary cache root plus bundled snapshot directory
pub struct Fixture {
    pub tmp: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("cache")).unwrap();
        fs::create_dir_all(tmp.path().join("data")).unwrap();
        Self { tmp }
    }

    pub fn cache_dir(&self) -> PathBuf {
        self.tmp.path().join("cache")
    }

    pub fn bundled_dir(&self) -> PathBuf {
        self.tmp.path().join("data")
    }

    pub fn write_cached(&self, format: Format, contents: &str) {
        write(&self.cache_dir(), format, contents);
    }

    pub fn write_bundled(&self, format: Format, contents: &str) {
        write(&self.bundled_dir(), format, contents);
    }

    pub fn read_cached(&self, format: Format) -> Value {
        let text = fs::read_to_string(self.cache_dir().join(format!("{}.json", format))).unwrap();
        serde_json::from_str(&text).unwrap()
    }

    pub fn config(&self, formats: &[Format]) -> CacheConfig {
        CacheConfig::new(self.cache_dir())
            .with_bundled_dir(Some(self.bundled_dir()))
            .with_formats(formats.iter().copied())
            .with_auto_refresh(false)
    }

    pub async fn open(&self, formats: &[Format], fetcher: Arc<MockFetcher>) -> DataCache {
        DataCache::open(self.config(formats), fetcher).await.unwrap()
    }
}

fn write(dir: &Path, format: Format, contents: &str) {
    fs::write(dir.join(format!("{}.json", format)), contents).unwrap();
}
