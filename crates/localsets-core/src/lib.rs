//! Offline lookup of Pokemon random battle sets and Smogon competitive sets.
//!
//! The [`DataCache`] answers lookups from data stored on disk, loaded from
//! the user cache or a bundled snapshot, and keeps that data fresh by
//! syncing from the upstream repositories through a [`RemoteFetcher`].
//!
//! ```no_run
//! # async fn demo() -> anyhow::Result<()> {
//! use std::sync::Arc;
//! use localsets_core::{CacheConfig, DataCache, Format, HttpFetcher};
//!
//! let format: Format = "gen9randombattle".parse()?;
//! let config = CacheConfig::new("/tmp/localsets".into()).with_formats([format]);
//! let cache = DataCache::open(config, Arc::new(HttpFetcher::new()?)).await?;
//! if let Some(record) = cache.get("Mr. Mime", Some(format)) {
//!     println!("{}", record.to_value());
//! }
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod formats;
pub mod models;
pub mod names;
pub mod remote;
pub mod store;
pub mod sync;

use std::sync::Arc;

use anyhow::Result;
use tokio::sync::OnceCell;

pub use cache::{CacheConfig, CacheInfo, DataCache, LoadSource, SearchHit, StatsSummary};
pub use config::Config;
pub use formats::{resolve_aliases, BattleType, Format, FormatError, FormatInfo, Source};
pub use models::{Dataset, Record, UsageStats};
pub use names::normalize;
pub use remote::{FetchError, HttpFetcher, RemoteFetcher};
pub use store::{LocalStore, StoreError};
pub use sync::{SyncEngine, SyncOutcome, SyncReport};

static DEFAULT_CACHE: OnceCell<DataCache> = OnceCell::const_new();

/// Process-wide cache built from the user configuration on first use.
///
/// This is a convenience over constructing a [`DataCache`] yourself; it is
/// built at most once and never replaced.
pub async fn default_cache() -> Result<&'static DataCache> {
    DEFAULT_CACHE
        .get_or_try_init(|| async {
            let config = Config::load()?.cache_config()?;
            let fetcher = Arc::new(HttpFetcher::new()?);
            DataCache::open(config, fetcher).await
        })
        .await
}

/// Look up a creature in the default cache
pub async fn get_pokemon(name: &str, format: Option<Format>) -> Result<Option<Record>> {
    Ok(default_cache().await?.get(name, format))
}

/// List the creatures of a format in the default cache
pub async fn list_pokemon(format: Format) -> Result<Vec<String>> {
    Ok(default_cache().await?.list(format))
}

/// Refresh the default cache (all loaded formats when `None`)
pub async fn update_data(formats: Option<&[Format]>) -> Result<SyncReport> {
    Ok(default_cache().await?.refresh(formats).await)
}
