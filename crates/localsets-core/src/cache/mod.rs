//! In-memory cache over the locally stored set data.
//!
//! [`DataCache`] loads each configured format from the user cache, falling
//! back to the bundled snapshot and then to an empty dataset. Data is
//! considered stale 24 hours after the last refresh, at which point opening
//! the cache refreshes it from the remote source.

pub mod loader;
pub mod manager;

pub use loader::LoadSource;
pub use manager::{
    age_display, is_stale, CacheConfig, CacheInfo, DataCache, FormatCount, SearchHit, StatsSummary,
};
