//! Remote data sources.
//!
//! [`RemoteFetcher`] is the seam between the cache and the network: given a
//! format it returns the primary set document, an optional usage statistics
//! document and optional provenance metadata. Each of the three can fail on
//! its own. [`HttpFetcher`] is the production implementation backed by the
//! pkmn GitHub repositories and the Smogon sets mirror.

pub mod client;
pub mod error;

use async_trait::async_trait;
use serde_json::Value;

use crate::formats::Format;
use crate::models::Dataset;

pub use client::HttpFetcher;
pub use error::FetchError;

#[async_trait]
pub trait RemoteFetcher: Send + Sync {
    /// Primary set data for a format
    async fn fetch_dataset(&self, format: Format) -> Result<Dataset, FetchError>;

    /// Usage statistics keyed by creature. `Ok(None)` when the source does
    /// not publish statistics for this format.
    async fn fetch_stats(&self, format: Format) -> Result<Option<Value>, FetchError>;

    /// Provenance for the primary document. `Ok(None)` when not published.
    async fn fetch_metadata(&self, format: Format) -> Result<Option<Value>, FetchError>;
}
