//! HTTP fetcher for the published set data.
//!
//! Random battle sets, their usage statistics and the GitHub contents
//! metadata come from the pkmn/randbats repository. Smogon sets come from
//! the pkmn Smogon mirror, which publishes neither statistics nor metadata.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{header, Client};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

use super::{FetchError, RemoteFetcher};
use crate::formats::{Format, Source};
use crate::models::Dataset;

// ============================================================================
// Constants
// ============================================================================

/// Raw random battle set files
const RANDBATS_DATA_URL: &str = "https://raw.githubusercontent.com/pkmn/randbats/main/data";

/// Raw random battle usage statistics
const RANDBATS_STATS_URL: &str = "https://raw.githubusercontent.com/pkmn/randbats/main/data/stats";

/// GitHub contents API, used for per-file provenance (sha, size, urls)
const RANDBATS_METADATA_URL: &str = "https://api.github.com/repos/pkmn/randbats/contents/data";

/// Smogon competitive sets mirror
const SMOGON_SETS_URL: &str = "https://pkmn.github.io/smogon/data/sets";

/// HTTP request timeout in seconds.
/// The largest set files are a few megabytes; 30s covers slow links.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

/// GitHub's API rejects requests without a User-Agent
const USER_AGENT: &str = concat!("localsets/", env!("CARGO_PKG_VERSION"));

/// Base URLs for every document the fetcher retrieves.
#[derive(Debug, Clone)]
pub struct Endpoints {
    pub randbats_data: String,
    pub randbats_stats: String,
    pub randbats_metadata: String,
    pub smogon_sets: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            randbats_data: RANDBATS_DATA_URL.to_string(),
            randbats_stats: RANDBATS_STATS_URL.to_string(),
            randbats_metadata: RANDBATS_METADATA_URL.to_string(),
            smogon_sets: SMOGON_SETS_URL.to_string(),
        }
    }
}

impl Endpoints {
    pub fn dataset_url(&self, format: Format) -> String {
        match format.source() {
            Source::RandBats => format!("{}/{}.json", self.randbats_data, format),
            Source::Smogon => format!("{}/{}.json", self.smogon_sets, format),
        }
    }

    pub fn stats_url(&self, format: Format) -> Option<String> {
        match format.source() {
            Source::RandBats => Some(format!("{}/{}.json", self.randbats_stats, format)),
            Source::Smogon => None,
        }
    }

    pub fn metadata_url(&self, format: Format) -> Option<String> {
        match format.source() {
            Source::RandBats => Some(format!("{}/{}.json", self.randbats_metadata, format)),
            Source::Smogon => None,
        }
    }
}

/// Fetcher for the public set repositories.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    endpoints: Endpoints,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self {
            client,
            endpoints: Endpoints::default(),
        })
    }

    /// Point the fetcher at different hosts, sharing the connection pool
    pub fn with_endpoints(&self, endpoints: Endpoints) -> Self {
        Self {
            client: self.client.clone(),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, FetchError> {
        if response.status().is_success() {
            Ok(Some(response))
        } else if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(FetchError::from_status(status, &body))
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let response = self
                .client
                .get(url)
                .header(header::ACCEPT, "application/json")
                .send()
                .await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    let text = response.text().await?;
                    return serde_json::from_str(&text).map_err(|e| {
                        FetchError::InvalidResponse(format!("Failed to parse JSON from {}: {}", url, e))
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(FetchError::RateLimited);
                    }
                    warn!(url = url, retry = retries, backoff_ms = backoff_ms, "Rate limited, backing off");
                    tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                    backoff_ms *= 2; // Exponential backoff
                }
            }
        }
    }
}

#[async_trait]
impl RemoteFetcher for HttpFetcher {
    async fn fetch_dataset(&self, format: Format) -> Result<Dataset, FetchError> {
        let url = self.endpoints.dataset_url(format);
        let dataset: Dataset = self.get(&url).await?;
        debug!(format = %format, count = dataset.len(), "Fetched dataset");
        Ok(dataset)
    }

    async fn fetch_stats(&self, format: Format) -> Result<Option<Value>, FetchError> {
        match self.endpoints.stats_url(format) {
            Some(url) => self.get(&url).await.map(Some),
            None => Ok(None),
        }
    }

    async fn fetch_metadata(&self, format: Format) -> Result<Option<Value>, FetchError> {
        match self.endpoints.metadata_url(format) {
            Some(url) => self.get(&url).await.map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_randbats_urls() {
        let endpoints = Endpoints::default();
        let format: Format = "gen9randombattle".parse().unwrap();
        assert_eq!(
            endpoints.dataset_url(format),
            "https://raw.githubusercontent.com/pkmn/randbats/main/data/gen9randombattle.json"
        );
        assert_eq!(
            endpoints.stats_url(format).as_deref(),
            Some("https://raw.githubusercontent.com/pkmn/randbats/main/data/stats/gen9randombattle.json")
        );
        assert_eq!(
            endpoints.metadata_url(format).as_deref(),
            Some("https://api.github.com/repos/pkmn/randbats/contents/data/gen9randombattle.json")
        );
    }

    #[test]
    fn test_smogon_urls() {
        let endpoints = Endpoints::default();
        let format: Format = "gen8ou".parse().unwrap();
        assert_eq!(
            endpoints.dataset_url(format),
            "https://pkmn.github.io/smogon/data/sets/gen8ou.json"
        );
        assert!(endpoints.stats_url(format).is_none());
        assert!(endpoints.metadata_url(format).is_none());
    }

    #[test]
    fn test_with_endpoints() {
        let fetcher = HttpFetcher::new().unwrap();
        let local = fetcher.with_endpoints(Endpoints {
            randbats_data: "http://127.0.0.1:9/data".to_string(),
            ..Endpoints::default()
        });
        let format: Format = "gen1randombattle".parse().unwrap();
        assert_eq!(local.endpoints().dataset_url(format), "http://127.0.0.1:9/data/gen1randombattle.json");
    }
}
