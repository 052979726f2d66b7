//! User configuration.
//!
//! Stored at `~/.config/localsets/config.json`. Every field is optional; a
//! missing file means defaults: all random battle formats, auto-refresh on,
//! cache under the platform cache directory and the bundled snapshot in a
//! `data/` directory next to the executable.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::cache::CacheConfig;
use crate::formats::{resolve_aliases, Format, Source};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "localsets";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the cache directory
pub const CACHE_DIR_ENV: &str = "LOCALSETS_CACHE_DIR";

/// Bundled snapshot directory, relative to the executable
const BUNDLED_DATA_DIR: &str = "data";

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub cache_dir: Option<PathBuf>,
    pub bundled_dir: Option<PathBuf>,
    /// Format ids or aliases such as `modern` or `smogon`
    pub formats: Vec<String>,
    pub auto_refresh: Option<bool>,
}

impl Config {
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// A missing file yields the defaults; a malformed one is an error
    fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// `LOCALSETS_CACHE_DIR`, then the configured directory, then the
    /// platform cache directory.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = std::env::var_os(CACHE_DIR_ENV).filter(|v| !v.is_empty()) {
            return Ok(PathBuf::from(dir));
        }
        if let Some(ref dir) = self.cache_dir {
            return Ok(dir.clone());
        }
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn bundled_dir(&self) -> Option<PathBuf> {
        self.bundled_dir.clone().or_else(default_bundled_dir)
    }

    /// Configured formats with aliases expanded, in catalog order
    pub fn formats(&self) -> Vec<Format> {
        if self.formats.is_empty() {
            return Source::RandBats.formats().to_vec();
        }
        let resolved = resolve_aliases(&self.formats);
        Format::all().filter(|f| resolved.contains(f)).collect()
    }

    pub fn cache_config(&self) -> Result<CacheConfig> {
        Ok(CacheConfig::new(self.cache_dir()?)
            .with_bundled_dir(self.bundled_dir())
            .with_formats(self.formats())
            .with_auto_refresh(self.auto_refresh.unwrap_or(true)))
    }
}

fn default_bundled_dir() -> Option<PathBuf> {
    let exe = std::env::current_exe().ok()?;
    Some(exe.parent()?.join(BUNDLED_DATA_DIR))
}
