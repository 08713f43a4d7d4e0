//! Configuration schema for sharedclasses
//!
//! Configuration is stored at `~/.config/sharedclasses/config.toml`

use crate::error::SharedClassResult;
use crate::filter::{ClassFilter, DenyListFilter, PrefixFilter};
use crate::freshness::{FreshnessMode, FsProbe};
use crate::registry::HelperMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// General settings
    pub general: GeneralConfig,

    /// Cache store and registry settings
    pub cache: CacheConfig,

    /// Sharing filter applied to helpers created by the CLI
    pub filter: FilterConfig,
}

/// General application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Log format: "text" or "json"
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_format: "text".to_string(),
        }
    }
}

/// Cache settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Store directory (defaults to the user cache dir)
    pub dir: Option<PathBuf>,

    /// Upper bound on stored class bytes
    pub capacity_bytes: Option<u64>,

    /// Helpers per loader: "single" or "per-kind"
    pub helper_mode: HelperMode,

    /// Staleness detection: "metadata" or "digest"
    pub freshness: FreshnessMode,
}

/// Filter settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Class names or package prefixes never stored
    pub deny_store: Vec<String>,

    /// Class names or package prefixes never served
    pub deny_find: Vec<String>,

    /// Deny-list file with one pattern per line
    pub deny_list_file: Option<PathBuf>,
}

impl Config {
    /// Probe matching the configured freshness mode
    pub fn probe(&self) -> FsProbe {
        FsProbe::new(self.cache.freshness)
    }

    /// Filter described by the `[filter]` section, if it denies anything
    pub fn filter(&self) -> SharedClassResult<Option<Arc<dyn ClassFilter>>> {
        let mut filter = PrefixFilter::new();
        for pattern in &self.filter.deny_store {
            filter = filter.deny_store(pattern.as_str());
        }
        for pattern in &self.filter.deny_find {
            filter = filter.deny_find(pattern.as_str());
        }
        if let Some(path) = &self.filter.deny_list_file {
            filter = DenyListFilter::from_file(path)?.merge_into(filter);
        }

        if filter.is_empty() {
            return Ok(None);
        }
        let filter: Arc<dyn ClassFilter> = Arc::new(filter);
        Ok(Some(filter))
    }
}
