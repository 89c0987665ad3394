//! YAML configuration for titlecat.
//!
//! Every section is optional and falls back to the defaults listed below, so
//! a minimal file only needs `version`.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "production"
//!
//! catalog:
//!   path: "/etc/titlecat/service_types.json"
//!
//! embedder:
//!   mode: "api"
//!   model_name: "bge-small-en-v1.5"
//!   api_url: "https://router.huggingface.co/hf-inference/models/BAAI/bge-small-en-v1.5/pipeline/feature-extraction"
//!   api_provider: "hf"
//!   normalize: true
//!
//! cache:
//!   backend: "redb"
//!   path: "/var/lib/titlecat/cache.redb"
//!
//! index:
//!   dimension: 384
//!
//! refresh:
//!   interval_secs: 43200
//!   timeout_secs: 300
//!   cache_ttl_secs: 14400
//!   run_on_startup: true
//!   embed_concurrency: 8
//!
//! categorize:
//!   default_top_n: 5
//!   max_top_n: 50
//!   max_batch_size: 100
//!   embed_timeout_ms: 10000
//!   embed_concurrency: 8
//!   title_cache_ttl_secs: 3600
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use embed::EmbedderConfig;
use index::CacheBackendConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for the categorization core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct TitlecatConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub catalog: CatalogConfig,

    #[serde(default)]
    pub embedder: EmbedderConfig,

    #[serde(default)]
    pub cache: CacheBackendConfig,

    #[serde(default)]
    pub index: IndexConfig,

    #[serde(default)]
    pub refresh: RefreshConfig,

    #[serde(default)]
    pub categorize: CategorizeConfig,
}

impl TitlecatConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: TitlecatConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.index.validate()?;
        self.refresh.validate()?;
        self.categorize.validate()?;
        Ok(())
    }
}

impl Default for TitlecatConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            catalog: CatalogConfig::default(),
            embedder: EmbedderConfig::default(),
            cache: CacheBackendConfig::default(),
            index: IndexConfig::default(),
            refresh: RefreshConfig::default(),
            categorize: CategorizeConfig::default(),
        }
    }
}

/// Where the service-type catalog comes from.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// JSON file holding `[{"id": ..., "description": ...}]`. Re-read on every refresh.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Fix the vector dimension up front instead of taking it from the first snapshot.
    #[serde(default)]
    pub dimension: Option<usize>,
}

impl IndexConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.dimension == Some(0) {
            return Err(ConfigLoadError::Validation(
                "index.dimension must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Snapshot refresh schedule and budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshConfig {
    /// Seconds between scheduled refreshes (12 hours by default).
    #[serde(default = "default_refresh_interval")]
    pub interval_secs: u64,

    /// Upper bound on a single refresh, catalog load to swap.
    #[serde(default = "default_refresh_timeout")]
    pub timeout_secs: u64,

    /// TTL of service-type vectors written to the cache. `0` never expires.
    #[serde(default = "default_category_ttl")]
    pub cache_ttl_secs: u64,

    /// Refresh once at startup before the first tick.
    #[serde(default = "true_value")]
    pub run_on_startup: bool,

    /// Single-text embedding calls in flight when a batch call fails.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

impl RefreshConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.interval_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "refresh.interval_secs must be >= 1".to_string(),
            ));
        }
        if self.timeout_secs == 0 {
            return Err(ConfigLoadError::Validation(
                "refresh.timeout_secs must be >= 1".to_string(),
            ));
        }
        if self.embed_concurrency == 0 {
            return Err(ConfigLoadError::Validation(
                "refresh.embed_concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_refresh_interval(),
            timeout_secs: default_refresh_timeout(),
            cache_ttl_secs: default_category_ttl(),
            run_on_startup: true,
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

/// Query-side limits and budgets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizeConfig {
    /// Matches returned per title when the request does not say.
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,

    #[serde(default = "default_max_top_n")]
    pub max_top_n: usize,

    /// Titles accepted in one request.
    #[serde(default = "default_max_batch_size")]
    pub max_batch_size: usize,

    /// Budget for one embedding call (the batch call, or each per-title retry).
    #[serde(default = "default_embed_timeout_ms")]
    pub embed_timeout_ms: u64,

    /// Cache title vectors per user. Requires a cache backend.
    #[serde(default = "true_value")]
    pub title_cache_enabled: bool,

    #[serde(default = "default_title_ttl")]
    pub title_cache_ttl_secs: u64,

    /// Single-title embedding calls in flight when a batch call fails.
    #[serde(default = "default_embed_concurrency")]
    pub embed_concurrency: usize,
}

impl CategorizeConfig {
    pub fn embed_timeout(&self) -> Duration {
        Duration::from_millis(self.embed_timeout_ms)
    }

    pub fn title_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.title_cache_ttl_secs)
    }

    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_top_n == 0 {
            return Err(ConfigLoadError::Validation(
                "categorize.max_top_n must be >= 1".to_string(),
            ));
        }
        if self.default_top_n == 0 || self.default_top_n > self.max_top_n {
            return Err(ConfigLoadError::Validation(format!(
                "categorize.default_top_n must be in 1..={}",
                self.max_top_n
            )));
        }
        if self.max_batch_size == 0 {
            return Err(ConfigLoadError::Validation(
                "categorize.max_batch_size must be >= 1".to_string(),
            ));
        }
        if self.embed_timeout_ms == 0 {
            return Err(ConfigLoadError::Validation(
                "categorize.embed_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.embed_concurrency == 0 {
            return Err(ConfigLoadError::Validation(
                "categorize.embed_concurrency must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for CategorizeConfig {
    fn default() -> Self {
        Self {
            default_top_n: default_top_n(),
            max_top_n: default_max_top_n(),
            max_batch_size: default_max_batch_size(),
            embed_timeout_ms: default_embed_timeout_ms(),
            title_cache_enabled: true,
            title_cache_ttl_secs: default_title_ttl(),
            embed_concurrency: default_embed_concurrency(),
        }
    }
}

fn default_refresh_interval() -> u64 {
    12 * 60 * 60
}

fn default_refresh_timeout() -> u64 {
    300
}

fn default_category_ttl() -> u64 {
    4 * 60 * 60
}

fn default_top_n() -> usize {
    5
}

fn default_max_top_n() -> usize {
    50
}

fn default_max_batch_size() -> usize {
    100
}

fn default_embed_timeout_ms() -> u64 {
    10_000
}

fn default_embed_concurrency() -> usize {
    8
}

fn default_title_ttl() -> u64 {
    60 * 60
}

fn true_value() -> bool {
    true
}
